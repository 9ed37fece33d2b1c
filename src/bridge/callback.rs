//! Callback encoder: ABI-encodes the query result (and optional proof)
//! and submits the reply transaction.

use std::sync::Arc;

use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use tracing::{info, warn};

use super::{Query, QueryRegistry};
use crate::core::errors::BridgeError;
use crate::ledger::{Ledger, TransactionRequest};
use crate::notify::NotificationSink;

/// Selector of `__callback(bytes32,string)`.
pub const CALLBACK_SELECTOR: [u8; 4] = [0x27, 0xdc, 0x29, 0x7e];
/// Selector of `__callback(bytes32,string,bytes)`.
pub const CALLBACK_WITH_PROOF_SELECTOR: [u8; 4] = [0x38, 0xbb, 0xfa, 0x50];
/// Proofs of exactly this length are base58 text (content-addressed
/// storage hashes) and are decoded to raw bytes before encoding.
pub const BASE58_PROOF_LEN: usize = 46;

/// Build the calldata for a result callback. The with-proof selector is
/// chosen exactly when a proof is supplied.
pub fn encode_callback(
    query_id: H256,
    result: &str,
    proof: Option<&[u8]>,
) -> Result<Vec<u8>, BridgeError> {
    let mut data = Vec::new();
    match proof {
        None => {
            data.extend_from_slice(&CALLBACK_SELECTOR);
            data.extend_from_slice(&abi::encode(&[
                Token::FixedBytes(query_id.as_bytes().to_vec()),
                Token::String(result.to_string()),
            ]));
        }
        Some(proof) => {
            let raw = normalize_proof(proof)?;
            data.extend_from_slice(&CALLBACK_WITH_PROOF_SELECTOR);
            data.extend_from_slice(&abi::encode(&[
                Token::FixedBytes(query_id.as_bytes().to_vec()),
                Token::String(result.to_string()),
                Token::Bytes(raw),
            ]));
        }
    }
    Ok(data)
}

/// A 46-byte proof is base58 text and is decoded first; anything else
/// passes through untouched.
fn normalize_proof(proof: &[u8]) -> Result<Vec<u8>, BridgeError> {
    if proof.len() != BASE58_PROOF_LEN {
        return Ok(proof.to_vec());
    }
    let text = std::str::from_utf8(proof)
        .map_err(|_| BridgeError::ProofFormat("46-byte proof is not valid UTF-8".to_string()))?;
    bs58::decode(text)
        .into_vec()
        .map_err(|e| BridgeError::ProofFormat(format!("base58 proof decode failed: {}", e)))
}

/// Submits result callbacks back into the ledger.
///
/// The attempt is one-shot: failures annotate the query's history entry
/// and are never retried, and the query stays `Completed`.
pub(crate) struct CallbackEncoder {
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) registry: Arc<QueryRegistry>,
    pub(crate) operator: Address,
}

impl CallbackEncoder {
    pub(crate) async fn deliver(&self, query: &Query, result: &str, proof: Option<&[u8]>) {
        let data = match encode_callback(query.query_id, result, proof) {
            Ok(data) => data,
            Err(err) => {
                self.record_failure(query, &err.to_string());
                return;
            }
        };
        let tx = TransactionRequest {
            from: self.operator,
            to: Some(query.originating_contract),
            gas: query.gas_limit,
            value: U256::zero(),
            data: data.into(),
        };
        match self.ledger.submit_transaction(tx).await {
            Ok(outcome) => match outcome.exception {
                Some(exception) => {
                    let err = BridgeError::Execution(exception);
                    self.record_failure(query, &err.to_string());
                }
                None => {
                    info!(
                        "contract {:?} __callback invoked for query #{}",
                        query.originating_contract, query.local_id
                    );
                }
            },
            Err(err) => self.record_failure(query, &err.to_string()),
        }
    }

    fn record_failure(&self, query: &Query, message: &str) {
        warn!("callback for query #{} failed: {}", query.local_id, message);
        self.registry.annotate_error(query.local_id, message);
        self.sink.callback_error(query, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::ParamType;
    use test_case::test_case;

    fn query_id() -> H256 {
        H256::from_low_u64_be(42)
    }

    #[test]
    fn test_no_proof_uses_two_argument_selector() {
        let data = encode_callback(query_id(), "18000", None).unwrap();
        assert_eq!(&data[..4], &CALLBACK_SELECTOR);
        let tokens =
            abi::decode(&[ParamType::FixedBytes(32), ParamType::String], &data[4..]).unwrap();
        assert_eq!(tokens[0], Token::FixedBytes(query_id().as_bytes().to_vec()));
        assert_eq!(tokens[1], Token::String("18000".to_string()));
    }

    #[test]
    fn test_proof_uses_three_argument_selector() {
        let data = encode_callback(query_id(), "18000", Some(b"raw-proof")).unwrap();
        assert_eq!(&data[..4], &CALLBACK_WITH_PROOF_SELECTOR);
        let tokens = abi::decode(
            &[ParamType::FixedBytes(32), ParamType::String, ParamType::Bytes],
            &data[4..],
        )
        .unwrap();
        assert_eq!(tokens[2], Token::Bytes(b"raw-proof".to_vec()));
    }

    #[test]
    fn test_46_byte_proof_is_base58_decoded() {
        // A content-addressed storage hash: 46 base58 characters.
        let proof = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        assert_eq!(proof.len(), BASE58_PROOF_LEN);

        let data = encode_callback(query_id(), "1", Some(proof.as_bytes())).unwrap();
        let tokens = abi::decode(
            &[ParamType::FixedBytes(32), ParamType::String, ParamType::Bytes],
            &data[4..],
        )
        .unwrap();
        let Token::Bytes(raw) = tokens[2].clone() else {
            panic!("expected bytes token");
        };
        // Decoded form is a 34-byte sha2-256 multihash, not the text.
        assert_eq!(raw.len(), 34);
        assert_eq!(&raw[..2], &[0x12, 0x20]);
    }

    #[test_case(10)]
    #[test_case(45)]
    #[test_case(47)]
    fn test_other_proof_lengths_pass_through(len: usize) {
        let proof = vec![0xAB; len];
        let data = encode_callback(query_id(), "1", Some(&proof)).unwrap();
        let tokens = abi::decode(
            &[ParamType::FixedBytes(32), ParamType::String, ParamType::Bytes],
            &data[4..],
        )
        .unwrap();
        assert_eq!(tokens[2], Token::Bytes(proof));
    }

    #[test]
    fn test_invalid_base58_proof_is_proof_format_error() {
        // 46 bytes, but 0 and l are outside the base58 alphabet.
        let proof = [b'0'; BASE58_PROOF_LEN];
        let err = encode_callback(query_id(), "1", Some(&proof)).unwrap_err();
        assert!(matches!(err, BridgeError::ProofFormat(_)));
    }
}
