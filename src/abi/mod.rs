//! Positional ABI helpers shared by the log decoder, the callback encoder
//! and the connector deployment wiring.

use ethers::types::{Address, H256};
use sha3::{Digest, Keccak256};

pub mod decode;
pub mod schema;

/// Compute the first 4 bytes (function selector) from a signature string, e.g. "transfer(address,uint256)".
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let mut keccak = Keccak256::new();
    keccak.update(signature.as_bytes());
    let out = keccak.finalize();
    [out[0], out[1], out[2], out[3]]
}

/// Full Keccak-256 of an event declaration, as used for log topic
/// signatures.
pub fn event_signature(declaration: &str) -> H256 {
    let mut keccak = Keccak256::new();
    keccak.update(declaration.as_bytes());
    H256::from_slice(&keccak.finalize())
}

/// Encode an address into a 32-byte ABI word (left-padded).
pub fn abi_word_address(addr: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_bytes());
    out
}

/// Pack a selector and ABI words contiguously into calldata.
pub fn abi_pack(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * words.len());
    out.extend_from_slice(&selector);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}
