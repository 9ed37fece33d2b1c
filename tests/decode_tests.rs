//! Integration tests for the schema registry and the log decoder.

use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use oracle_bridge::abi::decode::{decode, DecodedEvent, Formula};
use oracle_bridge::abi::event_signature;
use oracle_bridge::abi::schema::{LOG1_DECLARATION, LOG2_DECLARATION};
use oracle_bridge::core::errors::BridgeError;
use oracle_bridge::ledger::LogEntry;
use pretty_assertions::assert_eq;

fn connector() -> Address {
    Address::from_low_u64_be(0xC0)
}

fn sender() -> Address {
    Address::from_low_u64_be(0x5E)
}

fn query_id() -> H256 {
    H256::from_low_u64_be(42)
}

fn log1_entry(datasource: &str, arg: &str, proof_type: u8) -> LogEntry {
    let payload = encode(&[
        Token::Address(sender()),
        Token::FixedBytes(query_id().as_bytes().to_vec()),
        Token::Uint(U256::from(1_461_000_000u64)),
        Token::String(datasource.to_string()),
        Token::String(arg.to_string()),
        Token::Uint(U256::from(500_000u64)),
        Token::FixedBytes(vec![proof_type]),
        Token::Uint(U256::from(20_000_000_000u64)),
    ]);
    LogEntry {
        emitter: connector(),
        topics: vec![event_signature(LOG1_DECLARATION)],
        payload: Bytes::from(payload),
    }
}

fn log2_entry(datasource: &str, arg1: &str, arg2: &str) -> LogEntry {
    let payload = encode(&[
        Token::Address(sender()),
        Token::FixedBytes(query_id().as_bytes().to_vec()),
        Token::Uint(U256::from(1_461_000_000u64)),
        Token::String(datasource.to_string()),
        Token::String(arg1.to_string()),
        Token::String(arg2.to_string()),
        Token::Uint(U256::from(600_000u64)),
        Token::FixedBytes(vec![0x11]),
        Token::Uint(U256::from(20_000_000_000u64)),
    ]);
    LogEntry {
        emitter: connector(),
        topics: vec![event_signature(LOG2_DECLARATION)],
        payload: Bytes::from(payload),
    }
}

#[test]
fn round_trips_single_arg_event() {
    let log = log1_entry("URL", "json(https://api.example.com/price).result", 0x00);
    let event = decode(&log, connector()).unwrap().unwrap();

    let DecodedEvent::SingleArg { common, arg } = event else {
        panic!("expected single-arg variant");
    };
    assert_eq!(common.sender, sender());
    assert_eq!(common.query_id, query_id());
    assert_eq!(common.timestamp, 1_461_000_000);
    assert_eq!(common.datasource, "URL");
    assert_eq!(arg, "json(https://api.example.com/price).result");
    assert_eq!(common.gas_limit, U256::from(500_000u64));
    assert_eq!(common.proof_type, 0x00);
    assert_eq!(common.gas_price, U256::from(20_000_000_000u64));
}

#[test]
fn round_trips_dual_arg_event_and_combines_formula() {
    let log = log2_entry("URL", "https://api.example.com/price", "json($).result");
    let event = decode(&log, connector()).unwrap().unwrap();

    assert!(matches!(event, DecodedEvent::DualArg { .. }));
    assert_eq!(
        event.formula(),
        Formula::Pair("https://api.example.com/price".to_string(), "json($).result".to_string())
    );
    // Both variants look the same to the caller.
    assert_eq!(event.common().datasource, "URL");
    assert_eq!(event.common().proof_type, 0x11);
}

#[test]
fn emitter_mismatch_yields_nothing() {
    let mut log = log1_entry("URL", "json(x).y", 0x00);
    log.emitter = Address::from_low_u64_be(0xBAD);
    assert_eq!(decode(&log, connector()).unwrap(), None);
}

#[test]
fn unknown_signature_yields_nothing() {
    let mut log = log1_entry("URL", "json(x).y", 0x00);
    log.topics = vec![H256::zero()];
    assert_eq!(decode(&log, connector()).unwrap(), None);
}

#[test]
fn topicless_log_yields_nothing() {
    let mut log = log1_entry("URL", "json(x).y", 0x00);
    log.topics.clear();
    assert_eq!(decode(&log, connector()).unwrap(), None);
}

#[test]
fn malformed_payload_is_a_decode_error() {
    let mut log = log1_entry("URL", "json(x).y", 0x00);
    log.payload = Bytes::from(vec![0u8; 16]);
    let err = decode(&log, connector()).unwrap_err();
    assert!(matches!(err, BridgeError::Decode(_)));
}

#[test]
fn truncated_payload_is_a_decode_error() {
    let mut log = log1_entry("URL", "json(x).y", 0x00);
    let truncated = log.payload[..log.payload.len() - 40].to_vec();
    log.payload = Bytes::from(truncated);
    assert!(decode(&log, connector()).is_err());
}
