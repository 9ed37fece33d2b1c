//! Log decoder: schema dispatch on the leading topic, then positional ABI
//! decoding of the payload.

use std::fmt;

use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::abi::schema::{self, SchemaKind};
use crate::core::errors::BridgeError;
use crate::ledger::LogEntry;

/// The free-form query formula carried by an event: one string, or the
/// two-string form of the dual-argument schema. Downstream code treats
/// both shapes uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Single(String),
    Pair(String, String),
}

impl Formula {
    /// The formula as the query history renders it.
    pub fn rendered(&self) -> String {
        match self {
            Formula::Single(arg) => arg.clone(),
            Formula::Pair(arg1, arg2) => format!("{},{}", arg1, arg2),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered())
    }
}

// On the wire a single argument is a JSON string and a pair is a
// two-element array, matching what the query service accepts.
impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Formula::Single(arg) => serializer.serialize_str(arg),
            Formula::Pair(arg1, arg2) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(arg1)?;
                seq.serialize_element(arg2)?;
                seq.end()
            }
        }
    }
}

/// Fields shared by every known event schema.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCommon {
    pub sender: Address,
    /// On-chain query id; the off-chain/on-chain join key.
    pub query_id: H256,
    /// Unix seconds at which the query should run.
    pub timestamp: u64,
    pub datasource: String,
    pub gas_limit: U256,
    pub proof_type: u8,
    pub gas_price: U256,
}

/// A decoded query event, tagged by the schema that produced it.
///
/// The variant is determined solely by the log's leading topic and is
/// resolved exactly once, here; downstream code goes through the
/// accessors and never re-inspects the shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    SingleArg { common: EventCommon, arg: String },
    DualArg { common: EventCommon, arg1: String, arg2: String },
}

impl DecodedEvent {
    pub fn common(&self) -> &EventCommon {
        match self {
            DecodedEvent::SingleArg { common, .. } => common,
            DecodedEvent::DualArg { common, .. } => common,
        }
    }

    pub fn formula(&self) -> Formula {
        match self {
            DecodedEvent::SingleArg { arg, .. } => Formula::Single(arg.clone()),
            DecodedEvent::DualArg { arg1, arg2, .. } => {
                Formula::Pair(arg1.clone(), arg2.clone())
            }
        }
    }
}

/// Decode one raw log entry against the schema registry.
///
/// Fails closed (`Ok(None)`) when the log was emitted by an unrelated
/// contract, carries no topics, or its leading topic matches no
/// registered schema. A matched log with a malformed payload is an
/// error — fatal for this log only; callers keep processing the
/// transaction's remaining logs.
pub fn decode(log: &LogEntry, expected_emitter: Address) -> Result<Option<DecodedEvent>, BridgeError> {
    if log.emitter != expected_emitter {
        return Ok(None);
    }
    let Some(signature) = log.topics.first() else {
        return Ok(None);
    };
    let Some(schema) = schema::lookup(signature) else {
        return Ok(None);
    };

    let mut tokens = abi::decode(&schema.params, &log.payload)?.into_iter();
    let sender = take_address(&mut tokens, "sender")?;
    let query_id = take_hash(&mut tokens, "cid")?;
    let timestamp = take_u64(&mut tokens, "timestamp")?;
    let datasource = take_string(&mut tokens, "datasource")?;

    let event = match schema.kind {
        SchemaKind::SingleArg => {
            let arg = take_string(&mut tokens, "arg")?;
            let common = EventCommon {
                sender,
                query_id,
                timestamp,
                datasource,
                gas_limit: take_uint(&mut tokens, "gaslimit")?,
                proof_type: take_byte(&mut tokens, "proofType")?,
                gas_price: take_uint(&mut tokens, "gasPrice")?,
            };
            DecodedEvent::SingleArg { common, arg }
        }
        SchemaKind::DualArg => {
            let arg1 = take_string(&mut tokens, "arg1")?;
            let arg2 = take_string(&mut tokens, "arg2")?;
            let common = EventCommon {
                sender,
                query_id,
                timestamp,
                datasource,
                gas_limit: take_uint(&mut tokens, "gaslimit")?,
                proof_type: take_byte(&mut tokens, "proofType")?,
                gas_price: take_uint(&mut tokens, "gasPrice")?,
            };
            DecodedEvent::DualArg { common, arg1, arg2 }
        }
    };
    Ok(Some(event))
}

fn next_token(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<Token, BridgeError> {
    tokens.next().ok_or_else(|| BridgeError::Decode(format!("missing field `{}`", field)))
}

fn take_address(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<Address, BridgeError> {
    match next_token(tokens, field)? {
        Token::Address(addr) => Ok(addr),
        other => Err(type_mismatch(field, "address", &other)),
    }
}

fn take_hash(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<H256, BridgeError> {
    match next_token(tokens, field)? {
        Token::FixedBytes(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
        other => Err(type_mismatch(field, "bytes32", &other)),
    }
}

fn take_uint(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<U256, BridgeError> {
    match next_token(tokens, field)? {
        Token::Uint(value) => Ok(value),
        other => Err(type_mismatch(field, "uint256", &other)),
    }
}

fn take_u64(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<u64, BridgeError> {
    let value = take_uint(tokens, field)?;
    if value > U256::from(u64::MAX) {
        return Err(BridgeError::Decode(format!("field `{}` overflows u64", field)));
    }
    Ok(value.as_u64())
}

fn take_string(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<String, BridgeError> {
    match next_token(tokens, field)? {
        Token::String(value) => Ok(value),
        other => Err(type_mismatch(field, "string", &other)),
    }
}

fn take_byte(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<u8, BridgeError> {
    match next_token(tokens, field)? {
        Token::FixedBytes(bytes) if bytes.len() == 1 => Ok(bytes[0]),
        other => Err(type_mismatch(field, "bytes1", &other)),
    }
}

fn type_mismatch(field: &str, expected: &str, got: &Token) -> BridgeError {
    BridgeError::Decode(format!("field `{}`: expected {}, got {:?}", field, expected, got))
}
