//! Fixed registry mapping log-topic signatures to decoding schemas.
//!
//! This table is the wire contract between the on-ledger connector and
//! the bridge: any change to the connector's event layout requires a
//! matching entry here. The registry is closed — new schemas are added
//! to the table, never by touching decode logic.

use ethers::abi::ParamType;
use ethers::types::H256;
use once_cell::sync::Lazy;

use crate::abi::event_signature;

/// Which decoded-event variant a schema produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// One free-form argument string.
    SingleArg,
    /// Two argument strings between `datasource` and the gas fields.
    DualArg,
}

/// An event decoding schema: ordered parameter types plus the matching
/// field names.
#[derive(Debug, Clone)]
pub struct EventSchema {
    pub name: &'static str,
    pub signature: H256,
    pub kind: SchemaKind,
    pub params: Vec<ParamType>,
    pub fields: &'static [&'static str],
}

/// `Log1(address sender, bytes32 cid, uint timestamp, string datasource,
/// string arg, uint gaslimit, bytes1 proofType, uint gasPrice)`
pub const LOG1_DECLARATION: &str =
    "Log1(address,bytes32,uint256,string,string,uint256,bytes1,uint256)";

/// `Log2` carries a second argument string between `arg1` and `gaslimit`.
pub const LOG2_DECLARATION: &str =
    "Log2(address,bytes32,uint256,string,string,string,uint256,bytes1,uint256)";

static REGISTRY: Lazy<Vec<EventSchema>> = Lazy::new(|| {
    vec![
        EventSchema {
            name: "Log1",
            signature: event_signature(LOG1_DECLARATION),
            kind: SchemaKind::SingleArg,
            params: vec![
                ParamType::Address,
                ParamType::FixedBytes(32),
                ParamType::Uint(256),
                ParamType::String,
                ParamType::String,
                ParamType::Uint(256),
                ParamType::FixedBytes(1),
                ParamType::Uint(256),
            ],
            fields: &[
                "sender",
                "cid",
                "timestamp",
                "datasource",
                "arg",
                "gaslimit",
                "proofType",
                "gasPrice",
            ],
        },
        EventSchema {
            name: "Log2",
            signature: event_signature(LOG2_DECLARATION),
            kind: SchemaKind::DualArg,
            params: vec![
                ParamType::Address,
                ParamType::FixedBytes(32),
                ParamType::Uint(256),
                ParamType::String,
                ParamType::String,
                ParamType::String,
                ParamType::Uint(256),
                ParamType::FixedBytes(1),
                ParamType::Uint(256),
            ],
            fields: &[
                "sender",
                "cid",
                "timestamp",
                "datasource",
                "arg1",
                "arg2",
                "gaslimit",
                "proofType",
                "gasPrice",
            ],
        },
    ]
});

/// Look up the decoding schema for a log-topic signature.
pub fn lookup(signature: &H256) -> Option<&'static EventSchema> {
    REGISTRY.iter().find(|schema| schema.signature == *signature)
}
