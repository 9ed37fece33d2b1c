//! Ledger-facing types and the adapter seam the bridge drives.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::core::errors::BridgeError;

pub mod memory;
pub use memory::MemoryLedger;

/// A raw log entry emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Contract that emitted the log.
    pub emitter: Address,
    /// Indexed identifiers; the first topic is the event signature.
    pub topics: Vec<H256>,
    /// Opaque ABI-encoded payload.
    pub payload: Bytes,
}

/// Ordered logs of one completed transaction, as delivered by the
/// ledger's event subscription.
#[derive(Debug, Clone, Default)]
pub struct CompletedTransaction {
    pub logs: Vec<LogEntry>,
}

/// A transaction submitted back into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` deploys a contract.
    pub to: Option<Address>,
    pub gas: U256,
    pub value: U256,
    pub data: Bytes,
}

/// Outcome of a submitted transaction.
///
/// An execution exception is a value here, not an `Err`: the ledger
/// accepted and ran the transaction, and the run failed. Transport-level
/// submission failures surface as `BridgeError` instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionOutcome {
    /// Address of the created contract, for deployment transactions.
    pub created_address: Option<Address>,
    /// Execution exception reported by the ledger, if the run failed.
    pub exception: Option<String>,
}

/// The execution environment that runs transactions and emits logs.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a transaction for execution.
    async fn submit_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionOutcome, BridgeError>;
}
