//! In-memory simulated ledger used by tests and the demo binary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{CompletedTransaction, Ledger, LogEntry, TransactionOutcome, TransactionRequest};
use crate::core::errors::BridgeError;

/// A ledger that records every submitted transaction and lets callers
/// inject completed-transaction events by hand.
pub struct MemoryLedger {
    next_address: AtomicU64,
    submitted: Mutex<Vec<TransactionRequest>>,
    scripted: Mutex<VecDeque<Result<TransactionOutcome, BridgeError>>>,
    events: mpsc::UnboundedSender<CompletedTransaction>,
}

impl MemoryLedger {
    /// Create a ledger plus the receiving end of its event subscription.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<CompletedTransaction>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let ledger = Arc::new(Self {
            next_address: AtomicU64::new(1),
            submitted: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            events,
        });
        (ledger, receiver)
    }

    /// Deliver a completed transaction's logs to the subscriber.
    pub fn emit_transaction(&self, logs: Vec<LogEntry>) {
        let _ = self.events.send(CompletedTransaction { logs });
    }

    /// Queue an outcome for the next submitted transaction, overriding
    /// the default behavior.
    pub fn script_outcome(&self, outcome: Result<TransactionOutcome, BridgeError>) {
        self.scripted.lock().push_back(outcome);
    }

    /// Everything submitted so far, in order.
    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn submit_transaction(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionOutcome, BridgeError> {
        let is_deploy = tx.to.is_none();
        self.submitted.lock().push(tx);
        if let Some(outcome) = self.scripted.lock().pop_front() {
            return outcome;
        }
        if is_deploy {
            let n = self.next_address.fetch_add(1, Ordering::SeqCst);
            let created = Address::from_low_u64_be(0xC0FF_EE00 + n);
            debug!("memory ledger deployed contract at {:?}", created);
            return Ok(TransactionOutcome { created_address: Some(created), exception: None });
        }
        Ok(TransactionOutcome::default())
    }
}
