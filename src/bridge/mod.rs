//! Query orchestrator: owns the query registry and the per-query
//! lifecycle tasks.

pub mod callback;
pub mod deploy;
mod poll;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::abi::decode::{self, DecodedEvent, Formula};
use crate::core::config::{BridgeConfig, CreateRetryConfig, PollingConfig};
use crate::core::errors::BridgeError;
use crate::ledger::{CompletedTransaction, Ledger};
use crate::notify::NotificationSink;
use crate::service::QueryService;

use self::poll::QueryDriver;

/// Lifecycle state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryStatus {
    Created,
    AwaitingRemoteId,
    Polling,
    Completed,
    Failed,
}

impl QueryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Failed)
    }
}

/// One off-chain query, from decoded event to delivered callback.
///
/// Terminal queries stay in the registry as history; only their polling
/// stops.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    /// Internal correlation key, assigned at decode time.
    pub local_id: u64,
    /// Service-assigned id; absent until the create call succeeds.
    pub remote_id: Option<String>,
    /// On-chain query id from the originating event; echoed in the
    /// callback.
    pub query_id: H256,
    /// Contract to call back.
    pub originating_contract: Address,
    pub datasource: String,
    pub formula: Formula,
    /// Unix seconds at which the query should run.
    pub scheduled_at: u64,
    pub gas_limit: U256,
    pub proof_type: u8,
    pub gas_price: U256,
    pub status: QueryStatus,
    /// Final result value, once completed.
    pub result: Option<String>,
    /// Inline error annotation for the history entry.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryInner {
    queries: HashMap<u64, Query>,
    by_remote: HashMap<String, u64>,
}

/// Authoritative registry of outstanding and historical queries.
///
/// Owned exclusively by the orchestrator; keyed by `local_id`, with a
/// secondary index by `remote_id` once one is known. No other component
/// mutates query state.
pub struct QueryRegistry {
    next_id: AtomicU64,
    inner: Mutex<RegistryInner>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), inner: Mutex::new(RegistryInner::default()) }
    }

    fn insert(&self, build: impl FnOnce(u64) -> Query) -> Query {
        let local_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let query = build(local_id);
        self.inner.lock().queries.insert(local_id, query.clone());
        query
    }

    pub fn get(&self, local_id: u64) -> Option<Query> {
        self.inner.lock().queries.get(&local_id).cloned()
    }

    pub fn by_remote_id(&self, remote_id: &str) -> Option<Query> {
        let inner = self.inner.lock();
        let local_id = inner.by_remote.get(remote_id)?;
        inner.queries.get(local_id).cloned()
    }

    pub(crate) fn set_status(&self, local_id: u64, status: QueryStatus) {
        if let Some(query) = self.inner.lock().queries.get_mut(&local_id) {
            query.status = status;
        }
    }

    pub(crate) fn record_remote_id(&self, local_id: u64, remote_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(query) = inner.queries.get_mut(&local_id) {
            query.remote_id = Some(remote_id.to_string());
            query.status = QueryStatus::Polling;
        }
        inner.by_remote.insert(remote_id.to_string(), local_id);
    }

    pub(crate) fn complete(&self, local_id: u64, result: &str) {
        if let Some(query) = self.inner.lock().queries.get_mut(&local_id) {
            query.status = QueryStatus::Completed;
            query.result = Some(result.to_string());
        }
    }

    pub(crate) fn fail(&self, local_id: u64, error: &str) {
        if let Some(query) = self.inner.lock().queries.get_mut(&local_id) {
            query.status = QueryStatus::Failed;
            query.error = Some(error.to_string());
        }
    }

    pub(crate) fn annotate_error(&self, local_id: u64, error: &str) {
        if let Some(query) = self.inner.lock().queries.get_mut(&local_id) {
            query.error = Some(error.to_string());
        }
    }

    /// All queries, oldest first.
    pub fn history(&self) -> Vec<Query> {
        let inner = self.inner.lock();
        let mut queries: Vec<Query> = inner.queries.values().cloned().collect();
        queries.sort_by_key(|q| q.local_id);
        queries
    }

    /// Number of queries still in flight.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().queries.values().filter(|q| !q.status.is_terminal()).count()
    }
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The oracle query bridge: decodes connector events into queries and
/// drives each one to a terminal state.
pub struct OracleBridge {
    operator: Address,
    expected_emitter: Address,
    ledger: Arc<dyn Ledger>,
    service: Arc<dyn QueryService>,
    sink: Arc<dyn NotificationSink>,
    registry: Arc<QueryRegistry>,
    polling: PollingConfig,
    create_retry: CreateRetryConfig,
    shutdown: CancellationToken,
}

impl OracleBridge {
    pub fn new(
        config: &BridgeConfig,
        expected_emitter: Address,
        ledger: Arc<dyn Ledger>,
        service: Arc<dyn QueryService>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            operator: config.operator()?,
            expected_emitter,
            ledger,
            service,
            sink,
            registry: Arc::new(QueryRegistry::new()),
            polling: config.polling.clone(),
            create_retry: config.create_retry.clone(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> Arc<QueryRegistry> {
        Arc::clone(&self.registry)
    }

    /// Token cancelling every outstanding per-query task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Consume the ledger's completed-transaction events until the
    /// channel closes or shutdown is requested. Decoding and query
    /// registration return immediately; all network work runs on
    /// per-query tasks.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<CompletedTransaction>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(tx) => self.on_transaction(&tx),
                    None => break,
                },
            }
        }
    }

    /// Scan one completed transaction's logs. A decode error skips the
    /// offending log; the rest of the transaction is still processed.
    pub fn on_transaction(&self, tx: &CompletedTransaction) {
        for log in &tx.logs {
            match decode::decode(log, self.expected_emitter) {
                Ok(Some(event)) => self.on_decoded_event(event),
                Ok(None) => {}
                Err(err) => {
                    warn!("skipping undecodable log from {:?}: {}", log.emitter, err)
                }
            }
        }
    }

    /// Register a decoded query event and spawn its lifecycle task.
    pub fn on_decoded_event(&self, event: DecodedEvent) {
        let common = event.common().clone();
        let formula = event.formula();
        let query = self.registry.insert(|local_id| Query {
            local_id,
            remote_id: None,
            query_id: common.query_id,
            originating_contract: common.sender,
            datasource: common.datasource.clone(),
            formula: formula.clone(),
            scheduled_at: common.timestamp,
            gas_limit: common.gas_limit,
            proof_type: common.proof_type,
            gas_price: common.gas_price,
            status: QueryStatus::Created,
            result: None,
            error: None,
            created_at: Utc::now(),
        });
        info!(
            "query #{} created for {:?}: {} {}",
            query.local_id, query.originating_contract, query.datasource, query.formula
        );
        self.sink.query_created(&query);

        let driver = QueryDriver {
            service: Arc::clone(&self.service),
            ledger: Arc::clone(&self.ledger),
            sink: Arc::clone(&self.sink),
            registry: Arc::clone(&self.registry),
            operator: self.operator,
            polling: self.polling.clone(),
            retry: self.create_retry.clone(),
            cancel: self.shutdown.child_token(),
        };
        tokio::spawn(driver.run(query.local_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(registry: &QueryRegistry) -> Query {
        registry.insert(|local_id| Query {
            local_id,
            remote_id: None,
            query_id: H256::from_low_u64_be(local_id),
            originating_contract: Address::from_low_u64_be(0x5E),
            datasource: "URL".to_string(),
            formula: Formula::Single("json(x).y".to_string()),
            scheduled_at: 0,
            gas_limit: U256::from(500_000u64),
            proof_type: 0,
            gas_price: U256::zero(),
            status: QueryStatus::Created,
            result: None,
            error: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_local_ids_are_monotonic_and_unique() {
        let registry = QueryRegistry::new();
        let a = sample(&registry);
        let b = sample(&registry);
        assert!(b.local_id > a.local_id);
        assert_eq!(registry.history().len(), 2);
    }

    #[test]
    fn test_remote_id_index() {
        let registry = QueryRegistry::new();
        let query = sample(&registry);
        registry.record_remote_id(query.local_id, "remote-1");

        let found = registry.by_remote_id("remote-1").unwrap();
        assert_eq!(found.local_id, query.local_id);
        assert_eq!(found.status, QueryStatus::Polling);
        assert!(registry.by_remote_id("remote-2").is_none());
    }

    #[test]
    fn test_complete_records_result_and_terminal_state() {
        let registry = QueryRegistry::new();
        let query = sample(&registry);
        assert_eq!(registry.outstanding(), 1);

        registry.complete(query.local_id, "18000");
        let done = registry.get(query.local_id).unwrap();
        assert_eq!(done.status, QueryStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("18000"));
        assert!(done.status.is_terminal());
        assert_eq!(registry.outstanding(), 0);
    }

    #[test]
    fn test_fail_and_annotate() {
        let registry = QueryRegistry::new();
        let query = sample(&registry);
        registry.fail(query.local_id, "no route to service");
        let failed = registry.get(query.local_id).unwrap();
        assert_eq!(failed.status, QueryStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("no route to service"));

        let other = sample(&registry);
        registry.complete(other.local_id, "1");
        registry.annotate_error(other.local_id, "VM exception");
        let annotated = registry.get(other.local_id).unwrap();
        // Annotation never demotes a completed query.
        assert_eq!(annotated.status, QueryStatus::Completed);
        assert_eq!(annotated.error.as_deref(), Some("VM exception"));
    }

    #[test]
    fn test_history_is_ordered() {
        let registry = QueryRegistry::new();
        for _ in 0..5 {
            sample(&registry);
        }
        let ids: Vec<u64> = registry.history().iter().map(|q| q.local_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
