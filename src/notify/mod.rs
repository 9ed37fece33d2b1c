//! Notification sink: the passive receiver of query lifecycle events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::bridge::Query;

/// Receives query history events for display. Implementations must not
/// block; the bridge calls these from its per-query tasks.
pub trait NotificationSink: Send + Sync {
    fn query_created(&self, query: &Query);
    fn query_resolved(&self, query: &Query, result: &str);
    fn query_failed(&self, query: &Query, error: &str);
    /// The callback transaction failed. Rendered as an inline annotation
    /// on the query's history entry; the query itself stays `Completed`.
    fn callback_error(&self, query: &Query, error: &str);
}

/// Sink that renders history entries to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn query_created(&self, query: &Query) {
        info!("query #{} created: {} {}", query.local_id, query.datasource, query.formula);
    }

    fn query_resolved(&self, query: &Query, result: &str) {
        info!("query #{} = {}", query.local_id, result);
    }

    fn query_failed(&self, query: &Query, error: &str) {
        error!("query #{} failed: {}", query.local_id, error);
    }

    fn callback_error(&self, query: &Query, error: &str) {
        warn!("query #{} callback failed: {}", query.local_id, error);
    }
}

/// Unread-badge counter: counts history events until the user views the
/// query tab, then resets through [`mark_seen`](UnreadBadge::mark_seen).
pub struct UnreadBadge {
    inner: Arc<dyn NotificationSink>,
    unread: AtomicUsize,
}

impl UnreadBadge {
    pub fn new(inner: Arc<dyn NotificationSink>) -> Self {
        Self { inner, unread: AtomicUsize::new(0) }
    }

    pub fn unread(&self) -> usize {
        self.unread.load(Ordering::SeqCst)
    }

    /// The user opened the query view; clear the badge.
    pub fn mark_seen(&self) {
        self.unread.store(0, Ordering::SeqCst);
    }

    fn bump(&self) {
        self.unread.fetch_add(1, Ordering::SeqCst);
    }
}

impl NotificationSink for UnreadBadge {
    fn query_created(&self, query: &Query) {
        self.bump();
        self.inner.query_created(query);
    }

    fn query_resolved(&self, query: &Query, result: &str) {
        self.bump();
        self.inner.query_resolved(query, result);
    }

    fn query_failed(&self, query: &Query, error: &str) {
        self.bump();
        self.inner.query_failed(query, error);
    }

    fn callback_error(&self, query: &Query, error: &str) {
        // Accompanies a resolution that was already counted.
        self.inner.callback_error(query, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::decode::Formula;
    use crate::bridge::QueryStatus;
    use ethers::types::{Address, H256, U256};

    struct NullSink;

    impl NotificationSink for NullSink {
        fn query_created(&self, _query: &Query) {}
        fn query_resolved(&self, _query: &Query, _result: &str) {}
        fn query_failed(&self, _query: &Query, _error: &str) {}
        fn callback_error(&self, _query: &Query, _error: &str) {}
    }

    fn sample_query() -> Query {
        Query {
            local_id: 1,
            remote_id: None,
            query_id: H256::from_low_u64_be(7),
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
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_badge_counts_and_resets() {
        let badge = UnreadBadge::new(Arc::new(NullSink));
        let query = sample_query();
        assert_eq!(badge.unread(), 0);

        badge.query_created(&query);
        badge.query_resolved(&query, "42");
        assert_eq!(badge.unread(), 2);

        badge.callback_error(&query, "revert");
        assert_eq!(badge.unread(), 2);

        badge.mark_seen();
        assert_eq!(badge.unread(), 0);

        badge.query_failed(&query, "gone");
        assert_eq!(badge.unread(), 1);
    }
}
