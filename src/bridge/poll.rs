//! Per-query lifecycle task: create, poll, hand off to the callback
//! encoder.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::callback::CallbackEncoder;
use super::{QueryRegistry, QueryStatus};
use crate::core::config::{CreateRetryConfig, PollingConfig};
use crate::core::errors::BridgeError;
use crate::ledger::Ledger;
use crate::notify::NotificationSink;
use crate::service::{CreateQueryRequest, QueryService};

/// Drives a single query from `Created` to a terminal state.
///
/// Exactly one driver exists per query, so state transitions are
/// serialized and status checks for one query never overlap.
pub(crate) struct QueryDriver {
    pub(crate) service: Arc<dyn QueryService>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) registry: Arc<QueryRegistry>,
    pub(crate) operator: Address,
    pub(crate) polling: PollingConfig,
    pub(crate) retry: CreateRetryConfig,
    pub(crate) cancel: CancellationToken,
}

impl QueryDriver {
    pub(crate) async fn run(self, local_id: u64) {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("query #{} task cancelled", local_id);
            }
            result = self.drive(local_id) => {
                if let Err(err) = result {
                    let message = err.to_string();
                    self.registry.fail(local_id, &message);
                    if let Some(query) = self.registry.get(local_id) {
                        self.sink.query_failed(&query, &message);
                    }
                }
            }
        }
    }

    async fn drive(&self, local_id: u64) -> Result<(), BridgeError> {
        let Some(query) = self.registry.get(local_id) else {
            return Ok(());
        };
        let request = CreateQueryRequest {
            when: query.scheduled_at,
            datasource: query.datasource.clone(),
            query: query.formula.clone(),
            proof_type: query.proof_type,
        };
        self.registry.set_status(local_id, QueryStatus::AwaitingRemoteId);
        let remote_id = self.create_with_retry(&request).await?;
        info!("query #{} registered remotely as {}", local_id, remote_id);
        self.registry.record_remote_id(local_id, &remote_id);

        let (result, proof) = self.poll(&remote_id).await?;
        self.registry.complete(local_id, &result);

        let Some(query) = self.registry.get(local_id) else {
            return Ok(());
        };
        // A query that promised a proof always hands one to the callback,
        // substituting a placeholder when the service reported none.
        let proof_bytes = match proof {
            Some(text) => Some(text.into_bytes()),
            None if query.proof_type != 0x00 => Some(b"None".to_vec()),
            None => None,
        };

        let encoder = CallbackEncoder {
            ledger: Arc::clone(&self.ledger),
            sink: Arc::clone(&self.sink),
            registry: Arc::clone(&self.registry),
            operator: self.operator,
        };
        encoder.deliver(&query, &result, proof_bytes.as_deref()).await;

        if let Some(query) = self.registry.get(local_id) {
            self.sink.query_resolved(&query, &result);
        }
        Ok(())
    }

    /// Issue the create call, retrying transport failures with doubling
    /// backoff until the attempt budget runs out.
    async fn create_with_retry(&self, request: &CreateQueryRequest) -> Result<String, BridgeError> {
        let mut backoff = Duration::from_millis(self.retry.backoff_ms);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.service.create_query(request).await {
                Ok(remote_id) => return Ok(remote_id),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        "query create attempt {}/{} failed: {}",
                        attempt, self.retry.max_attempts, err
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Check the remote query until its last check succeeds.
    ///
    /// Checks are strictly sequential: one per tick, each awaited to
    /// completion before the next is scheduled. An empty check list
    /// means "not evaluated yet" and just consumes the tick, as does a
    /// transient transport failure.
    async fn poll(&self, remote_id: &str) -> Result<(String, Option<String>), BridgeError> {
        let interval = Duration::from_millis(self.polling.interval_ms);
        for attempt in 1..=self.polling.max_attempts {
            tokio::time::sleep(interval).await;
            let status = match self.service.check_status(remote_id).await {
                Ok(status) => status,
                Err(err) if err.is_retryable() => {
                    warn!(
                        "status check {}/{} for {} failed: {}",
                        attempt, self.polling.max_attempts, remote_id, err
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            let Some(last) = status.checks.last() else {
                debug!(
                    "query {} not evaluated yet (check {}/{})",
                    remote_id, attempt, self.polling.max_attempts
                );
                continue;
            };
            if !last.success {
                continue;
            }
            let result = last.results.last().cloned().unwrap_or_default();
            let proof = last.proofs.first().cloned().flatten();
            return Ok((result, proof));
        }
        Err(BridgeError::Service(format!(
            "query {} did not resolve within {} checks",
            remote_id, self.polling.max_attempts
        )))
    }
}
