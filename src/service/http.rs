//! `reqwest`-backed client for the query-fulfillment HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CreateQueryRequest, QueryCheck, QueryService, RemoteStatus};
use crate::core::config::ServiceConfig;
use crate::core::errors::BridgeError;

const USER_AGENT: &str = concat!("oracle-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct CreateResponse {
    result: CreateResult,
}

#[derive(Deserialize)]
struct CreateResult {
    id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    result: StatusResult,
}

// `checks` arrives as null until the first evaluation.
#[derive(Deserialize, Default)]
struct StatusResult {
    #[serde(default)]
    checks: Option<Vec<QueryCheck>>,
}

pub struct HttpQueryService {
    client: Client,
    base_url: String,
}

impl HttpQueryService {
    pub fn new(config: &ServiceConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn create_query(&self, request: &CreateQueryRequest) -> Result<String, BridgeError> {
        let url = format!("{}/query/create", self.base_url);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "query create returned HTTP {}",
                response.status()
            )));
        }
        let body: CreateResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Service(format!("malformed create response: {}", e)))?;
        Ok(body.result.id)
    }

    async fn check_status(&self, remote_id: &str) -> Result<RemoteStatus, BridgeError> {
        let url = format!("{}/query/{}/status", self.base_url, remote_id);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "status check returned HTTP {}",
                response.status()
            )));
        }
        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Service(format!("malformed status response: {}", e)))?;
        Ok(RemoteStatus { checks: body.result.checks.unwrap_or_default() })
    }
}
