//! Client seam for the external query-fulfillment service.
//!
//! Only the two operations the bridge depends on are modeled: create
//! query and check status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::abi::decode::Formula;
use crate::core::errors::BridgeError;

pub mod http;
pub use http::HttpQueryService;

/// Body of `POST /query/create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateQueryRequest {
    /// Unix seconds at which the query should run.
    pub when: u64,
    pub datasource: String,
    /// Serializes as a string, or a two-element array for the
    /// dual-argument form.
    pub query: Formula,
    pub proof_type: u8,
}

/// One evaluation attempt reported by the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryCheck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub proofs: Vec<Option<String>>,
}

/// Status of a remote query. An empty `checks` list means the query has
/// not been evaluated yet — not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteStatus {
    #[serde(default)]
    pub checks: Vec<QueryCheck>,
}

/// The two service operations the bridge depends on.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Create a query; returns the service-assigned remote id.
    async fn create_query(&self, request: &CreateQueryRequest) -> Result<String, BridgeError>;

    /// Check an outstanding query's status.
    async fn check_status(&self, remote_id: &str) -> Result<RemoteStatus, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_wire_shape() {
        let single = CreateQueryRequest {
            when: 1_461_000_000,
            datasource: "URL".to_string(),
            query: Formula::Single("json(https://x).a".to_string()),
            proof_type: 0,
        };
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            json!({
                "when": 1_461_000_000u64,
                "datasource": "URL",
                "query": "json(https://x).a",
                "proof_type": 0
            })
        );

        let pair = CreateQueryRequest {
            when: 0,
            datasource: "URL".to_string(),
            query: Formula::Pair("URL".to_string(), "json(x)".to_string()),
            proof_type: 0x11,
        };
        assert_eq!(serde_json::to_value(&pair).unwrap()["query"], json!(["URL", "json(x)"]));
    }

    #[test]
    fn test_query_check_defaults() {
        let check: QueryCheck = serde_json::from_value(json!({})).unwrap();
        assert!(!check.success);
        assert!(check.results.is_empty());
        assert!(check.proofs.is_empty());

        let check: QueryCheck = serde_json::from_value(json!({
            "success": true,
            "results": ["42"],
            "proofs": [null]
        }))
        .unwrap();
        assert!(check.success);
        assert_eq!(check.results, vec!["42".to_string()]);
        assert_eq!(check.proofs, vec![None]);
    }
}
