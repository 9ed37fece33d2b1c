use thiserror::Error;

/// Error taxonomy for the oracle bridge.
///
/// Errors never propagate into the ledger's event-delivery path: decode
/// failures skip the offending log, transport failures are retried and
/// eventually fail the query, and execution failures become inline
/// annotations on the query's history entry.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed log payload for a matched event signature.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Network or HTTP failure talking to the external query service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The query service answered, but with a body the bridge cannot use.
    #[error("Service error: {0}")]
    Service(String),

    /// The callback transaction reverted or was rejected during execution.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Proof supplied but not decodable in its declared format.
    #[error("Proof format error: {0}")]
    ProofFormat(String),

    /// The ledger rejected an operation outside transaction execution.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the operation that produced this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

impl From<ethers::abi::Error> for BridgeError {
    fn from(err: ethers::abi::Error) -> Self {
        BridgeError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_decode_error() {
        let err = BridgeError::Decode("short payload".to_string());
        assert_eq!(format!("{}", err), "Decode error: short payload");
    }

    #[test]
    fn test_display_execution_error() {
        let err = BridgeError::Execution("out of gas".to_string());
        assert_eq!(format!("{}", err), "Execution error: out of gas");
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(BridgeError::Transport("connection reset".to_string()).is_retryable());
        assert!(!BridgeError::Service("missing id".to_string()).is_retryable());
        assert!(!BridgeError::Decode("bad word".to_string()).is_retryable());
        assert!(!BridgeError::ProofFormat("not base58".to_string()).is_retryable());
    }

    #[test]
    fn test_from_abi_error() {
        let abi_err = ethers::abi::Error::InvalidData;
        let err: BridgeError = abi_err.into();
        assert!(matches!(err, BridgeError::Decode(_)));
    }
}
