//! Error types for the bundler

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bundler
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    // Endpoint errors
    #[error("No endpoint available after {waited_ms}ms")]
    NoEndpointAvailable { waited_ms: u64 },

    #[error("RPC error: {0}")]
    Rpc(String),

    // Bundle construction errors
    #[error("Bundle must contain between 1 and {limit} wallet transactions, got {len}")]
    BundleTooLarge { len: usize, limit: usize },

    #[error("Blockhash unavailable: {0}")]
    BlockhashUnavailable(String),

    #[error("Signing failed for wallet {wallet}: {reason}")]
    SigningFailed { wallet: String, reason: String },

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Price calculation overflow")]
    PriceOverflow,

    // Relay errors
    #[error("Relay transport error: {0}")]
    RelayTransport(String),

    #[error("Relay rate limited: {0}")]
    RateLimited(String),

    #[error("Bundle rejected by relay: {reason}")]
    RelayRejected { reason: String },

    #[error("Submission retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Submission cancelled")]
    Cancelled,

    #[error("Bundle not confirmed within {0}ms")]
    ConfirmationTimeout(u64),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RelayTransport(_) | Error::RateLimited(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::RelayTransport(format!("request timed out: {}", e))
        } else {
            Error::RelayTransport(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(Error::Rpc("connection reset".into()).is_retryable());
        assert!(Error::RateLimited("429".into()).is_retryable());
        assert!(Error::RelayTransport("502".into()).is_retryable());
        assert!(!Error::RelayRejected { reason: "blockhash expired".into() }.is_retryable());
        assert!(!Error::BundleTooLarge { len: 0, limit: 4 }.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!Error::UnknownNetwork("devnet".into()).is_retryable());
        assert!(!Error::SigningFailed {
            wallet: "buyer-1".into(),
            reason: "missing signer".into()
        }
        .is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }
}
