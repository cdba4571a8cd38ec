use thiserror::Error;

/// Boxed cause carried by transport-level failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (authentication tag mismatch or wrong key)")]
    Decrypt,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    #[error("Service unavailable (retry after {retry_after}s)")]
    ServiceUnavailable { retry_after: u64 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("User inactive: {0}")]
    UserInactive(String),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Bad HMAC at entry {index}: {actual} != {expected}")]
    Integrity {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl JournalError {
    /// Failures worth retrying later without changing anything locally.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JournalError::Network(_) | JournalError::ServiceUnavailable { .. }
        )
    }

    /// Push rejected because the server's chain tip moved past `last`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, JournalError::Http { status: 409, .. })
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            JournalError::ServiceUnavailable { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;
