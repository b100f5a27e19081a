use thiserror::Error;

/// Failure taxonomy for catalog and asset fetches.
///
/// `ResourceExhausted` is a soft rejection, not a hard failure: the request
/// was refused before buffering to avoid overcommitting memory, and the same
/// key is immediately eligible for another attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (connect, send, non-success status).
    #[error("transport error: {0}")]
    Transport(String),

    /// Catalog response body could not be parsed.
    #[error("malformed catalog response: {0}")]
    Format(String),

    /// Asset bytes are not a recognized image format.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Declared body size exceeds the currently available memory budget.
    #[error("fetch rejected: declared size {declared} exceeds available budget {available}")]
    ResourceExhausted { declared: u64, available: u64 },
}

impl FetchError {
    /// Soft rejections may be retried immediately without backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::ResourceExhausted { .. })
    }
}
