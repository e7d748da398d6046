//! Error types for agora-llm

use thiserror::Error;

/// Model invocation error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error returned by the provider
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Stream ended before the model finished its answer
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
