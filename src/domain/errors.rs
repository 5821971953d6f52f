//! Domain errors for the coverloop generation engine.

use thiserror::Error;

/// Domain-level errors that can occur while running a generation session.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Redundancy index unavailable: {0}")]
    RedundancyIndex(String),

    #[error("Execution environment error: {0}")]
    ExecutionEnvironment(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

/// Errors raised by the synthesis service (test generation and repair).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Synthesis service returned an empty test body")]
    EmptyResponse,

    #[error("Synthesis service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Synthesis request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid synthesis request: {0}")]
    InvalidRequest(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Malformed synthesis response: {0}")]
    MalformedResponse(String),
}

impl SynthesisError {
    /// Whether retrying the same request can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::EmptyResponse
                | Self::Unavailable(_)
                | Self::RateLimited(_)
                | Self::Timeout(_)
                | Self::MalformedResponse(_)
        )
    }
}
