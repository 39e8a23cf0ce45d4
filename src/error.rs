//! Error types for the resolution pipeline
//!
//! Provider-level failures (`ProviderError`) never escape a provider chain;
//! the chain folds them into `ResolveError::AllProvidersExhausted`. Normalizer
//! failures surface as `ResolveError::Validation`.

use thiserror::Error;

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The call did not settle within its timeout
    #[error("timeout")]
    Timeout,

    /// The provider answered, but the payload is unusable
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The request never got an answer (DNS, connect, TLS, body read)
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider refused or is not applicable to this input
    #[error("declined: {0}")]
    Declined(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Result of one provider call
pub type ProviderOutcome<T> = Result<T, ProviderError>;

/// Errors returned by the public service operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Every provider in a chain failed; one reason per provider, in order
    #[error("all providers failed: {}", .0.join("; "))]
    AllProvidersExhausted(Vec<String>),

    /// A mandatory block of the weather payload is missing
    #[error("invalid weather payload: missing {0}")]
    Validation(String),

    /// Coordinates outside the valid longitude/latitude ranges
    #[error("invalid coordinate: longitude {longitude}, latitude {latitude}")]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// The request coalescer has been shut down
    #[error("weather cache has been shut down")]
    ShutDown,

    /// A background fetch task terminated abnormally
    #[error("internal error: {0}")]
    Internal(String),
}
