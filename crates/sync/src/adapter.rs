//! Source adapter contract.
//!
//! HTTP clients and authentication live outside the engine; an adapter only
//! has to hand back one backend's raw records or a single typed error.

use std::time::Duration;

use async_trait::async_trait;
use roadmap_core::raw::RawBatch;
use roadmap_core::SourceSystem;

/// Why a backend's data is missing from a cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The backend could not be reached
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Credentials were rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend throttled the request
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The fetch exceeded the adapter timeout
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// Get string representation of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Unreachable(_) => "unreachable",
            AdapterError::Unauthorized(_) => "unauthorized",
            AdapterError::RateLimited(_) => "rate_limited",
            AdapterError::TimedOut(_) => "timed_out",
            AdapterError::Other(_) => "other",
        }
    }
}

/// A backend the coordinator fetches from once per cycle.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Backend this adapter reads.
    fn backend(&self) -> SourceSystem;

    /// Fetch the backend's complete current data.
    async fn fetch(&self) -> Result<RawBatch, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AdapterError::Unreachable("dns".into()).kind(), "unreachable");
        assert_eq!(AdapterError::RateLimited("429".into()).kind(), "rate_limited");
        assert_eq!(AdapterError::TimedOut(Duration::from_secs(30)).kind(), "timed_out");
    }

    #[test]
    fn test_timeout_message() {
        let err = AdapterError::TimedOut(Duration::from_secs(30));
        assert_eq!(err.to_string(), "timed out after 30s");
    }
}
