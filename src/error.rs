//! Error types shared across the load-test engine.
//!
//! Per-request failures ([`RequestError`]) never abort a phase; they are
//! classified into retry outcomes and absorbed into the run statistics.
//! [`LoadTestError`] covers the failures that do stop a run.

use thiserror::Error;

use crate::engine::LimiterError;
use crate::session::SessionError;

/// Transport-level failure of a single request to the target service.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Network-level error (DNS resolution, connection refused, reset, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },
}

impl RequestError {
    /// Classifies a reqwest error, splitting timeouts out from other network errors.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }
}

/// Failures that stop a run instead of being recorded in statistics.
#[derive(Debug, Error)]
pub enum LoadTestError {
    /// Preflight connectivity check failed; no phase was started.
    #[error("connectivity check failed: unreachable: {}", unreachable.join(", "))]
    Connectivity {
        /// Names of the targets that could not be reached.
        unreachable: Vec<String>,
    },

    /// The concurrency limiter could not be built or was closed.
    #[error(transparent)]
    Limiter(#[from] LimiterError),

    /// Session storage could not be prepared or cleared.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Endpoint configuration is unusable.
    #[error("invalid endpoint configuration: {0}")]
    Endpoint(String),

    /// A resolved configuration value is out of range.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    InvalidConfig {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Accepted range, for display.
        expected: &'static str,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
