//! Resolved runtime configuration.
//!
//! [`LoadTestConfig`] is the fully merged view (defaults, config file, CLI)
//! handed to the orchestrator. Range checks happen once, in
//! [`LoadTestConfig::validate`], so every later component can trust it.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::RetryPolicy;
use crate::error::LoadTestError;
use crate::probe::HostCheck;
use crate::service::{Endpoints, ServicePorts};

pub use crate::engine::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
pub use crate::service::{DEFAULT_AUTH_PORT, DEFAULT_FRONT_END_PORT, DEFAULT_PROFILE_PORT};

/// Default per-phase concurrency ceiling.
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Default timeout for one phase request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for one connectivity probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default directory for persisted session artifacts.
pub const DEFAULT_SESSION_DIR: &str = "cookie";

/// Identity count at which the default ceiling is scaled up.
pub const AUTO_SCALE_THRESHOLD: u32 = 1000;

/// Upper bound for an auto-scaled ceiling.
pub const AUTO_SCALE_MAX: usize = 100;

/// Accepted concurrency range.
pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=1000;

/// Accepted retry attempt range.
pub const RETRIES_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Accepted timeout range, in seconds.
pub const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

/// Returns the scaled ceiling for large runs, or `None` below the threshold.
///
/// `N / 20` capped at 100, so 1000 users run at 50 and 2000+ at 100.
#[must_use]
pub fn auto_scaled_concurrency(identity_count: u32) -> Option<usize> {
    if identity_count < AUTO_SCALE_THRESHOLD {
        return None;
    }
    let scaled = usize::try_from(identity_count / 20).unwrap_or(AUTO_SCALE_MAX);
    Some(scaled.min(AUTO_SCALE_MAX))
}

/// Everything a run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestConfig {
    /// Target host name or IP.
    pub host: String,
    /// Route login/logout through the front-end.
    pub use_front_end: bool,
    /// Service ports.
    pub ports: ServicePorts,
    /// Per-phase concurrency ceiling.
    pub concurrency: usize,
    /// Whether `concurrency` was set explicitly (disables auto-scaling).
    pub concurrency_explicit: bool,
    /// Total attempts per register/login.
    pub retries: u32,
    /// Delay between attempts.
    pub backoff: Duration,
    /// Timeout for one phase request.
    pub request_timeout: Duration,
    /// Timeout for one probe request.
    pub probe_timeout: Duration,
    /// Host reachability check before HTTP probes.
    pub host_check: HostCheck,
    /// Directory holding session artifacts.
    pub session_dir: PathBuf,
    /// Run a serial login pass for users left out of the bulk login phase.
    pub login_retry_pass: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            use_front_end: true,
            ports: ServicePorts::default(),
            concurrency: DEFAULT_CONCURRENCY,
            concurrency_explicit: false,
            retries: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            host_check: HostCheck::Ping,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            login_retry_pass: true,
        }
    }
}

impl LoadTestConfig {
    /// Checks every bounded value.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::InvalidConfig`] for the first out-of-range value.
    pub fn validate(&self) -> Result<(), LoadTestError> {
        if !CONCURRENCY_RANGE.contains(&self.concurrency) {
            return Err(LoadTestError::InvalidConfig {
                field: "concurrency",
                value: self.concurrency as u64,
                expected: "1..=1000",
            });
        }
        if !RETRIES_RANGE.contains(&self.retries) {
            return Err(LoadTestError::InvalidConfig {
                field: "retries",
                value: u64::from(self.retries),
                expected: "1..=20",
            });
        }
        validate_timeout("request_timeout_secs", self.request_timeout)?;
        validate_timeout("probe_timeout_secs", self.probe_timeout)?;
        if self.host.trim().is_empty() {
            return Err(LoadTestError::Endpoint("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Ceiling to use for a run over `identity_count` identities.
    #[must_use]
    pub fn effective_concurrency(&self, identity_count: u32) -> usize {
        if self.concurrency_explicit || self.concurrency != DEFAULT_CONCURRENCY {
            return self.concurrency;
        }
        auto_scaled_concurrency(identity_count).unwrap_or(self.concurrency)
    }

    /// Retry policy for register and login.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.backoff)
    }

    /// Endpoint layout for this host and routing mode.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::Endpoint`] if the host does not form valid URLs.
    pub fn endpoints(&self) -> Result<Endpoints, LoadTestError> {
        Endpoints::new(&self.host, self.ports, self.use_front_end)
    }
}

fn validate_timeout(field: &'static str, value: Duration) -> Result<(), LoadTestError> {
    let secs = value.as_secs();
    if TIMEOUT_SECS_RANGE.contains(&secs) {
        Ok(())
    } else {
        Err(LoadTestError::InvalidConfig {
            field,
            value: secs,
            expected: "1..=3600",
        })
    }
}
