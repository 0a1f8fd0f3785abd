//! Phase execution engine.
//!
//! This module provides the building blocks that run one lifecycle phase
//! across many identities:
//!
//! - [`RetryPolicy`] and [`run_with_retry`] - bounded attempts with fixed backoff
//! - [`ConcurrencyLimiter`] - per-phase ceiling on in-flight identities
//! - [`PhaseExecutor`] - register / login / logout / cleanup fan-out
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use loadtest_core::engine::{PhaseExecutor, RetryPolicy};
//! use loadtest_core::service::{Endpoints, HttpTargetService, ServicePorts};
//! use loadtest_core::session::MemorySessionStore;
//! use loadtest_core::stats::RunStatistics;
//! use loadtest_core::identity::identities;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoints = Endpoints::new("localhost", ServicePorts::default(), false)?;
//! let service = HttpTargetService::new(endpoints, Duration::from_secs(30))?;
//! let executor = PhaseExecutor::new(
//!     Arc::new(service),
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(RunStatistics::new()),
//!     RetryPolicy::default(),
//! );
//! executor.register(identities(1..=100), 50).await?;
//! executor.login(50).await?;
//! println!("{:?}", executor.stats().snapshot());
//! # Ok(())
//! # }
//! ```

use std::fmt;

mod limiter;
mod phase;
mod retry;

pub use limiter::{ConcurrencyLimiter, LimiterError, LimiterPermit};
pub use phase::{PhaseExecutor, PhaseSummary};
pub use retry::{
    DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, RetryOutcome, RetryPolicy, RetryReport,
    TerminalFailure, run_with_retry,
};

/// One lifecycle step applied across an identity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Create accounts.
    Register,
    /// Obtain sessions for registered accounts.
    Login,
    /// Tear down held sessions.
    Logout,
    /// Clear all per-identity data from every owner.
    Cleanup,
}

impl Phase {
    /// Upper-case tag prefixed to per-identity log lines.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Cleanup => "CLEANUP",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}
