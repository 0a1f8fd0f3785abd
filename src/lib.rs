//! Load Test Core Library
//!
//! This library drives a phased user-lifecycle load test against a remote
//! HTTP service: synthetic identities are registered, logged in, optionally
//! logged out, and finally have their data cleared, with per-operation
//! success/failure statistics collected along the way.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`identity`] - Deterministic synthetic user generation
//! - [`engine`] - Retry policy, concurrency limiter, and phase execution
//! - [`session`] - Per-user session artifact storage
//! - [`stats`] - Concurrently updated run statistics
//! - [`service`] - Target service seam and its HTTP implementation
//! - [`probe`] - Preflight connectivity checks
//! - [`orchestrator`] - Run modes and phase sequencing
//! - [`report`] - Final human-readable and JSON run report
//! - [`config`] - Resolved runtime configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod service;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use config::{
    DEFAULT_AUTH_PORT, DEFAULT_BACKOFF, DEFAULT_CONCURRENCY, DEFAULT_FRONT_END_PORT,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_PROFILE_PORT, DEFAULT_REQUEST_TIMEOUT, LoadTestConfig,
    auto_scaled_concurrency,
};
pub use engine::{
    ConcurrencyLimiter, DEFAULT_MAX_ATTEMPTS, LimiterError, Phase, PhaseExecutor, RetryOutcome,
    RetryPolicy, RetryReport, TerminalFailure, run_with_retry,
};
pub use error::{LoadTestError, RequestError};
pub use identity::{Identity, identities};
pub use orchestrator::{LoadTestOrchestrator, RunMode, RunOutcome, RunState};
pub use probe::{ConnectivityProbe, EndpointStatus, HostCheck, ProbeReport, ProbeTarget};
pub use report::RunReport;
pub use service::{DataOwner, Endpoints, HttpTargetService, LoginResponse, TargetService};
pub use session::{FileSessionStore, MemorySessionStore, SessionArtifact, SessionError, SessionStore};
pub use stats::{RunStatistics, StatsSnapshot};
