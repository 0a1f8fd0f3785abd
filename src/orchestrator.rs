//! Run modes and phase sequencing.
//!
//! [`LoadTestOrchestrator`] walks a strictly sequential state machine:
//!
//! ```text
//! Idle -> ProbeConnectivity -> Registering -> LoggingIn -> [LoggingOut] -> [CleaningUp] -> Reporting -> Done
//! ```
//!
//! Which phases run is decided by the [`RunMode`]. A failed probe jumps
//! straight to `Done`. An interrupt stops new phases from starting but lets
//! the current phase drain. Every path ends with a [`RunReport`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LoadTestConfig;
use crate::engine::{PhaseExecutor, PhaseSummary};
use crate::error::LoadTestError;
use crate::identity::identities;
use crate::probe::{ConnectivityProbe, ProbeReport};
use crate::report::RunReport;
use crate::service::HttpTargetService;
use crate::session::FileSessionStore;
use crate::stats::RunStatistics;

/// The four mutually exclusive things one invocation can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunMode {
    /// Register then log in `user1..=user<users>`.
    Load {
        /// Number of identities.
        users: u32,
    },
    /// Run the connectivity probe only.
    ConnectivityOnly,
    /// Log out every user currently holding a session.
    LogoutOnly {
        /// Seed the logged-in set from persisted session artifacts first.
        reload_sessions: bool,
    },
    /// Clear data for `user1..=user<users>`.
    Cleanup {
        /// Number of identities.
        users: u32,
    },
}

impl RunMode {
    /// Identity count the mode targets, when it has one.
    #[must_use]
    pub fn requested(self) -> Option<u32> {
        match self {
            Self::Load { users } | Self::Cleanup { users } => Some(users),
            Self::ConnectivityOnly | Self::LogoutOnly { .. } => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { users } => write!(f, "load ({users} users)"),
            Self::ConnectivityOnly => f.write_str("connectivity test"),
            Self::LogoutOnly { .. } => f.write_str("logout"),
            Self::Cleanup { users } => write!(f, "cleanup ({users} users)"),
        }
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ProbeConnectivity,
    Registering,
    LoggingIn,
    LoggingOut,
    CleaningUp,
    Reporting,
    Done,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every requested phase ran; for load runs, every user registered and logged in.
    Completed,
    /// A load run where registered or logged-in counts fell short.
    Partial,
    /// The preflight probe failed; no phase ran.
    ConnectivityFailed,
    /// An interrupt stopped the run between phases.
    Interrupted,
    /// A phase could not run (limiter or session storage failure).
    Aborted,
}

impl RunOutcome {
    /// True for outcomes that should exit the process non-zero.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ConnectivityFailed | Self::Interrupted | Self::Aborted
        )
    }
}

/// Drives one run from probe to report.
#[derive(Debug)]
pub struct LoadTestOrchestrator {
    config: LoadTestConfig,
    probe: ConnectivityProbe,
    executor: PhaseExecutor,
    interrupted: Arc<AtomicBool>,
    state: RunState,
    history: Vec<RunState>,
}

impl LoadTestOrchestrator {
    /// Creates an orchestrator from prebuilt parts.
    #[must_use]
    pub fn new(config: LoadTestConfig, probe: ConnectivityProbe, executor: PhaseExecutor) -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        Self {
            config,
            probe,
            executor: executor.with_interrupt_flag(Arc::clone(&interrupted)),
            interrupted,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    /// Builds the HTTP service, file session store, and probe from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the endpoints cannot be
    /// formed, a client cannot be built, or the session directory cannot be
    /// created.
    pub async fn from_config(config: LoadTestConfig) -> Result<Self, LoadTestError> {
        config.validate()?;
        let endpoints = config.endpoints()?;
        let probe =
            ConnectivityProbe::for_endpoints(&endpoints, config.host_check, config.probe_timeout)?;
        let service = HttpTargetService::new(endpoints, config.request_timeout)?;
        let sessions = FileSessionStore::open(&config.session_dir).await?;
        let executor = PhaseExecutor::new(
            Arc::new(service),
            Arc::new(sessions),
            Arc::new(RunStatistics::new()),
            config.retry_policy(),
        );
        Ok(Self::new(config, probe, executor))
    }

    /// Shares an interrupt flag, typically set by a Ctrl-C handler.
    ///
    /// The flag is checked before each phase and by the executor before each
    /// dispatch, so a running phase stops taking new identities.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.executor = self.executor.with_interrupt_flag(Arc::clone(&flag));
        self.interrupted = flag;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited so far, in order.
    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Shared statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<RunStatistics> {
        self.executor.stats()
    }

    /// Runs `mode` to completion and returns the report.
    #[instrument(skip(self))]
    pub async fn run(&mut self, mode: RunMode) -> RunReport {
        let started = Instant::now();
        let concurrency = match mode {
            RunMode::Load { users } => {
                let effective = self.config.effective_concurrency(users);
                if effective != self.config.concurrency {
                    info!("Auto-scaling concurrency to {} for {} users", effective, users);
                }
                effective
            }
            RunMode::ConnectivityOnly | RunMode::LogoutOnly { .. } | RunMode::Cleanup { .. } => {
                self.config.concurrency
            }
        };

        self.transition(RunState::ProbeConnectivity);
        let probe = self.probe.run().await;
        if let Err(e) = probe.ensure_reachable(self.probe.host()) {
            error!("{}", e);
            self.transition(RunState::Done);
            return self.report(
                mode,
                concurrency,
                started,
                RunOutcome::ConnectivityFailed,
                Some(probe),
                Some(e.to_string()),
            );
        }
        info!("All connectivity tests passed");

        let result = match mode {
            RunMode::ConnectivityOnly => Ok(()),
            RunMode::Load { users } => self.run_load(users, concurrency).await,
            RunMode::LogoutOnly { reload_sessions } => {
                self.run_logout(reload_sessions, concurrency).await
            }
            RunMode::Cleanup { users } => self.run_cleanup(users, concurrency).await,
        };

        self.transition(RunState::Reporting);
        let (outcome, error) = match result {
            Err(e) => {
                error!("Test failed with error: {}", e);
                (RunOutcome::Aborted, Some(e.to_string()))
            }
            Ok(()) if self.is_interrupted() => {
                warn!("Test interrupted by user");
                (RunOutcome::Interrupted, None)
            }
            Ok(()) => (self.load_outcome(mode), None),
        };

        let report = self.report(mode, concurrency, started, outcome, Some(probe), error);
        self.transition(RunState::Done);
        report
    }

    async fn run_load(&mut self, users: u32, concurrency: usize) -> Result<(), LoadTestError> {
        info!(
            "Starting load test with {} users (concurrency: {})",
            users, concurrency
        );

        if self.is_interrupted() {
            return Ok(());
        }
        self.transition(RunState::Registering);
        let summary = self.executor.register(identities(1..=users), concurrency).await?;
        log_summary(&summary);

        if self.is_interrupted() {
            return Ok(());
        }
        self.transition(RunState::LoggingIn);
        let summary = self.executor.login(concurrency).await?;
        log_summary(&summary);

        if self.config.login_retry_pass && !self.is_interrupted() {
            let summary = self.executor.retry_missing_logins().await;
            if summary.processed > 0 {
                log_summary(&summary);
            }
        }
        Ok(())
    }

    async fn run_logout(
        &mut self,
        reload_sessions: bool,
        concurrency: usize,
    ) -> Result<(), LoadTestError> {
        if reload_sessions {
            let usernames = self.executor.sessions().usernames().await?;
            info!("Reloaded {} stored sessions", usernames.len());
            for username in &usernames {
                self.executor.stats().restore_session(username);
            }
        }

        if self.is_interrupted() {
            return Ok(());
        }
        self.transition(RunState::LoggingOut);
        let summary = self.executor.logout(concurrency).await?;
        log_summary(&summary);
        Ok(())
    }

    async fn run_cleanup(&mut self, users: u32, concurrency: usize) -> Result<(), LoadTestError> {
        if self.is_interrupted() {
            return Ok(());
        }
        self.transition(RunState::CleaningUp);
        let summary = self.executor.cleanup(1..=users, concurrency).await?;
        log_summary(&summary);
        Ok(())
    }

    fn load_outcome(&self, mode: RunMode) -> RunOutcome {
        let RunMode::Load { users } = mode else {
            return RunOutcome::Completed;
        };
        let stats = self.executor.stats();
        let registered = stats.registered_count();
        let logged_in = stats.logged_in_count();
        if registered == users as usize && logged_in == registered {
            RunOutcome::Completed
        } else {
            RunOutcome::Partial
        }
    }

    fn report(
        &self,
        mode: RunMode,
        concurrency: usize,
        started: Instant,
        outcome: RunOutcome,
        probe: Option<ProbeReport>,
        error: Option<String>,
    ) -> RunReport {
        RunReport {
            mode,
            requested: mode.requested(),
            concurrency,
            outcome,
            stats: self.executor.stats().snapshot(),
            probe,
            elapsed: started.elapsed(),
            error,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.history.push(next);
    }
}

fn log_summary(summary: &PhaseSummary) {
    debug!(
        phase = %summary.phase,
        processed = summary.processed,
        peak_in_flight = summary.peak_in_flight,
        elapsed_ms = summary.elapsed.as_millis(),
        "phase finished"
    );
}
