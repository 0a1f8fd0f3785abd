//! Per-phase fan-out over identities.
//!
//! Every phase follows the same shape: build a fresh [`ConcurrencyLimiter`],
//! acquire a slot, spawn one task for the identity, and after the last
//! identity is dispatched, join every task before returning. Returning from
//! a phase method therefore means every task of that phase has settled.
//!
//! Once the interrupt flag is set, a phase stops dispatching: identities
//! still waiting for a slot are skipped and only tasks already spawned are
//! joined.
//!
//! Individual identity failures never fail a phase. They are logged with the
//! phase tag and recorded in [`RunStatistics`]. Only limiter and session
//! directory errors surface as `Err`.

use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use super::limiter::{ConcurrencyLimiter, LimiterError};
use super::retry::{RetryOutcome, RetryPolicy, run_with_retry};
use super::Phase;
use crate::error::LoadTestError;
use crate::identity::{Identity, identities, password_for};
use crate::service::{DataOwner, LoginResponse, TargetService};
use crate::session::{SessionArtifact, SessionStore};
use crate::stats::RunStatistics;

/// What one phase invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Which phase ran.
    pub phase: Phase,
    /// Identities dispatched (each at most once).
    pub processed: usize,
    /// Identities never dispatched because the run was interrupted.
    pub skipped: usize,
    /// Highest number of identities in flight at once.
    pub peak_in_flight: usize,
    /// Wall-clock duration from first dispatch to last join.
    pub elapsed: Duration,
}

impl PhaseSummary {
    fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            processed: 0,
            skipped: 0,
            peak_in_flight: 0,
            elapsed: Duration::ZERO,
        }
    }
}

struct ExecutorInner {
    service: Arc<dyn TargetService>,
    sessions: Arc<dyn SessionStore>,
    stats: Arc<RunStatistics>,
    retry_policy: RetryPolicy,
}

/// How often a phase blocked on its ceiling re-checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Runs lifecycle phases against a [`TargetService`], recording into shared statistics.
#[derive(Clone)]
pub struct PhaseExecutor {
    inner: Arc<ExecutorInner>,
    interrupted: Arc<AtomicBool>,
}

impl std::fmt::Debug for PhaseExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseExecutor")
            .field("retry_policy", &self.inner.retry_policy)
            .field("interrupted", &self.is_interrupted())
            .finish_non_exhaustive()
    }
}

impl PhaseExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        service: Arc<dyn TargetService>,
        sessions: Arc<dyn SessionStore>,
        stats: Arc<RunStatistics>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                service,
                sessions,
                stats,
                retry_policy,
            }),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an interrupt flag; once set, phases stop dispatching new identities.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Returns the shared statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<RunStatistics> {
        &self.inner.stats
    }

    /// Returns the shared session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.inner.sessions
    }

    /// Registers every identity, with retry.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError`] if `concurrency` is zero or the limiter closes.
    #[instrument(skip(self, identities), fields(count = identities.len()))]
    pub async fn register(
        &self,
        identities: Vec<Identity>,
        concurrency: usize,
    ) -> Result<PhaseSummary, LimiterError> {
        info!(
            "Phase 1: Registering {} users with concurrency {}",
            identities.len(),
            concurrency
        );
        let summary = self
            .fan_out(Phase::Register, identities, concurrency, register_one)
            .await?;
        info!(
            "Phase 1 completed. Registered {} users",
            self.inner.stats.registered_count()
        );
        Ok(summary)
    }

    /// Logs in every user registered at the moment the phase starts, with retry.
    ///
    /// An empty registered set is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError`] if `concurrency` is zero or the limiter closes.
    #[instrument(skip(self))]
    pub async fn login(&self, concurrency: usize) -> Result<PhaseSummary, LimiterError> {
        let registered = self.inner.stats.registered_users();
        info!(
            "Phase 2: Logging in {} successfully registered users",
            registered.len()
        );
        if registered.is_empty() {
            warn!("No users were successfully registered. Skipping login phase.");
            return Ok(PhaseSummary::skipped(Phase::Login));
        }

        let summary = self
            .fan_out(Phase::Login, registered, concurrency, login_one)
            .await?;
        info!(
            "Phase 2 completed. Logged in {} users",
            self.inner.stats.logged_in_count()
        );
        Ok(summary)
    }

    /// Retries login one user at a time for everyone registered but not logged in.
    ///
    /// Each user gets the full retry policy again. Counters are shared with
    /// the bulk login phase.
    #[instrument(skip(self))]
    pub async fn retry_missing_logins(&self) -> PhaseSummary {
        let pending = self.inner.stats.pending_logins();
        if pending.is_empty() {
            return PhaseSummary::skipped(Phase::Login);
        }

        warn!("{} users failed to login. Retrying...", pending.len());
        let started = Instant::now();
        let total = pending.len();
        let mut processed = 0;
        for username in pending {
            if self.is_interrupted() {
                warn!("Interrupted. Skipping {} remaining login retries", total - processed);
                break;
            }
            login_one(Arc::clone(&self.inner), username).await;
            processed += 1;
        }

        PhaseSummary {
            phase: Phase::Login,
            processed,
            skipped: total - processed,
            peak_in_flight: 1,
            elapsed: started.elapsed(),
        }
    }

    /// Logs out every user currently holding a session. One attempt each, no retry.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError`] if `concurrency` is zero or the limiter closes.
    #[instrument(skip(self))]
    pub async fn logout(&self, concurrency: usize) -> Result<PhaseSummary, LimiterError> {
        let logged_in = self.inner.stats.logged_in_users();
        info!("Phase 3: Logging out {} users", logged_in.len());
        if logged_in.is_empty() {
            warn!("No users are logged in. Skipping logout phase.");
            return Ok(PhaseSummary::skipped(Phase::Logout));
        }

        let summary = self
            .fan_out(Phase::Logout, logged_in, concurrency, logout_one)
            .await?;
        info!("Phase 3 completed. Users logged out");
        Ok(summary)
    }

    /// Clears data for `user<first>..=user<last>` from every owner, then
    /// discards all stored sessions.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::Limiter`] for limiter failures and
    /// [`LoadTestError::Session`] if the session store cannot be reset.
    #[instrument(skip(self))]
    pub async fn cleanup(
        &self,
        range: RangeInclusive<u32>,
        concurrency: usize,
    ) -> Result<PhaseSummary, LoadTestError> {
        let targets = identities(range);
        info!("Cleanup phase: Clearing data for {} users", targets.len());

        let summary = self
            .fan_out(Phase::Cleanup, targets, concurrency, cleanup_one)
            .await?;
        info!("Cleanup phase completed");

        self.inner.sessions.clear().await?;
        info!("Session artifacts cleaned up");
        Ok(summary)
    }

    /// Dispatches `work` for every item behind a fresh limiter and joins all tasks.
    ///
    /// Stops dispatching when the interrupt flag is set, including while
    /// blocked on the ceiling; spawned tasks are still joined.
    async fn fan_out<I, F, Fut>(
        &self,
        phase: Phase,
        items: Vec<I>,
        concurrency: usize,
        work: F,
    ) -> Result<PhaseSummary, LimiterError>
    where
        I: Send + 'static,
        F: Fn(Arc<ExecutorInner>, I) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let limiter = ConcurrencyLimiter::new(concurrency)?;
        let started = Instant::now();
        let total = items.len();
        let mut handles = Vec::with_capacity(total);

        for item in items {
            if self.is_interrupted() {
                break;
            }
            // Blocks here while the phase is at its ceiling, unless interrupted.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&self.interrupted) => None,
                result = limiter.acquire() => Some(result?),
            };
            let Some(permit) = permit else {
                break;
            };
            let task = work(Arc::clone(&self.inner), item);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                task.await;
            }));
        }

        let processed = handles.len();
        let skipped = total - processed;
        if skipped > 0 {
            warn!(
                "[{}] Interrupted. {} users not dispatched, waiting for {} in-flight",
                phase.tag(),
                skipped,
                limiter.in_flight()
            );
        }

        debug!(%phase, task_count = processed, "waiting for phase tasks");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(%phase, error = %e, "phase task panicked");
            }
        }

        let summary = PhaseSummary {
            phase,
            processed,
            skipped,
            peak_in_flight: limiter.peak(),
            elapsed: started.elapsed(),
        };
        debug!(
            %phase,
            processed,
            peak_in_flight = summary.peak_in_flight,
            elapsed_ms = summary.elapsed.as_millis(),
            "phase joined"
        );
        Ok(summary)
    }
}

async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

fn status_outcome<T>(status: u16, accepted: &[u16], value: T) -> RetryOutcome<T> {
    if accepted.contains(&status) {
        RetryOutcome::Success(value)
    } else {
        RetryOutcome::RetryableFailure(format!("status {status}"))
    }
}

async fn register_one(inner: Arc<ExecutorInner>, identity: Identity) {
    let service = inner.service.as_ref();
    let identity_ref = &identity;
    let report = run_with_retry(
        &inner.retry_policy,
        Phase::Register,
        &identity.username,
        |_| async move {
            match service.register(identity_ref).await {
                Ok(status) => status_outcome(status, &[200], ()),
                Err(e) => RetryOutcome::RetryableFailure(e.to_string()),
            }
        },
    )
    .await;

    match report.result {
        Ok(()) => {
            info!("[REGISTER][+] User {} registered successfully", identity.username);
            inner.stats.record_register_success(&identity.username);
        }
        Err(failure) => {
            error!(
                "[REGISTER][-] Failed to register {} after {} attempts: {}",
                identity.username, report.attempts, failure
            );
            inner.stats.record_register_failure();
        }
    }
}

async fn login_one(inner: Arc<ExecutorInner>, username: String) {
    let service = inner.service.as_ref();
    let password = password_for(&username);
    let (user, pass) = (username.as_str(), password.as_str());
    let report = run_with_retry(&inner.retry_policy, Phase::Login, user, |_| async move {
        match service.login(user, pass).await {
            Ok(LoginResponse { status, artifact }) => status_outcome(status, &[200, 302], artifact),
            Err(e) => RetryOutcome::RetryableFailure(e.to_string()),
        }
    })
    .await;

    let artifact = match report.result {
        Ok(artifact) => artifact.unwrap_or_else(|| SessionArtifact::new("")),
        Err(failure) => {
            error!(
                "[LOGIN][-] Failed to login {} after {} attempts: {}",
                username, report.attempts, failure
            );
            inner.stats.record_login_failure();
            return;
        }
    };

    if let Err(e) = inner.sessions.save(&username, &artifact).await {
        error!("[LOGIN][-] Logged in {} but could not store session: {}", username, e);
        inner.stats.record_login_failure();
        return;
    }

    info!("[LOGIN][+] User {} logged IN successfully", username);
    inner.stats.record_login_success(&username);
}

async fn logout_one(inner: Arc<ExecutorInner>, username: String) {
    let artifact = match inner.sessions.load(&username).await {
        Ok(Some(artifact)) => artifact,
        Ok(None) => {
            warn!("[LOGOUT][-] No session artifact found for {}", username);
            inner.stats.record_logout_failure();
            return;
        }
        Err(e) => {
            error!("[LOGOUT][-] Could not read session for {}: {}", username, e);
            inner.stats.record_logout_failure();
            return;
        }
    };

    match inner.service.logout(&artifact).await {
        Ok(200 | 302) => {
            if let Err(e) = inner.sessions.remove(&username).await {
                warn!("[LOGOUT] Could not remove stored session for {}: {}", username, e);
            }
            info!("[LOGOUT][+] User {} logged OUT successfully", username);
            inner.stats.record_logout_success(&username);
        }
        Ok(status) => {
            warn!("[LOGOUT][-] Failed to logout {}. Status: {}", username, status);
            inner.stats.record_logout_failure();
        }
        Err(e) => {
            error!("[LOGOUT][-] Error logging out {}: {}", username, e);
            inner.stats.record_logout_failure();
        }
    }
}

async fn cleanup_one(inner: Arc<ExecutorInner>, identity: Identity) {
    let username = identity.username.as_str();
    let mut cleared = 0usize;

    for owner in DataOwner::ALL {
        match inner.service.clear_data(owner, username).await {
            Ok(200) => {
                info!("[CLEANUP][+] Data for {} cleared from {}", username, owner.as_str());
                cleared += 1;
            }
            Ok(404) => {
                info!("[CLEANUP][?] No data found for {} in {}", username, owner.as_str());
                inner.stats.record_cleanup_not_found();
            }
            Ok(status) => {
                warn!(
                    "[CLEANUP][-] Failed to clear {} from {}. Status: {}",
                    username,
                    owner.as_str(),
                    status
                );
            }
            Err(e) => {
                error!(
                    "[CLEANUP][-] Error clearing {} from {}: {}",
                    username,
                    owner.as_str(),
                    e
                );
            }
        }
    }

    if cleared == DataOwner::ALL.len() {
        inner.stats.record_cleanup_success();
    } else {
        inner.stats.record_cleanup_failure();
    }
}
