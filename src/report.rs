//! Final run report.
//!
//! [`RunReport`] renders as the human-readable statistics block via
//! `Display`, and as JSON via [`RunReport::to_json`].

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::orchestrator::{RunMode, RunOutcome};
use crate::probe::ProbeReport;
use crate::stats::StatsSnapshot;

const RULE_WIDTH: usize = 60;

/// Everything known at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// What the run was asked to do.
    pub mode: RunMode,
    /// Identity count, for modes that take one.
    pub requested: Option<u32>,
    /// Concurrency ceiling the phases ran with.
    pub concurrency: usize,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Statistics at the end of the run.
    pub stats: StatsSnapshot,
    /// Preflight probe result.
    pub probe: Option<ProbeReport>,
    /// Wall-clock time for the whole run.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Error that aborted the run, if any.
    pub error: Option<String>,
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl RunReport {
    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The closing verdict line for load runs.
    #[must_use]
    pub fn verdict(&self) -> Option<String> {
        let RunMode::Load { users } = self.mode else {
            return None;
        };
        let registered = self.stats.registered.len();
        let logged_in = self.stats.logged_in.len();
        if self.outcome == RunOutcome::Completed {
            Some("SUCCESS: All users registered and logged in!".to_string())
        } else {
            Some(format!(
                "PARTIAL SUCCESS: {registered}/{users} registered, {logged_in}/{registered} logged in"
            ))
        }
    }

    fn write_probe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(probe) = &self.probe else {
            return Ok(());
        };
        writeln!(f, "CONNECTIVITY:")?;
        if !probe.host_reachable {
            writeln!(f, "  Host:         unreachable")?;
        }
        for endpoint in &probe.endpoints {
            let status = match (endpoint.status, &endpoint.error) {
                (Some(code), _) => code.to_string(),
                (None, Some(error)) => error.clone(),
                (None, None) => "no response".to_string(),
            };
            let verdict = if endpoint.reachable { "ok" } else { "FAILED" };
            writeln!(f, "  {:<24}{verdict} ({status})", endpoint.name)?;
        }
        Ok(())
    }
}

fn write_rate(f: &mut fmt::Formatter<'_>, rate: Option<f64>) -> fmt::Result {
    match rate {
        Some(rate) => writeln!(f, "  Success Rate: {rate:.1}%"),
        None => writeln!(f, "  Success Rate: N/A"),
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        let stats = &self.stats;

        match self.outcome {
            RunOutcome::ConnectivityFailed => {
                self.write_probe(f)?;
                if let Some(error) = &self.error {
                    writeln!(f, "{error}")?;
                }
                writeln!(f, "Connectivity test failed. Please check your services.")?;
                return write!(f, "Total execution time: {:.2} seconds", self.elapsed.as_secs_f64());
            }
            RunOutcome::Interrupted => writeln!(f, "Test interrupted by user")?,
            RunOutcome::Aborted => {
                let error = self.error.as_deref().unwrap_or("unknown error");
                writeln!(f, "Test failed with error: {error}")?;
            }
            RunOutcome::Completed | RunOutcome::Partial => {}
        }

        if self.mode == RunMode::ConnectivityOnly {
            self.write_probe(f)?;
            writeln!(f, "All connectivity tests passed")?;
            return write!(f, "Total execution time: {:.2} seconds", self.elapsed.as_secs_f64());
        }

        writeln!(f, "{rule}")?;
        writeln!(f, "{:^width$}", "LOAD TEST STATISTICS", width = RULE_WIDTH)?;
        writeln!(f, "{rule}")?;

        writeln!(f, "REGISTRATION:")?;
        writeln!(f, "  Successful:   {}", stats.register_success)?;
        writeln!(f, "  Failed:       {}", stats.register_failed)?;
        writeln!(f, "  Total:        {}", stats.register_total())?;
        write_rate(f, stats.register_success_rate())?;
        writeln!(f)?;

        writeln!(f, "LOGIN:")?;
        writeln!(f, "  Successful:   {}", stats.login_success)?;
        writeln!(f, "  Failed:       {}", stats.login_failed)?;
        writeln!(f, "  Total:        {}", stats.login_total())?;
        write_rate(f, stats.login_success_rate())?;
        writeln!(f)?;

        if stats.logout_total() > 0 {
            writeln!(f, "LOGOUT:")?;
            writeln!(f, "  Successful:   {}", stats.logout_success)?;
            writeln!(f, "  Failed:       {}", stats.logout_failed)?;
            writeln!(f, "  Total:        {}", stats.logout_total())?;
            writeln!(f)?;
        }

        if stats.cleanup_total() > 0 {
            writeln!(f, "CLEANUP:")?;
            writeln!(f, "  Successful:   {}", stats.cleanup_success)?;
            writeln!(f, "  Not Found:    {}", stats.cleanup_not_found)?;
            writeln!(f, "  Failed:       {}", stats.cleanup_failed)?;
            writeln!(f, "  Total:        {}", stats.cleanup_total())?;
            writeln!(f)?;
        }

        writeln!(f, "SUMMARY:")?;
        writeln!(f, "  Users Registered: {}", stats.registered.len())?;
        writeln!(f, "  Users Logged In:  {}", stats.logged_in.len())?;
        writeln!(f, "{rule}")?;
        write!(f, "Total execution time: {:.2} seconds", self.elapsed.as_secs_f64())?;

        if let Some(verdict) = self.verdict() {
            write!(f, "\n{verdict}")?;
        }
        Ok(())
    }
}
