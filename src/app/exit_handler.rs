//! Exit code logic for the load test process.
//!
//! Single responsibility: map the run outcome to the process exit outcome.

use loadtest_core::RunOutcome;

use crate::ProcessExit;

/// Determines the process exit outcome from how the run ended.
///
/// Partial load runs still exit zero: the shortfall is in the report.
pub(crate) fn determine_exit_outcome(outcome: RunOutcome) -> ProcessExit {
    match outcome {
        RunOutcome::Completed => ProcessExit::Success,
        RunOutcome::Partial => ProcessExit::Partial,
        RunOutcome::ConnectivityFailed | RunOutcome::Interrupted | RunOutcome::Aborted => {
            ProcessExit::Failure
        }
    }
}
