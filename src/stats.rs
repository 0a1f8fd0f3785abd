//! Run statistics shared by every phase task.
//!
//! [`RunStatistics`] is the one piece of mutable state all tasks touch. Counters
//! are atomics and the identity sets are concurrent sets, so tasks update it
//! through `&self` without an outer lock. After a phase barrier, callers take a
//! [`StatsSnapshot`] for reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use serde::Serialize;

use crate::identity::index_of;

/// Concurrently updated counters and identity sets for one run.
#[derive(Debug, Default)]
pub struct RunStatistics {
    register_success: AtomicUsize,
    register_failed: AtomicUsize,
    login_success: AtomicUsize,
    login_failed: AtomicUsize,
    logout_success: AtomicUsize,
    logout_failed: AtomicUsize,
    cleanup_success: AtomicUsize,
    cleanup_failed: AtomicUsize,
    cleanup_not_found: AtomicUsize,
    registered: DashSet<String>,
    logged_in: DashSet<String>,
}

/// Point-in-time copy of [`RunStatistics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Identities registered successfully.
    pub register_success: usize,
    /// Identities whose registration exhausted every attempt.
    pub register_failed: usize,
    /// Login attempts that ended in a stored session.
    pub login_success: usize,
    /// Login attempts that exhausted every attempt, counting the retry pass.
    pub login_failed: usize,
    /// Sessions logged out.
    pub logout_success: usize,
    /// Logouts rejected, errored, or missing an artifact.
    pub logout_failed: usize,
    /// Identities cleared from every owner.
    pub cleanup_success: usize,
    /// Identities with at least one owner not clearing them.
    pub cleanup_failed: usize,
    /// Owner responses reporting no data to clear.
    pub cleanup_not_found: usize,
    /// Usernames that registered successfully, sorted.
    pub registered: Vec<String>,
    /// Usernames currently holding a session, sorted.
    pub logged_in: Vec<String>,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

// Generated usernames order by index (`user2` before `user10`); any others sort last.
fn sorted(set: &DashSet<String>) -> Vec<String> {
    let mut names: Vec<String> = set.iter().map(|name| name.key().clone()).collect();
    names.sort_by(|a, b| {
        let key = |name: &str| (index_of(name).is_none(), index_of(name));
        key(a).cmp(&key(b)).then_with(|| a.cmp(b))
    });
    names
}

impl RunStatistics {
    /// Creates an empty statistics aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful registration.
    pub fn record_register_success(&self, username: &str) {
        self.registered.insert(username.to_string());
        bump(&self.register_success);
    }

    /// Records a terminal registration failure.
    pub fn record_register_failure(&self) {
        bump(&self.register_failed);
    }

    /// Records a successful login.
    pub fn record_login_success(&self, username: &str) {
        debug_assert!(
            self.registered.contains(username),
            "login recorded for unregistered {username}"
        );
        self.logged_in.insert(username.to_string());
        bump(&self.login_success);
    }

    /// Records a terminal login failure.
    pub fn record_login_failure(&self) {
        bump(&self.login_failed);
    }

    /// Records a successful logout, dropping the user from the logged-in set.
    pub fn record_logout_success(&self, username: &str) {
        self.logged_in.remove(username);
        bump(&self.logout_success);
    }

    /// Records a failed logout.
    pub fn record_logout_failure(&self) {
        bump(&self.logout_failed);
    }

    /// Records an identity whose data was cleared from every owner.
    pub fn record_cleanup_success(&self) {
        bump(&self.cleanup_success);
    }

    /// Records an identity whose data was not cleared from every owner.
    pub fn record_cleanup_failure(&self) {
        bump(&self.cleanup_failed);
    }

    /// Records one owner reporting no data for an identity.
    pub fn record_cleanup_not_found(&self) {
        bump(&self.cleanup_not_found);
    }

    /// Marks a user as registered and logged in from a session reloaded off disk.
    pub fn restore_session(&self, username: &str) {
        self.registered.insert(username.to_string());
        self.logged_in.insert(username.to_string());
    }

    /// Returns true when the user registered successfully.
    #[must_use]
    pub fn is_registered(&self, username: &str) -> bool {
        self.registered.contains(username)
    }

    /// Returns true when the user currently holds a session.
    #[must_use]
    pub fn is_logged_in(&self, username: &str) -> bool {
        self.logged_in.contains(username)
    }

    /// Returns the registered usernames, sorted.
    #[must_use]
    pub fn registered_users(&self) -> Vec<String> {
        sorted(&self.registered)
    }

    /// Returns the logged-in usernames, sorted.
    #[must_use]
    pub fn logged_in_users(&self) -> Vec<String> {
        sorted(&self.logged_in)
    }

    /// Returns `registered − logged_in`, sorted.
    #[must_use]
    pub fn pending_logins(&self) -> Vec<String> {
        self.registered_users()
            .into_iter()
            .filter(|name| !self.logged_in.contains(name))
            .collect()
    }

    /// Returns the number of registered users.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Returns the number of logged-in users.
    #[must_use]
    pub fn logged_in_count(&self) -> usize {
        self.logged_in.len()
    }

    /// Copies the current counters and sets.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            register_success: self.register_success.load(Ordering::SeqCst),
            register_failed: self.register_failed.load(Ordering::SeqCst),
            login_success: self.login_success.load(Ordering::SeqCst),
            login_failed: self.login_failed.load(Ordering::SeqCst),
            logout_success: self.logout_success.load(Ordering::SeqCst),
            logout_failed: self.logout_failed.load(Ordering::SeqCst),
            cleanup_success: self.cleanup_success.load(Ordering::SeqCst),
            cleanup_failed: self.cleanup_failed.load(Ordering::SeqCst),
            cleanup_not_found: self.cleanup_not_found.load(Ordering::SeqCst),
            registered: self.registered_users(),
            logged_in: self.logged_in_users(),
        }
    }
}

impl StatsSnapshot {
    /// Registration attempts that reached a final outcome.
    #[must_use]
    pub fn register_total(&self) -> usize {
        self.register_success + self.register_failed
    }

    /// Login attempts that reached a final outcome.
    #[must_use]
    pub fn login_total(&self) -> usize {
        self.login_success + self.login_failed
    }

    /// Logout attempts.
    #[must_use]
    pub fn logout_total(&self) -> usize {
        self.logout_success + self.logout_failed
    }

    /// Cleanup outcomes, counting not-found per owner.
    #[must_use]
    pub fn cleanup_total(&self) -> usize {
        self.cleanup_success + self.cleanup_failed + self.cleanup_not_found
    }

    /// Registration success rate in percent, `None` when nothing was attempted.
    #[must_use]
    pub fn register_success_rate(&self) -> Option<f64> {
        success_rate(self.register_success, self.register_total())
    }

    /// Login success rate in percent, `None` when nothing was attempted.
    #[must_use]
    pub fn login_success_rate(&self) -> Option<f64> {
        success_rate(self.login_success, self.login_total())
    }
}

#[allow(clippy::cast_precision_loss)]
fn success_rate(success: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| success as f64 / total as f64 * 100.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_stats_default_is_empty() {
        let snapshot = RunStatistics::new().snapshot();
        assert_eq!(snapshot, StatsSnapshot::default());
        assert_eq!(snapshot.register_success_rate(), None);
    }

    #[test]
    fn test_register_and_login_tracking() {
        let stats = RunStatistics::new();
        stats.record_register_success("user1");
        stats.record_register_success("user2");
        stats.record_register_failure();
        stats.record_login_success("user1");
        stats.record_login_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.register_success, 2);
        assert_eq!(snapshot.register_failed, 1);
        assert_eq!(snapshot.registered, ["user1", "user2"]);
        assert_eq!(snapshot.logged_in, ["user1"]);
        assert_eq!(stats.pending_logins(), ["user2"]);
    }

    #[test]
    fn test_logout_removes_from_logged_in() {
        let stats = RunStatistics::new();
        stats.record_register_success("user1");
        stats.record_login_success("user1");
        stats.record_logout_success("user1");

        assert!(!stats.is_logged_in("user1"));
        assert!(stats.is_registered("user1"));
        assert_eq!(stats.snapshot().logout_success, 1);
    }

    #[test]
    fn test_restore_session_seeds_both_sets() {
        let stats = RunStatistics::new();
        stats.restore_session("user4");
        assert!(stats.is_registered("user4"));
        assert!(stats.is_logged_in("user4"));
        assert_eq!(stats.snapshot().register_success, 0);
    }

    #[test]
    fn test_sets_sorted_numerically() {
        let stats = RunStatistics::new();
        for name in ["user10", "user2", "user1"] {
            stats.record_register_success(name);
        }
        assert_eq!(stats.registered_users(), ["user1", "user2", "user10"]);

        stats.record_register_success("admin");
        assert_eq!(stats.registered_users(), ["user1", "user2", "user10", "admin"]);
    }

    #[test]
    fn test_success_rates() {
        let snapshot = StatsSnapshot {
            register_success: 7,
            register_failed: 3,
            login_success: 7,
            ..StatsSnapshot::default()
        };
        assert!((snapshot.register_success_rate().unwrap() - 70.0).abs() < f64::EPSILON);
        assert!((snapshot.login_success_rate().unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_thread_safe() {
        use std::thread;

        let stats = Arc::new(RunStatistics::new());
        let mut handles = Vec::new();

        for t in 0..10 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    stats.record_register_success(&format!("user{}", t * 100 + i));
                    stats.record_cleanup_not_found();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.register_success, 1000);
        assert_eq!(snapshot.registered.len(), 1000);
        assert_eq!(snapshot.cleanup_not_found, 1000);
    }
}
