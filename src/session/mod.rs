//! Per-user session artifact storage.
//!
//! A successful login yields an opaque [`SessionArtifact`] (the cookie
//! header the service set). Logout needs it back. The engine only ever asks
//! whether an artifact exists and hands it to the transport untouched.
//!
//! Two stores are provided:
//! - [`FileSessionStore`] - one file per username in a dedicated directory
//! - [`MemorySessionStore`] - concurrent in-process map, for tests and dry runs

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

/// Opaque session credential captured at login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionArtifact(String);

impl SessionArtifact {
    /// Wraps a raw artifact value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value, for handing back to the transport.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Redacted: artifacts are credentials and must not end up in logs.
impl fmt::Debug for SessionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionArtifact([REDACTED; {} bytes])", self.0.len())
    }
}

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem error reading or writing an artifact.
    #[error("session store IO error at {path}: {source}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Username cannot be mapped safely to a storage key.
    #[error("invalid username for session storage: {username:?}")]
    InvalidUsername {
        /// The rejected username.
        username: String,
    },
}

impl SessionError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Key-value store of session artifacts, keyed by username.
///
/// Implementations must tolerate concurrent calls from many phase tasks.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists (or replaces) the artifact for `username`.
    async fn save(&self, username: &str, artifact: &SessionArtifact) -> Result<(), SessionError>;

    /// Returns the artifact for `username`, if one is stored.
    async fn load(&self, username: &str) -> Result<Option<SessionArtifact>, SessionError>;

    /// Removes the artifact for `username`. Removing a missing artifact is not an error.
    async fn remove(&self, username: &str) -> Result<(), SessionError>;

    /// Lists usernames with a stored artifact, sorted.
    async fn usernames(&self) -> Result<Vec<String>, SessionError>;

    /// Discards every stored artifact.
    async fn clear(&self) -> Result<(), SessionError>;
}

/// Rejects usernames that could escape a storage directory.
pub(crate) fn validate_username(username: &str) -> Result<(), SessionError> {
    let unsafe_name = username.is_empty()
        || username.contains(['/', '\\', '\0'])
        || username.contains("..");
    if unsafe_name {
        return Err(SessionError::InvalidUsername {
            username: username.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_debug_redacts_value() {
        let artifact = SessionArtifact::new("session=secret-token");
        let debug = format!("{artifact:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_validate_username_accepts_generated_names() {
        assert!(validate_username("user1").is_ok());
        assert!(validate_username("user_42-x").is_ok());
    }

    #[test]
    fn test_validate_username_rejects_traversal() {
        for bad in ["", "../etc", "a/b", "a\\b", "x..y"] {
            assert!(
                matches!(
                    validate_username(bad),
                    Err(SessionError::InvalidUsername { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
