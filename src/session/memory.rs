//! In-process session store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{SessionArtifact, SessionError, SessionStore};

/// Session store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    artifacts: DashMap<String, SessionArtifact>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true when no artifacts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, username: &str, artifact: &SessionArtifact) -> Result<(), SessionError> {
        self.artifacts.insert(username.to_string(), artifact.clone());
        Ok(())
    }

    async fn load(&self, username: &str) -> Result<Option<SessionArtifact>, SessionError> {
        Ok(self.artifacts.get(username).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, username: &str) -> Result<(), SessionError> {
        self.artifacts.remove(username);
        Ok(())
    }

    async fn usernames(&self) -> Result<Vec<String>, SessionError> {
        let mut names: Vec<String> = self.artifacts.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.artifacts.clear();
        Ok(())
    }
}
