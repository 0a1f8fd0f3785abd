//! Directory-backed session store: one `cookies_<username>.txt` per user.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{SessionArtifact, SessionError, SessionStore, validate_username};

const FILE_PREFIX: &str = "cookies_";
const FILE_SUFFIX: &str = ".txt";

/// Session store persisting each artifact to its own file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the directory cannot be created.
    #[instrument(level = "debug", fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SessionError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Returns the backing directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, username: &str) -> Result<PathBuf, SessionError> {
        validate_username(username)?;
        Ok(self.dir.join(format!("{FILE_PREFIX}{username}{FILE_SUFFIX}")))
    }
}

fn username_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)
        .filter(|username| !username.is_empty())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, username: &str, artifact: &SessionArtifact) -> Result<(), SessionError> {
        let path = self.path_for(username)?;
        tokio::fs::write(&path, artifact.as_str())
            .await
            .map_err(|e| SessionError::io(&path, e))?;
        debug!(username, path = %path.display(), "session artifact saved");
        Ok(())
    }

    async fn load(&self, username: &str) -> Result<Option<SessionArtifact>, SessionError> {
        let path = self.path_for(username)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(SessionArtifact::new(raw.trim_end()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::io(&path, e)),
        }
    }

    async fn remove(&self, username: &str) -> Result<(), SessionError> {
        let path = self.path_for(username)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::io(&path, e)),
        }
    }

    async fn usernames(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SessionError::io(&self.dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            if let Some(username) = file_name.to_str().and_then(username_from_file_name) {
                names.push(username.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn clear(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SessionError::io(&self.dir, e))?;
        let mut removed = 0usize;
        for username in self.usernames().await? {
            self.remove(&username).await?;
            removed += 1;
        }
        debug!(dir = %self.dir.display(), removed, "session artifacts cleared");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn store() -> (TempDir, FileSessionStore) {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::open(temp.path().join("cookie")).await.unwrap();
        (temp, store)
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let (_temp, store) = store().await;
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_temp, store) = store().await;
        let artifact = SessionArtifact::new("session=abc; csrf=def");
        store.save("user1", &artifact).await.unwrap();

        assert!(store.dir().join("cookies_user1.txt").is_file());
        assert_eq!(store.load("user1").await.unwrap(), Some(artifact));
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let (_temp, store) = store().await;
        assert_eq!(store.load("user9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_temp, store) = store().await;
        store.save("user1", &SessionArtifact::new("a=b")).await.unwrap();
        store.remove("user1").await.unwrap();
        store.remove("user1").await.unwrap();
        assert_eq!(store.load("user1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_usernames_ignores_foreign_files() {
        let (_temp, store) = store().await;
        store.save("user2", &SessionArtifact::new("a=b")).await.unwrap();
        store.save("user10", &SessionArtifact::new("a=b")).await.unwrap();
        std::fs::write(store.dir().join("notes.md"), "x").unwrap();

        assert_eq!(store.usernames().await.unwrap(), ["user10", "user2"]);
    }

    #[tokio::test]
    async fn test_clear_leaves_empty_directory() {
        let (_temp, store) = store().await;
        store.save("user1", &SessionArtifact::new("a=b")).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.dir().is_dir());
        assert!(store.usernames().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_foreign_files() {
        let (_temp, store) = store().await;
        store.save("user1", &SessionArtifact::new("a=b")).await.unwrap();
        std::fs::write(store.dir().join("important.txt"), "keep me").unwrap();
        std::fs::create_dir(store.dir().join("nested")).unwrap();

        store.clear().await.unwrap();

        assert!(!store.dir().join("cookies_user1.txt").exists());
        assert_eq!(
            std::fs::read_to_string(store.dir().join("important.txt")).unwrap(),
            "keep me"
        );
        assert!(store.dir().join("nested").is_dir());
    }

    #[tokio::test]
    async fn test_clear_recreates_missing_directory() {
        let (_temp, store) = store().await;
        std::fs::remove_dir(store.dir()).unwrap();
        store.clear().await.unwrap();
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_temp, store) = store().await;
        let result = store.save("../escape", &SessionArtifact::new("a=b")).await;
        assert!(matches!(result, Err(SessionError::InvalidUsername { .. })));
    }

    #[test]
    fn test_username_from_file_name() {
        assert_eq!(username_from_file_name("cookies_user5.txt"), Some("user5"));
        assert_eq!(username_from_file_name("cookies_.txt"), None);
        assert_eq!(username_from_file_name("user5.txt"), None);
    }
}
