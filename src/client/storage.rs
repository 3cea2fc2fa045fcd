//! Persisted token storage for the session controller.
//!
//! One well-known slot holding the current access token, cleared entirely on
//! logout or revalidation failure. Only the session controller writes it.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;

/// Storage backend for the persisted access token
pub trait TokenStorage: Send + Sync {
    /// Read the currently persisted token, if any
    fn load(&self) -> Option<String>;
    /// Replace the persisted token
    fn store(&self, token: &str) -> Result<()>;
    /// Remove the persisted token
    fn clear(&self) -> Result<()>;
}

/// File-backed token storage (one token per file)
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("Failed to write token to {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to clear persisted token"),
        }
    }
}

/// In-memory token storage for tests
#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with a token (test setup)
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("token"));

        assert!(storage.load().is_none());

        storage.store("abc.def.ghi").unwrap();
        assert_eq!(storage.load().as_deref(), Some("abc.def.ghi"));

        storage.clear().unwrap();
        assert!(storage.load().is_none());
    }

    #[test]
    fn test_file_storage_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("token"));

        storage.clear().unwrap();
        storage.clear().unwrap();
        assert!(storage.load().is_none());
    }

    #[test]
    fn test_memory_storage_overwrites() {
        let storage = MemoryTokenStorage::new();
        storage.store("first").unwrap();
        storage.store("second").unwrap();
        assert_eq!(storage.load().as_deref(), Some("second"));
    }
}
