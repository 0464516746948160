//! Durable storage for the last known cart.
//!
//! A snapshot lets a returning user see their cart before the first fetch
//! completes. It is never trusted as synced state.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::mirror::LocalLine;

/// Cart lines as last seen, with the time they were saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub lines: Vec<LocalLine>,
    pub saved_at: DateTime<Utc>,
}

/// Where the cart snapshot lives between sessions.
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot, or `None` if nothing has been saved.
    fn load(&self) -> impl Future<Output = Result<Option<PersistedCart>, PersistError>> + Send;

    /// Replace the snapshot.
    fn save(&self, cart: &PersistedCart) -> impl Future<Output = Result<(), PersistError>> + Send;
}

/// JSON file on disk. Writes go to a sibling temp file that is then renamed
/// over the target, so a crash never leaves a half-written snapshot.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<PersistedCart>, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, cart: &PersistedCart) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(cart)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// In-process snapshot store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<PersistedCart>>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `cart`.
    #[must_use]
    pub fn with_snapshot(cart: PersistedCart) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(cart))),
        }
    }

    /// The current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<PersistedCart> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<PersistedCart>, PersistError> {
        Ok(self.snapshot())
    }

    async fn save(&self, cart: &PersistedCart) -> Result<(), PersistError> {
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(cart.clone());
        Ok(())
    }
}
