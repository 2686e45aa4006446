//! On-disk artifact store
//!
//! The store is the only writer of files under its root. Writers go through a
//! per-key async lock, and every write lands in a `.part` file that is renamed
//! into place, so a crash never leaves a truncated file under a real key.

use crate::storage::{StorageError, StorageKey, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Suffix of in-progress artifact files
const PARTIAL_SUFFIX: &str = ".part";

/// Exclusive hold on one storage key
#[derive(Debug)]
pub struct KeyGuard<'a> {
    store: &'a ArtifactStore,
    key: StorageKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release first so the count below only sees the table and waiters
        drop(self.guard.take());
        let mut locks = self.store.lock_table();
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Directory of downloaded artifacts, addressed by [`StorageKey`]
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    expiry: Option<Duration>,
    key_locks: Mutex<HashMap<StorageKey, Arc<AsyncMutex<()>>>>,
}

impl ArtifactStore {
    /// Opens (creating if needed) the artifact directory
    ///
    /// # Arguments
    ///
    /// * `root` - Directory that will hold the artifacts
    /// * `expiry` - Age after which an existing artifact is fetched again
    ///
    /// # Returns
    ///
    /// * `Ok(ArtifactStore)` - Directory exists and its absolute path is resolved
    /// * `Err(StorageError)` - Directory could not be created
    pub fn open(root: &Path, expiry: Option<Duration>) -> StorageResult<Self> {
        std::fs::create_dir_all(root).map_err(|source| StorageError::Setup {
            path: root.to_path_buf(),
            source,
        })?;
        let root = std::fs::canonicalize(root).map_err(|source| StorageError::Setup {
            path: root.to_path_buf(),
            source,
        })?;

        Ok(Self {
            root,
            expiry,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Absolute root of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path an artifact with this key lives at
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Takes the single-writer lock for a key
    ///
    /// Hold the guard across the existence check, the fetch and the write so
    /// concurrent records for one URL produce one download. The lock entry is
    /// dropped once the last holder or waiter releases it.
    pub async fn lock_key(&self, key: &StorageKey) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.lock_table();
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        KeyGuard {
            store: self,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<StorageKey, Arc<AsyncMutex<()>>>> {
        self.key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the stored path if a usable artifact already exists
    ///
    /// An artifact older than the configured expiry is treated as missing.
    pub async fn existing(&self, key: &StorageKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        if let Some(expiry) = self.expiry {
            let modified = metadata.modified().ok()?;
            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO);
            if age > expiry {
                tracing::debug!("Artifact {} expired ({:?} old)", key, age);
                return None;
            }
        }

        Some(path)
    }

    /// Writes an artifact atomically and returns its absolute path
    pub async fn store(&self, key: &StorageKey, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.path_for(key);
        let partial = self.root.join(format!("{}{}", key.as_str(), PARTIAL_SUFFIX));

        if let Err(source) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(StorageError::Write { path, source });
        }

        if let Err(source) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(StorageError::Write { path, source });
        }

        Ok(path)
    }
}
