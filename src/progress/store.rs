use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::{PersistenceError, StorageError};
use crate::progress::{MergeStats, ProgressSnapshot, TranslationRecord};
use crate::storage::BlobStore;

/// Owner of the progress snapshot
///
/// Every batch completion goes through `merge_and_persist`, which holds one
/// async mutex across merge and write. Readers get point-in-time clones.
#[derive(Debug)]
pub struct ProgressStore {
    store: Arc<dyn BlobStore>,
    key: String,
    snapshot: Mutex<ProgressSnapshot>,
    persist_attempts: u32,
    retry_backoff: Duration,
}

impl ProgressStore {
    /// Load the snapshot stored under `key`, or start empty when there is none
    pub async fn load(
        store: Arc<dyn BlobStore>,
        key: impl Into<String>,
        persist_attempts: u32,
        retry_backoff: Duration,
    ) -> Result<Self, PersistenceError> {
        let key = key.into();
        let snapshot = read_snapshot(store.as_ref(), &key).await?;
        debug!("Loaded progress snapshot {} with {} texts", key, snapshot.len());

        Ok(Self {
            store,
            key,
            snapshot: Mutex::new(snapshot),
            persist_attempts: persist_attempts.max(1),
            retry_backoff,
        })
    }

    /// Snapshot key in the blob store
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Point-in-time copy of the snapshot
    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Merge batch results and make them durable before returning.
    ///
    /// The in-memory snapshot only changes once the write succeeded, so a
    /// failed call leaves the store exactly as it was.
    pub async fn merge_and_persist(
        &self,
        records: &[TranslationRecord],
    ) -> Result<MergeStats, PersistenceError> {
        let mut current = self.snapshot.lock().await;

        let mut next = current.clone();
        let stats = next.apply(records);
        if stats.translated == 0 && stats.failed == 0 {
            return Ok(stats);
        }

        let bytes = serialize(&next)?;
        self.write_with_retries(bytes).await?;

        *current = next;
        Ok(stats)
    }

    async fn write_with_retries(&self, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        let mut attempt = 0;
        loop {
            match self.store.put(&self.key, bytes.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.persist_attempts || matches!(e, StorageError::InvalidKey(_)) {
                        error!("Giving up persisting progress to {} after {} attempts: {}", self.key, attempt, e);
                        return Err(PersistenceError::Write {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.retry_backoff * (1u32 << (attempt - 1).min(10));
                    warn!(
                        "Persisting progress failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt, self.persist_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Read and verify a snapshot without taking ownership of it
pub async fn read_snapshot(store: &dyn BlobStore, key: &str) -> Result<ProgressSnapshot, PersistenceError> {
    let Some(bytes) = store.get(key).await.map_err(PersistenceError::Read)? else {
        return Ok(ProgressSnapshot::new());
    };

    let snapshot: ProgressSnapshot =
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

    snapshot.verify().map_err(|message| PersistenceError::Corrupt {
        key: key.to_string(),
        message,
    })?;

    Ok(snapshot)
}

fn serialize(snapshot: &ProgressSnapshot) -> Result<Vec<u8>, PersistenceError> {
    serde_json::to_vec_pretty(snapshot).map_err(|e| PersistenceError::Serialize(e.to_string()))
}
