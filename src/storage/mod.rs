/*!
 * Durable key-value blob storage.
 *
 * The source document, the progress snapshot and the per-language outputs all
 * go through a `BlobStore`. Keys are opaque, slash-separated strings.
 * `put` must be atomic: a reader never observes a half-written value, and a
 * crash during `put` leaves the previous value intact.
 *
 * - `fs`: directory-backed store using write-then-rename
 * - `memory`: in-process store for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::StorageError;

pub mod fs;
pub mod memory;

pub use self::fs::FsBlobStore;
pub use self::memory::MemoryBlobStore;

/// Common trait for blob stores
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Read the value stored under `key`, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Atomically replace the value stored under `key`
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Check whether a value exists under `key`
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Reject keys that could escape the store or name nothing
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.ends_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.starts_with('\\') || key.contains(':') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split(['/', '\\']).any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
