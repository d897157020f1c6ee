use async_trait::async_trait;
use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{BlobStore, validate_key};
use crate::errors::StorageError;

/// Blob store backed by a directory tree
///
/// Keys map to relative paths under the root. Writes go to a temporary file
/// in the destination directory, are flushed to disk, then renamed over the
/// destination, so the previous value survives a crash mid-write.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a key
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key.split(['/', '\\']).fold(self.root.clone(), |path, part| path.join(part)))
    }

    fn io_error(key: &str, error: impl std::fmt::Display) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            message: error.to_string(),
        }
    }

    fn read_blocking(key: &str, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn write_atomic_blocking(key: &str, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).map_err(|e| Self::io_error(key, e))?;

        let mut temp = NamedTempFile::new_in(parent).map_err(|e| Self::io_error(key, e))?;
        temp.write_all(bytes).map_err(|e| Self::io_error(key, e))?;
        temp.as_file().sync_all().map_err(|e| Self::io_error(key, e))?;
        temp.persist(path).map_err(|e| Self::io_error(key, e.error))?;

        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        let key_owned = key.to_string();
        tokio::task::spawn_blocking(move || Self::read_blocking(&key_owned, &path))
            .await
            .map_err(|e| Self::io_error(key, e))?
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let key_owned = key.to_string();
        tokio::task::spawn_blocking(move || Self::write_atomic_blocking(&key_owned, &path, &bytes))
            .await
            .map_err(|e| Self::io_error(key, e))?
    }
}
