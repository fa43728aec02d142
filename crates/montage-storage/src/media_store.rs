//! Content-addressed media store on the local filesystem.
//!
//! A resource id names a file by its stem: `<root>/<id>.<ext>`. Large stores
//! may shard by the first two characters of the id, `<root>/<id[..2]>/<id>.<ext>`;
//! both layouts are searched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use montage_media::{MediaHandle, MediaResolver};

use crate::error::{StorageError, StorageResult};

/// Configuration for the local media store.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Directory holding the media files
    pub root: PathBuf,
}

impl LocalStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            root: std::env::var("MONTAGE_MEDIA_ROOT")
                .map(PathBuf::from)
                .map_err(|_| StorageError::config_error("MONTAGE_MEDIA_ROOT not set"))?,
        })
    }
}

/// Read-only view of a media directory.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    /// Open a store rooted at `root`, which must be an existing directory.
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(StorageError::NotADirectory(root));
        }
        debug!("Opened media store at {}", root.display());
        Ok(Self { root })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = LocalStoreConfig::from_env()?;
        Self::open(config.root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file stored under `resource_id`, if any.
    pub async fn locate(&self, resource_id: &str) -> StorageResult<Option<PathBuf>> {
        validate_id(resource_id)?;

        if let Some(path) = find_by_stem(&self.root, resource_id).await? {
            return Ok(Some(path));
        }

        if let Some(shard) = resource_id.get(..2) {
            let shard_dir = self.root.join(shard);
            if fs::metadata(&shard_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                return find_by_stem(&shard_dir, resource_id).await;
            }
        }

        Ok(None)
    }

    /// Path of the file stored under `resource_id`, or `NotFound`.
    pub async fn require(&self, resource_id: &str) -> StorageResult<PathBuf> {
        self.locate(resource_id)
            .await?
            .ok_or_else(|| StorageError::not_found(resource_id))
    }

    /// Ids of all files directly under the root, sorted.
    pub async fn list(&self) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl MediaResolver for LocalMediaStore {
    async fn find(&self, resource_id: &str) -> Option<MediaHandle> {
        match self.locate(resource_id).await {
            Ok(path) => path.map(|p| MediaHandle::new(resource_id, p)),
            Err(e) => {
                warn!(resource_id, "Media lookup failed: {}", e);
                None
            }
        }
    }
}

/// Ids are plain names: no separators, no parent references.
fn validate_id(resource_id: &str) -> StorageResult<()> {
    let bad = resource_id.is_empty()
        || resource_id == "."
        || resource_id.contains("..")
        || resource_id.contains(['/', '\\'])
        || resource_id.contains('\0');
    if bad {
        return Err(StorageError::invalid_key(resource_id));
    }
    Ok(())
}

async fn find_by_stem(dir: &Path, stem: &str) -> StorageResult<Option<PathBuf>> {
    let mut matches = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(stem) && entry.file_type().await?.is_file() {
            matches.push(path);
        }
    }
    // Several extensions for one id: pick deterministically
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with(files: &[&str]) -> (TempDir, LocalMediaStore) {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.unwrap();
            }
            fs::write(&path, b"media").await.unwrap();
        }
        let store = LocalMediaStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_finds_by_stem() {
        let (dir, store) = store_with(&["abc123.mp4", "logo.png"]).await;
        let handle = store.find("abc123").await.unwrap();
        assert_eq!(handle.path, dir.path().join("abc123.mp4"));
        assert_eq!(handle.resource_id, "abc123");
        assert!(store.find("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_finds_in_shard_directory() {
        let (dir, store) = store_with(&["ff/ffee01.mov"]).await;
        let path = store.require("ffee01").await.unwrap();
        assert_eq!(path, dir.path().join("ff").join("ffee01.mov"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let (_dir, store) = store_with(&["a.mp4"]).await;
        for id in ["", "../a", "x/a", "..", "a\\b"] {
            assert!(matches!(
                store.locate(id).await,
                Err(StorageError::InvalidKey(_))
            ));
            assert!(store.find(id).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_open_requires_directory() {
        let (dir, _store) = store_with(&["a.mp4"]).await;
        let result = LocalMediaStore::open(dir.path().join("a.mp4")).await;
        assert!(matches!(result, Err(StorageError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_list_ids() {
        let (_dir, store) = store_with(&["b.mp4", "a.wav", "ab/abc.mp4"]).await;
        assert_eq!(store.list().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_require_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = tokio_test::block_on(LocalMediaStore::open(dir.path())).unwrap();
        assert!(matches!(
            tokio_test::block_on(store.require("missing")),
            Err(StorageError::NotFound(_))
        ));
    }
}
