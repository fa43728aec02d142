//! Render output publishing.
//!
//! Renders are encoded into a work directory and moved into the output
//! directory once complete, so readers never observe a partial file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use montage_media::{move_file, remove_artifact};

use crate::error::{StorageError, StorageResult};

const OUTPUT_EXTENSION: &str = "mp4";

/// Directory of finished renders, keyed by task id.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open the output directory, creating it when absent.
    pub async fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        if !fs::metadata(&dir).await?.is_dir() {
            return Err(StorageError::NotADirectory(dir));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of the render for `task_id`.
    pub fn location_for(&self, task_id: &str) -> StorageResult<PathBuf> {
        if task_id.is_empty() || task_id.contains(['/', '\\']) || task_id.contains("..") {
            return Err(StorageError::invalid_key(task_id));
        }
        Ok(self.dir.join(format!("{}.{}", task_id, OUTPUT_EXTENSION)))
    }

    /// Move a finished file into place for `task_id`.
    pub async fn publish(&self, src: impl AsRef<Path>, task_id: &str) -> StorageResult<PathBuf> {
        let src = src.as_ref();
        let dst = self.location_for(task_id)?;

        let meta = fs::metadata(src).await.map_err(|e| {
            StorageError::PublishFailed(format!("{}: {}", src.display(), e))
        })?;
        if meta.len() == 0 {
            return Err(StorageError::PublishFailed(format!(
                "{} is empty",
                src.display()
            )));
        }

        move_file(src, &dst).await?;
        info!(task_id, size = meta.len(), "Published render to {}", dst.display());
        Ok(dst)
    }

    /// Delete the render for `task_id`. Returns whether anything was removed.
    pub async fn remove(&self, task_id: &str) -> StorageResult<bool> {
        let path = self.location_for(task_id)?;
        let removed = remove_artifact(&path).await?;
        debug!(task_id, removed, "Removed render output");
        Ok(removed)
    }

    pub async fn exists(&self, task_id: &str) -> StorageResult<bool> {
        let path = self.location_for(task_id)?;
        Ok(fs::try_exists(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_moves_into_place() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let store = OutputStore::open(out.path().join("renders")).await.unwrap();

        let src = work.path().join("partial.mp4");
        fs::write(&src, b"frames").await.unwrap();

        let dst = store.publish(&src, "task-1").await.unwrap();
        assert_eq!(dst, out.path().join("renders").join("task-1.mp4"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
        assert!(store.exists("task-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = OutputStore::open(dir.path()).await.unwrap();
        let src = dir.path().join("empty.mp4");
        fs::write(&src, b"").await.unwrap();

        assert!(matches!(
            store.publish(&src, "t").await,
            Err(StorageError::PublishFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = OutputStore::open(dir.path()).await.unwrap();
        let src = dir.path().join("x.tmp");
        fs::write(&src, b"data").await.unwrap();
        store.publish(&src, "t").await.unwrap();

        assert!(store.remove("t").await.unwrap());
        assert!(!store.remove("t").await.unwrap());
    }

    #[test]
    fn test_location_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = tokio_test::block_on(OutputStore::open(dir.path())).unwrap();
        assert!(store.location_for("../x").is_err());
        assert!(store.location_for("").is_err());
        assert!(store.location_for("abc").is_ok());
    }
}
