//! Resource lookup boundary.
//!
//! The renderer only ever reads sources; it never uploads, deletes or
//! inspects storage beyond asking for a path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A readable media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub resource_id: String,
    pub path: PathBuf,
}

impl MediaHandle {
    pub fn new(resource_id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            resource_id: resource_id.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Maps resource ids to readable media.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// `None` when the id is unknown.
    async fn find(&self, resource_id: &str) -> Option<MediaHandle>;
}

#[async_trait]
impl MediaResolver for HashMap<String, PathBuf> {
    async fn find(&self, resource_id: &str) -> Option<MediaHandle> {
        self.get(resource_id)
            .map(|path| MediaHandle::new(resource_id, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_resolver() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), PathBuf::from("/media/a.mp4"));

        let handle = tokio_test::block_on(map.find("a")).unwrap();
        assert_eq!(handle.path, PathBuf::from("/media/a.mp4"));
        assert!(tokio_test::block_on(map.find("missing")).is_none());
    }
}
