//! Artifact store backed by a local directory

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::core::ArtifactStore;
use crate::error::{Result, ServiceError};

/// Stores objects as files below `{root}/{bucket}`.
///
/// Content types are not retained.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    base: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            base: root.as_ref().join(bucket),
        }
    }

    /// Map a key to a path, refusing anything that escapes the bucket
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(ServiceError::validation(format!("Invalid object key: {:?}", key)));
        }
        Ok(self.base.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::not_found(format!("No such object: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        debug!(key, bytes = body.len(), content_type, "object written to {}", path.display());
        Ok(())
    }
}
