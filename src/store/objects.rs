//! Hot-tier object storage, filesystem backed.
//!
//! Objects live at `root/<bucket>/<key>`; keys may contain slashes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

#[derive(Debug)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    fn not_found(bucket: &str, key: &str) -> PipelineError {
        PipelineError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub async fn put_object(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(self.object_path(bucket, key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy an object to a local file path.
    pub async fn download_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let bytes = self.get_object(bucket, key).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    /// Upload a local file as an object.
    pub async fn upload_file(&self, src: &Path, bucket: &str, key: &str) -> Result<()> {
        let bytes = tokio::fs::read(src).await?;
        self.put_object(bucket, key, &bytes).await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.object_path(bucket, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(bucket, key)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, bucket: &str, key: &str) -> bool {
        tokio::fs::try_exists(self.object_path(bucket, key))
            .await
            .unwrap_or(false)
    }
}
