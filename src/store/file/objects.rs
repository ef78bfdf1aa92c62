use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::store::{validate_key, Bucket, ObjectStore, StoreError};

/// URL prefix under which the public directory is served.
pub const PUBLIC_PREFIX: &str = "/public";

/// Uploads stored under the public directory and served statically.
///
/// Media keys already start with their category folder, so the media bucket
/// maps onto the public directory itself; the image buckets get a folder
/// named after the bucket.
pub struct LocalObjectStore {
    public_dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(public_dir: &Path) -> Self {
        Self {
            public_dir: public_dir.to_path_buf(),
        }
    }

    fn folder(bucket: Bucket) -> Option<&'static str> {
        match bucket {
            Bucket::Media => None,
            other => Some(other.as_str()),
        }
    }

    fn relative(bucket: Bucket, key: &str) -> String {
        match Self::folder(bucket) {
            Some(folder) => format!("{}/{}", folder, key),
            None => key.to_string(),
        }
    }

    fn path_for(&self, bucket: Bucket, key: &str) -> PathBuf {
        self.public_dir.join(Self::relative(bucket, key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        validate_key(key)?;
        let path = self.path_for(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(self.public_url(bucket, key)));
            }
            Err(e) => return Err(e.into()),
        };
        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        tracing::info!(bucket = %bucket, key = %key, size = bytes.len(), "file stored");
        Ok(self.public_url(bucket, key))
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(bucket, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/{}", PUBLIC_PREFIX, Self::relative(bucket, key))
    }

    fn key_from_url(&self, bucket: Bucket, url: &str) -> Option<String> {
        let rest = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let key = match Self::folder(bucket) {
            Some(folder) => rest.strip_prefix(folder)?.strip_prefix('/')?,
            None => rest,
        };
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}
