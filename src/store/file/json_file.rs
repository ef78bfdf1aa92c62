use std::{marker::PhantomData, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::store::StoreError;

/// One JSON document on disk holding a whole collection.
///
/// Reads never fail: a missing or unparseable file reads as `T::default()`.
/// Mutations go through [`JsonFile::modify`], which serializes
/// read-modify-write sequences on this file and refuses to start from a
/// file it could not parse.
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub async fn read(&self) -> T {
        match self.load().await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "collection file unreadable");
                T::default()
            }
        }
    }

    /// Current contents; a missing file is the default, anything else that
    /// cannot be read or parsed is an error.
    async fn load(&self) -> Result<T, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the file contents. Written to a sibling temp file first, then
    /// renamed into place.
    pub async fn write(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("collection");
        let temp_path = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&temp_path, &json).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Run `f` against the current contents and persist the result. Nothing
    /// is written when `f` returns an error.
    pub async fn modify<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut T) -> Result<R, StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut value = self.load().await?;
        let result = f(&mut value)?;
        self.write(&value).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("nothing.json"));
        assert!(file.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let file: JsonFile<Vec<u32>> = JsonFile::new(path);
        assert!(file.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_modify_keeps_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"[1, 2, \"three\"]").await.unwrap();

        let file: JsonFile<Vec<u32>> = JsonFile::new(path.clone());
        let result = file
            .modify(|v| {
                v.push(4);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));

        let on_disk = tokio::fs::read(&path).await.unwrap();
        assert_eq!(on_disk, b"[1, 2, \"three\"]");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("nums.json"));
        file.write(&vec![1, 2, 3]).await.unwrap();
        assert_eq!(file.read().await, vec![1, 2, 3]);

        // No temp files left behind.
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["nums.json".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_modify_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("nums.json"));
        file.write(&vec![7]).await.unwrap();

        let result: Result<(), _> = file
            .modify(|v| {
                v.clear();
                Err(StoreError::Invalid("nope".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(file.read().await, vec![7]);
    }

    #[tokio::test]
    async fn test_concurrent_modify_loses_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let file: Arc<JsonFile<Vec<u32>>> = Arc::new(JsonFile::new(dir.path().join("n.json")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let file = file.clone();
            handles.push(tokio::spawn(async move {
                file.modify(|v| {
                    v.push(i);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(file.read().await.len(), 20);
    }
}
