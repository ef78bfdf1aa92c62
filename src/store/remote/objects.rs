use async_trait::async_trait;
use reqwest::Client;

use crate::store::{validate_key, Bucket, ObjectStore, StoreError};

/// Bucket objects behind the hosted storage REST API.
pub struct RemoteObjectStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RemoteObjectStore {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }

    fn object_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key)
    }

    fn public_prefix(&self, bucket: Bucket) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, bucket)
    }

    async fn check(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Remote(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl ObjectStore for RemoteObjectStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        validate_key(key)?;
        let content_type = mime_guess::from_path(key).first_or_octet_stream();

        let response = self
            .client
            .post(self.object_url(bucket, key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_ref())
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        Self::check(response).await?;

        tracing::info!(bucket = %bucket, key = %key, size = bytes.len(), "object uploaded");
        Ok(self.public_url(bucket, key))
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let response = self
            .client
            .delete(self.object_url(bucket, key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;
        Self::check(response).await
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}{}", self.public_prefix(bucket), key)
    }

    fn key_from_url(&self, bucket: Bucket, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_prefix(bucket))?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RemoteObjectStore {
        RemoteObjectStore::new("https://project.example.co/".into(), "service".into())
    }

    #[test]
    fn test_public_url_layout() {
        assert_eq!(
            store().public_url(Bucket::Media, "Web/1700000000000-site.png"),
            "https://project.example.co/storage/v1/object/public/media/Web/1700000000000-site.png"
        );
    }

    #[test]
    fn test_key_from_url_matches_bucket() {
        let store = store();
        let url = store.public_url(Bucket::BlogImages, "1-cover.jpg");
        assert_eq!(
            store.key_from_url(Bucket::BlogImages, &url).as_deref(),
            Some("1-cover.jpg")
        );
        assert_eq!(store.key_from_url(Bucket::ProjectImages, &url), None);
        assert_eq!(store.key_from_url(Bucket::Media, "/public/Web/a.png"), None);
    }

    #[tokio::test]
    async fn test_put_rejects_bad_key_before_network() {
        let err = store().put(Bucket::Media, "../x.png", b"x").await;
        assert!(matches!(err, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unreachable_storage_is_remote_error() {
        let store = RemoteObjectStore::new("http://127.0.0.1:1".into(), "k".into());
        let err = store.put(Bucket::Media, "Web/a.png", b"x").await;
        assert!(matches!(err, Err(StoreError::Remote(_))));
    }
}
