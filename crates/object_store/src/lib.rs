//! C1 — Object Store Adapter.
//!
//! Keys follow `users/<user_id>/photos/<uuid>.<ext>` and
//! `users/<user_id>/thumbnails/<uuid>.webp`. No caching; failures map to
//! `StorageUnavailable`/`NotFound` from `common_types::Error`.

use async_trait::async_trait;
use common_types::{Error, Result};
use std::time::Duration;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String>;
}

pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[must_use]
pub fn photo_key(owner: &str, id: &str, ext: &str) -> String {
    format!("users/{owner}/photos/{id}.{ext}")
}

#[must_use]
pub fn thumbnail_key(owner: &str, id: &str) -> String {
    format!("users/{owner}/thumbnails/{id}.webp")
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn from_config(
        endpoint: Option<&str>,
        bucket: impl Into<String>,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "photos-backend",
        );
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new("us-east-1"));
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if endpoint.is_some() {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(s3_builder.build());
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    Error::NotFound(key.to_string())
                } else {
                    Error::StorageUnavailable(e.to_string())
                }
            })?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        let presign_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(ttl)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_spec_layout() {
        assert_eq!(photo_key("u1", "p1", "jpg"), "users/u1/photos/p1.jpg");
        assert_eq!(thumbnail_key("u1", "p1"), "users/u1/thumbnails/p1.webp");
    }
}
