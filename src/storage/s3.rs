use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use std::time::Duration;

use super::ObjectStore;
use crate::{Result, ScribeError};

/// S3 bucket used as durable audio storage
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

fn storage_error<E: std::error::Error>(action: &str, err: E) -> ScribeError {
    ScribeError::Storage(format!("{}: {}", action, DisplayErrorContext(err)))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> String {
        self.bucket.clone()
    }

    fn uri_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        tracing::info!(bucket = %self.bucket, key, "Uploading audio to S3");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| storage_error("Failed to open audio for upload", e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| storage_error("Failed to upload audio to S3", e))?;

        Ok(())
    }

    async fn put_bytes(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| storage_error("Failed to write S3 object", e))?;

        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| storage_error("Invalid signed URL lifetime", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("Failed to sign S3 URL", e))?;

        Ok(request.uri().to_string())
    }

    async fn list(&self, max_results: i32) -> Result<Vec<String>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_results)
            .send()
            .await
            .map_err(|e| storage_error("Failed to list S3 objects", e))?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        tracing::debug!(bucket = %self.bucket, key, "Deleting S3 object");

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("Failed to delete S3 object", e))?;

        Ok(())
    }
}
