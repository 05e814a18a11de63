use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::Result;

pub mod s3;

pub use s3::S3ObjectStore;

/// Durable object storage holding uploaded audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name, reported by the connection probe
    fn bucket(&self) -> String;

    /// Locator other services use to read `key`
    fn uri_for(&self, key: &str) -> String;

    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;

    async fn put_bytes(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Time-limited GET URL for `key`
    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String>;

    /// Up to `max_results` keys from the start of the bucket
    async fn list(&self, max_results: i32) -> Result<Vec<String>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub const PROBE_KEY: &str = "test-connection/test.txt";

/// Outcome of a successful storage round trip
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub status: String,
    pub bucket: String,
    pub connection: String,
    pub existing_files: usize,
}

/// List, create and delete a probe object to verify the storage backend
pub async fn probe_connection(store: &dyn ObjectStore) -> Result<ConnectionReport> {
    let existing = store.list(1).await?;

    store
        .put_bytes(PROBE_KEY, b"Test connection successful".to_vec(), "text/plain")
        .await?;
    store.delete(PROBE_KEY).await?;

    tracing::info!(bucket = %store.bucket(), "Storage connection verified");

    Ok(ConnectionReport {
        status: "success".to_string(),
        bucket: store.bucket(),
        connection: "verified".to_string(),
        existing_files: existing.len(),
    })
}
