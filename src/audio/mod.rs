use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use crate::extractors::AudioDownloader;
use crate::storage::ObjectStore;
use crate::utils::format_file_size;
use crate::{Result, ScribeError};

/// Stored, normalized audio ready for transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioReference {
    /// Locator understood by the speech service, e.g. `s3://bucket/audio/<uuid>.wav`
    pub storage_uri: String,

    /// Object key inside the bucket
    pub key: String,

    /// Time-limited GET URL
    pub signed_access_url: String,

    pub expiry: DateTime<Utc>,
}

/// Downloads audio, normalizes it and parks it in object storage
pub struct AudioAcquirer {
    downloader: Arc<dyn AudioDownloader>,
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
    signed_url_ttl: Duration,
    temp_root: Option<PathBuf>,
}

impl AudioAcquirer {
    pub fn new(downloader: Arc<dyn AudioDownloader>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            downloader,
            store,
            key_prefix: "audio/".to_string(),
            signed_url_ttl: Duration::from_secs(3600),
            temp_root: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// Download, upload and sign audio for `url`.
    ///
    /// Every call stores a new object under a fresh key. The local WAV lives in
    /// a per-call scratch directory that is removed on every exit path,
    /// including when this future is dropped mid-flight.
    pub async fn acquire_audio(&self, url: &str) -> Result<AudioReference> {
        let scratch = self.scratch_dir()?;
        let stem = scratch.path().join(Uuid::new_v4().to_string());

        tracing::info!(url, scratch = %scratch.path().display(), "Acquiring audio");

        let outcome = self.download_and_store(url, &stem).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::error!(path = %scratch_path.display(), error = %e, "Error cleaning up scratch directory");
        } else {
            tracing::debug!(path = %scratch_path.display(), "Cleaned up scratch directory");
        }

        outcome
    }

    async fn download_and_store(&self, url: &str, stem: &Path) -> Result<AudioReference> {
        let audio_path = self.downloader.download(url, stem).await?;

        let size = fs_err::metadata(&audio_path)
            .map(|m| m.len())
            .map_err(|e| ScribeError::Download(format!("downloaded audio missing: {}", e)))?;
        tracing::info!(size = %format_file_size(size), "Audio downloaded");

        let key = format!("{}{}.wav", self.key_prefix, Uuid::new_v4());
        self.store.upload_file(&key, &audio_path, "audio/wav").await?;

        let signed_access_url = self.store.signed_url(&key, self.signed_url_ttl).await?;
        let expiry = Utc::now()
            + chrono::Duration::from_std(self.signed_url_ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        Ok(AudioReference {
            storage_uri: self.store.uri_for(&key),
            key,
            signed_access_url,
            expiry,
        })
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("scribe-");

        let dir = match &self.temp_root {
            Some(root) => {
                fs_err::create_dir_all(root).map_err(|e| {
                    ScribeError::Download(format!("cannot create temp root: {}", e))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        };

        dir.map_err(|e| ScribeError::Download(format!("cannot create scratch directory: {}", e)))
    }
}
