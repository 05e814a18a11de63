use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::AudioDownloader;
use crate::{Result, ScribeError};

/// Audio downloader driving yt-dlp, with ffmpeg doing the WAV conversion
pub struct YtDlpDownloader {
    yt_dlp_path: String,
    sample_rate: u32,
}

impl YtDlpDownloader {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            sample_rate,
        }
    }

    pub fn with_binary(mut self, yt_dlp_path: impl Into<String>) -> Self {
        self.yt_dlp_path = yt_dlp_path.into();
        self
    }

    fn args(&self, url: &str, stem: &Path) -> Vec<String> {
        vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "wav".to_string(),
            "--postprocessor-args".to_string(),
            format!("ffmpeg:-ar {} -ac 1", self.sample_rate),
            "--no-playlist".to_string(),
            "--output".to_string(),
            format!("{}.%(ext)s", stem.display()),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(&self, url: &str, stem: &Path) -> Result<PathBuf> {
        tracing::debug!(url, "Downloading audio with yt-dlp");

        let output = Command::new(&self.yt_dlp_path)
            .args(self.args(url, stem))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScribeError::Download(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::Download(format!(
                "yt-dlp could not extract audio: {}",
                error.trim()
            )));
        }

        let audio_path = stem.with_extension("wav");
        if !audio_path.exists() {
            return Err(ScribeError::Download(format!(
                "yt-dlp finished without producing {}",
                audio_path.display()
            )));
        }

        Ok(audio_path)
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new(16000)
    }
}
