use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

pub mod captions;
pub mod metadata;
pub mod youtube;

pub use captions::{CaptionSource, NativeTranscriptFetcher, YoutubeCaptionSource};
pub use metadata::{MetadataFetcher, MetadataSource, VideoMetadata, YoutubeDataApi};
pub use youtube::YtDlpDownloader;

use crate::{Result, ScribeError};

/// Fetches the best audio stream for a URL as normalized WAV
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Write mono 16-bit PCM WAV next to `stem` (extension added) and return the file written
    async fn download(&self, url: &str, stem: &Path) -> Result<PathBuf>;
}

/// Extract the platform video identifier from a URL
pub fn extract_video_id(input: &str) -> Result<String> {
    let parsed = Url::parse(input)
        .map_err(|_| ScribeError::InvalidUrl(format!("cannot parse URL: {}", input)))?;

    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        if is_valid_id(&id) {
            return Ok(id.into_owned());
        }
    }

    let host = parsed
        .host_str()
        .unwrap_or("")
        .trim_start_matches("www.")
        .trim_start_matches("m.");
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let id = match segments.as_slice() {
        [id, ..] if host == "youtu.be" => Some(*id),
        [prefix, id, ..]
            if is_youtube_host(host) && matches!(*prefix, "shorts" | "embed" | "live" | "v") =>
        {
            Some(*id)
        }
        _ => None,
    };

    id.filter(|id| is_valid_id(id))
        .map(str::to_string)
        .ok_or_else(|| ScribeError::InvalidUrl(format!("no video id in URL: {}", input)))
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com") || host == "youtube-nocookie.com"
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
