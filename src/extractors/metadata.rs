use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::extract_video_id;
use crate::{Result, ScribeError};

/// Descriptive metadata for a video, fetched fresh on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,

    /// Size name (`default`, `medium`, `high`, ...) to image URL
    pub thumbnails: BTreeMap<String, String>,

    pub channel_title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tags: BTreeSet<String>,

    /// Default audio language, when the uploader declared one
    pub language: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata>;
}

/// Resolves a URL to its video metadata
pub struct MetadataFetcher {
    source: Arc<dyn MetadataSource>,
}

impl MetadataFetcher {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }

    pub async fn fetch_video_metadata(&self, url: &str) -> Result<VideoMetadata> {
        let video_id = extract_video_id(url)?;
        self.source.video_metadata(&video_id).await
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    thumbnails: BTreeMap<String, Thumbnail>,
    channel_title: Option<String>,
    /// RFC 3339; kept raw so a malformed value only drops this field
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    default_audio_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl From<Snippet> for VideoMetadata {
    fn from(snippet: Snippet) -> Self {
        Self {
            title: snippet.title.unwrap_or_else(|| "Unknown Title".to_string()),
            description: snippet
                .description
                .unwrap_or_else(|| "No description available.".to_string()),
            thumbnails: snippet
                .thumbnails
                .into_iter()
                .map(|(size, thumbnail)| (size, thumbnail.url))
                .collect(),
            channel_title: snippet
                .channel_title
                .unwrap_or_else(|| "Unknown Channel".to_string()),
            published_at: snippet.published_at.as_deref().and_then(parse_published_at),
            tags: snippet.tags.into_iter().collect(),
            language: snippet.default_audio_language,
        }
    }
}

/// YouTube Data API v3 client
pub struct YoutubeDataApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YoutubeDataApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for YoutubeDataApi {
    async fn video_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = format!(
            "{}/videos?id={}&key={}&part=snippet,contentDetails",
            self.base_url,
            urlencoding::encode(video_id),
            urlencoding::encode(&self.api_key)
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            ScribeError::Metadata(format!("metadata request for {} failed: {}", video_id, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(video_id, %status, "YouTube Data API error");
            return Err(ScribeError::Metadata(format!("HTTP {}: {}", status, body)));
        }

        let listing: VideoListResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::Metadata(format!("unreadable metadata response: {}", e)))?;

        listing
            .items
            .into_iter()
            .next()
            .map(|item| VideoMetadata::from(item.snippet))
            .ok_or_else(|| {
                ScribeError::Metadata("Video not found or no metadata available.".to_string())
            })
    }
}

fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(published) => Some(published.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(published_at = raw, error = %e, "Ignoring unparseable publish date");
            None
        }
    }
}
