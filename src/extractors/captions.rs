use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::extract_video_id;
use crate::transcribe::{CaptionCue, TranscriptResult};
use crate::{Result, ScribeError};

/// Platform caption lookup by video identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Caption cues for `video_id`, or [`ScribeError::NotFound`] when the video has none
    async fn fetch_captions(&self, video_id: &str) -> Result<Vec<CaptionCue>>;
}

/// Retrieves platform-provided transcripts without touching the audio
pub struct NativeTranscriptFetcher {
    source: Arc<dyn CaptionSource>,
}

impl NativeTranscriptFetcher {
    pub fn new(source: Arc<dyn CaptionSource>) -> Self {
        Self { source }
    }

    pub async fn fetch_native_transcript(&self, url: &str) -> Result<TranscriptResult> {
        let video_id = extract_video_id(url)?;

        tracing::debug!(video_id = %video_id, "Looking up native captions");
        let cues = self.source.fetch_captions(&video_id).await?;

        if cues.is_empty() {
            return Err(ScribeError::NotFound(format!(
                "caption track for {} is empty",
                video_id
            )));
        }

        Ok(TranscriptResult::from_captions(cues))
    }
}

/// Caption track advertised in the watch page player response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,

    /// `asr` for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSegment>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSegment {
    #[serde(default)]
    utf8: String,
}

/// YouTube captions discovered from the watch page and fetched as `json3` timed text
pub struct YoutubeCaptionSource {
    client: Client,
    base_url: String,
    languages: Vec<String>,
}

impl YoutubeCaptionSource {
    pub fn new(languages: Vec<String>) -> Self {
        Self::with_base_url("https://www.youtube.com", languages)
    }

    pub fn with_base_url(base_url: impl Into<String>, languages: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            languages,
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ScribeError::Captions(format!("caption request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, url, "Caption request rejected");
            return Err(status_error(status));
        }

        response
            .text()
            .await
            .map_err(|e| ScribeError::Captions(format!("caption body unreadable: {}", e)))
    }

    fn track_url(&self, track: &CaptionTrack) -> String {
        let base = if track.base_url.starts_with('/') {
            format!("{}{}", self.base_url, track.base_url)
        } else {
            track.base_url.clone()
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}fmt=json3", base, separator)
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptionSource {
    async fn fetch_captions(&self, video_id: &str) -> Result<Vec<CaptionCue>> {
        let page_url = format!(
            "{}/watch?v={}",
            self.base_url,
            urlencoding::encode(video_id)
        );
        let page = self.get_text(&page_url).await?;

        let tracks = parse_caption_tracks(&page)?;
        let track = select_track(&tracks, &self.languages).ok_or_else(|| {
            ScribeError::NotFound(format!(
                "no caption track for {} in languages {:?}",
                video_id, self.languages
            ))
        })?;

        tracing::debug!(
            video_id,
            language = %track.language_code,
            generated = track.is_generated(),
            "Fetching caption track"
        );

        let body = self.get_text(&self.track_url(track)).await?;
        parse_timed_text(&body)
    }
}

/// Missing resources mean no captions; anything else is the service failing
fn status_error(status: reqwest::StatusCode) -> ScribeError {
    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
        ScribeError::NotFound(format!("caption request returned HTTP {}", status))
    } else {
        ScribeError::Captions(format!("caption request returned HTTP {}", status))
    }
}

/// Caption tracks listed in the player response embedded in a watch page
pub fn parse_caption_tracks(page: &str) -> Result<Vec<CaptionTrack>> {
    const MARKER: &str = "\"captionTracks\":";

    let start = page
        .find(MARKER)
        .ok_or_else(|| ScribeError::NotFound("video has no caption tracks".to_string()))?;

    let mut stream = serde_json::Deserializer::from_str(&page[start + MARKER.len()..])
        .into_iter::<Vec<CaptionTrack>>();

    match stream.next() {
        Some(Ok(tracks)) if !tracks.is_empty() => Ok(tracks),
        Some(Ok(_)) | None => Err(ScribeError::NotFound(
            "video has no caption tracks".to_string(),
        )),
        Some(Err(e)) => Err(ScribeError::Captions(format!(
            "caption track list unreadable: {}",
            e
        ))),
    }
}

/// Manual tracks beat generated ones; earlier languages beat later ones
fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    let wanted = |generated: bool| {
        languages.iter().find_map(|language| {
            tracks
                .iter()
                .find(|t| t.is_generated() == generated && &t.language_code == language)
        })
    };

    wanted(false).or_else(|| wanted(true))
}

/// Cues from a `json3` timed-text document, skipping empty events
pub fn parse_timed_text(body: &str) -> Result<Vec<CaptionCue>> {
    let timed: TimedText = serde_json::from_str(body)
        .map_err(|e| ScribeError::Captions(format!("caption track unreadable: {}", e)))?;

    Ok(timed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(CaptionCue {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::TranscriptSource;

    const WATCH_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en&kind=asr","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=de","languageCode":"de"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","languageCode":"en"}],"audioTracks":[]}}};</script>"#;

    #[test]
    fn test_parse_caption_tracks_from_watch_page() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();

        assert_eq!(tracks.len(), 3);
        assert!(tracks[0].is_generated());
        assert_eq!(
            tracks[2].base_url,
            "https://www.youtube.com/api/timedtext?v=abc&lang=en"
        );
    }

    #[test]
    fn test_page_without_captions_is_not_found() {
        let err = parse_caption_tracks("<html>no player response</html>").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_only_missing_resources_count_as_no_captions() {
        assert_eq!(status_error(reqwest::StatusCode::NOT_FOUND).kind(), "not_found");
        assert_eq!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS).kind(),
            "captions_error"
        );
        assert_eq!(
            status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE).kind(),
            "captions_error"
        );
    }

    #[test]
    fn test_garbled_timed_text_is_a_service_error() {
        let err = parse_timed_text("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), "captions_error");
    }

    #[test]
    fn test_select_prefers_manual_track() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();

        let chosen = select_track(&tracks, &["en".to_string()]).unwrap();
        assert!(!chosen.is_generated());
        assert_eq!(chosen.language_code, "en");

        assert!(select_track(&tracks, &["fr".to_string()]).is_none());
    }

    #[test]
    fn test_track_url_requests_json3() {
        let source = YoutubeCaptionSource::new(vec!["en".to_string()]);
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();

        assert_eq!(
            source.track_url(&tracks[1]),
            "https://www.youtube.com/api/timedtext?v=abc&lang=de&fmt=json3"
        );
    }

    #[test]
    fn test_parse_timed_text_skips_empty_events() {
        let body = r#"{"events":[
            {"tStartMs":0,"dDurationMs":5000,"id":1,"wpWinPosId":1},
            {"tStartMs":1200,"dDurationMs":2300,"segs":[{"utf8":"hello "},{"utf8":"world"}]},
            {"tStartMs":3500,"dDurationMs":10,"segs":[{"utf8":"\n"}]},
            {"tStartMs":4000,"dDurationMs":1500,"segs":[{"utf8":"second\nline"}]}
        ]}"#;

        let cues = parse_timed_text(body).unwrap();

        assert_eq!(
            cues,
            vec![
                CaptionCue { text: "hello world".to_string(), start: 1.2, duration: 2.3 },
                CaptionCue { text: "second line".to_string(), start: 4.0, duration: 1.5 },
            ]
        );
    }

    #[tokio::test]
    async fn test_fetcher_wraps_cues_as_native() {
        let mut source = MockCaptionSource::new();
        source
            .expect_fetch_captions()
            .withf(|id| id == "ABC123")
            .times(1)
            .returning(|_| {
                Ok(vec![CaptionCue { text: "hi".to_string(), start: 0.0, duration: 1.0 }])
            });

        let fetcher = NativeTranscriptFetcher::new(Arc::new(source));
        let transcript = fetcher
            .fetch_native_transcript("https://www.youtube.com/watch?v=ABC123")
            .await
            .unwrap();

        assert_eq!(transcript.source, TranscriptSource::Native);
        assert_eq!(transcript.formatted_transcript, "hi");
    }

    #[tokio::test]
    async fn test_fetcher_rejects_unparseable_url_before_lookup() {
        let mut source = MockCaptionSource::new();
        source.expect_fetch_captions().never();

        let fetcher = NativeTranscriptFetcher::new(Arc::new(source));
        let err = fetcher.fetch_native_transcript("nonsense").await.unwrap_err();

        assert_eq!(err.kind(), "invalid_url");
    }

    #[tokio::test]
    async fn test_fetcher_treats_empty_track_as_missing() {
        let mut source = MockCaptionSource::new();
        source.expect_fetch_captions().returning(|_| Ok(vec![]));

        let fetcher = NativeTranscriptFetcher::new(Arc::new(source));
        let err = fetcher
            .fetch_native_transcript("https://youtu.be/abc")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "not_found");
    }
}
