use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioAcquirer, AudioReference};
use crate::extractors::NativeTranscriptFetcher;
use crate::transcribe::{TranscriptResult, Transcriber};
use crate::utils::normalize_language_code;
use crate::{Result, ScribeError};

/// Transcript plus the stored audio, when the fallback path produced it
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTranscript {
    #[serde(flatten)]
    pub transcript: TranscriptResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioReference>,
}

/// Native captions first, remote transcription of downloaded audio otherwise
pub struct TranscriptResolver {
    native: NativeTranscriptFetcher,
    acquirer: AudioAcquirer,
    transcriber: Transcriber,
    default_language: String,
}

impl TranscriptResolver {
    pub fn new(
        native: NativeTranscriptFetcher,
        acquirer: AudioAcquirer,
        transcriber: Transcriber,
    ) -> Self {
        Self {
            native,
            acquirer,
            transcriber,
            default_language: "en-US".to_string(),
        }
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn native(&self) -> &NativeTranscriptFetcher {
        &self.native
    }

    pub fn acquirer(&self) -> &AudioAcquirer {
        &self.acquirer
    }

    pub fn transcriber(&self) -> &Transcriber {
        &self.transcriber
    }

    /// Language code to send to the speech service
    pub fn language(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(normalize_language_code)
            .unwrap_or_else(|| self.default_language.clone())
    }

    pub async fn resolve_transcript(
        &self,
        url: &str,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TranscriptResult> {
        self.resolve(url, language, cancel)
            .await
            .map(|resolved| resolved.transcript)
    }

    /// Resolve a transcript for `url`.
    ///
    /// A native transcript short-circuits the chain, so no audio is downloaded,
    /// stored or transcribed for it. Any failure of the native lookup sends the
    /// request down the audio path; failures there are returned as-is.
    pub async fn resolve(
        &self,
        url: &str,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedTranscript> {
        match self.native.fetch_native_transcript(url).await {
            Ok(transcript) => {
                tracing::info!(url, cues = transcript.utterances.len(), "Using native transcript");
                return Ok(ResolvedTranscript {
                    transcript,
                    audio: None,
                });
            }
            Err(e) => {
                tracing::info!(url, kind = e.kind(), reason = %e, "Native transcript unavailable, transcribing audio");
            }
        }

        self.transcribe_audio(url, language, cancel).await
    }

    /// Download, store and transcribe the audio of `url`, skipping the native lookup
    pub async fn transcribe_audio(
        &self,
        url: &str,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResolvedTranscript> {
        let audio = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ScribeError::Cancelled(format!("audio acquisition for {} was cancelled", url)));
            }
            audio = self.acquirer.acquire_audio(url) => audio?,
        };

        let language = self.language(language);
        let transcript = self
            .transcriber
            .transcribe(&audio.storage_uri, &language, cancel)
            .await?;

        Ok(ResolvedTranscript {
            transcript,
            audio: Some(audio),
        })
    }
}
