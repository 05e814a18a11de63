use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{Result, ScribeError};

pub mod processor;
pub mod types;

pub use processor::AwsTranscribeService;
pub use types::{
    format_timestamp, CaptionCue, RawTranscript, RecognitionAlternative, RecognitionResult,
    TranscriptResult, TranscriptSource, Utterance, WordInfo,
};

/// Audio encoding submitted to the speech service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// 16-bit signed little-endian PCM in a WAV container
    Linear16,
}

/// Expected number of distinct speakers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiarizationConfig {
    pub min_speakers: u8,
    pub max_speakers: u8,
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            min_speakers: 2,
            max_speakers: 2,
        }
    }
}

/// Long-running recognition job description
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub media_uri: String,
    pub language_code: String,
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub enable_automatic_punctuation: bool,
    pub enable_word_time_offsets: bool,
    pub diarization: DiarizationConfig,
}

/// Diarization-capable speech-to-text backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Submit a job and resolve once it reaches a terminal state
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<RecognitionResult>>;
}

#[derive(Debug, Clone)]
pub struct TranscriberSettings {
    /// Ceiling on one job, including queueing on the provider side
    pub timeout: Duration,
    pub sample_rate_hertz: u32,
    pub diarization: DiarizationConfig,
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            sample_rate_hertz: 16000,
            diarization: DiarizationConfig::default(),
        }
    }
}

/// Runs remote transcription jobs and normalizes their output
pub struct Transcriber {
    service: Arc<dyn SpeechService>,
    settings: TranscriberSettings,
}

impl Transcriber {
    pub fn new(service: Arc<dyn SpeechService>, settings: TranscriberSettings) -> Self {
        Self { service, settings }
    }

    /// Request sent for a stored audio object
    pub fn request_for(&self, storage_locator: &str, language_code: &str) -> RecognitionRequest {
        RecognitionRequest {
            media_uri: storage_locator.to_string(),
            language_code: language_code.to_string(),
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: self.settings.sample_rate_hertz,
            enable_automatic_punctuation: true,
            enable_word_time_offsets: true,
            diarization: self.settings.diarization,
        }
    }

    /// Transcribe a stored audio object with speaker diarization.
    ///
    /// Fails with [`ScribeError::Transcription`] when the job errors or does not
    /// finish within the configured ceiling, and with [`ScribeError::Cancelled`]
    /// as soon as `cancel` fires. No partial output is kept in either case.
    pub async fn transcribe(
        &self,
        storage_locator: &str,
        language_code: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscriptResult> {
        let request = self.request_for(storage_locator, language_code);

        tracing::info!(
            media_uri = %request.media_uri,
            language = %request.language_code,
            timeout_secs = self.settings.timeout.as_secs(),
            "Starting diarized transcription"
        );

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ScribeError::Cancelled(format!(
                    "transcription of {} was cancelled",
                    storage_locator
                )));
            }
            outcome = tokio::time::timeout(self.settings.timeout, self.service.recognize(&request)) => {
                match outcome {
                    Ok(results) => results?,
                    Err(_) => {
                        return Err(ScribeError::Transcription(format!(
                            "job for {} did not finish within {}s",
                            storage_locator,
                            self.settings.timeout.as_secs()
                        )));
                    }
                }
            }
        };

        let transcript = TranscriptResult::from_recognition(results);
        tracing::info!(
            lines = transcript.utterances.len(),
            "Transcription completed"
        );

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledService;

    #[async_trait]
    impl SpeechService for StalledService {
        async fn recognize(&self, _request: &RecognitionRequest) -> Result<Vec<RecognitionResult>> {
            std::future::pending().await
        }
    }

    fn one_result() -> Vec<RecognitionResult> {
        vec![RecognitionResult {
            alternatives: vec![RecognitionAlternative {
                transcript: "Welcome back.".to_string(),
                confidence: 0.93,
                words: vec![WordInfo {
                    word: "Welcome".to_string(),
                    start_time: 7.2,
                    end_time: 7.6,
                    speaker_tag: Some(2),
                }],
            }],
        }]
    }

    #[tokio::test]
    async fn test_request_carries_fixed_recognition_settings() {
        let mut service = MockSpeechService::new();
        service
            .expect_recognize()
            .withf(|request| {
                request.media_uri == "s3://bucket/audio/a.wav"
                    && request.language_code == "zh-CN"
                    && request.encoding == AudioEncoding::Linear16
                    && request.sample_rate_hertz == 16000
                    && request.enable_automatic_punctuation
                    && request.enable_word_time_offsets
                    && request.diarization == DiarizationConfig { min_speakers: 2, max_speakers: 2 }
            })
            .times(1)
            .returning(|_| Ok(one_result()));

        let transcriber = Transcriber::new(Arc::new(service), TranscriberSettings::default());
        let transcript = transcriber
            .transcribe("s3://bucket/audio/a.wav", "zh-CN", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transcript.formatted_transcript, "[00:00:07] Speaker 2: Welcome back.");
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let mut service = MockSpeechService::new();
        service
            .expect_recognize()
            .returning(|_| Err(ScribeError::Transcription("job failed: bad audio".to_string())));

        let transcriber = Transcriber::new(Arc::new(service), TranscriberSettings::default());
        let err = transcriber
            .transcribe("s3://bucket/a.wav", "en-US", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "transcription_error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_ceiling() {
        let transcriber = Transcriber::new(Arc::new(StalledService), TranscriberSettings::default());

        let err = transcriber
            .transcribe("s3://bucket/a.wav", "en-US", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Transcription(ref msg) if msg.contains("600s")));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_wait() {
        let transcriber = Transcriber::new(Arc::new(StalledService), TranscriberSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transcriber
            .transcribe("s3://bucket/a.wav", "en-US", &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
    }
}
