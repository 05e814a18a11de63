use async_trait::async_trait;
use aws_sdk_transcribe::error::DisplayErrorContext;
use aws_sdk_transcribe::types::{
    LanguageCode, Media, MediaFormat, Settings, TranscriptionJob, TranscriptionJobStatus,
};
use aws_sdk_transcribe::Client as TranscribeClient;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use uuid::Uuid;

use super::{
    AudioEncoding, RecognitionAlternative, RecognitionRequest, RecognitionResult, SpeechService,
    WordInfo,
};
use crate::{Result, ScribeError};

/// AWS Transcribe transcript format
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    items: Vec<TranscriptItem>,
}

#[derive(Debug, Deserialize)]
struct TranscriptItem {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(rename = "type")]
    item_type: String,
    alternatives: Vec<Alternative>,
    speaker_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    confidence: Option<String>,
    content: String,
}

/// Speech service backed by AWS Transcribe batch jobs
pub struct AwsTranscribeService {
    client: TranscribeClient,
    http: reqwest::Client,
}

impl AwsTranscribeService {
    pub fn new(client: TranscribeClient) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
        }
    }

    /// Start AWS Transcribe job with speaker identification
    async fn start_transcription_job(&self, request: &RecognitionRequest) -> Result<String> {
        let job_name = format!("scribe_{}", Uuid::new_v4());

        tracing::info!(job = %job_name, media_uri = %request.media_uri, "Starting transcription job");

        // Transcribe always punctuates and reports word offsets; only the container is chosen here
        let media_format = match request.encoding {
            AudioEncoding::Linear16 => MediaFormat::Wav,
        };

        let media = Media::builder()
            .media_file_uri(&request.media_uri)
            .build();

        let mut settings = Settings::builder();

        // Transcribe diarizes between 2 and 30 speakers and takes only an upper bound
        let max_speakers = request.diarization.max_speakers.clamp(1, 30);
        if max_speakers >= 2 {
            settings = settings
                .show_speaker_labels(true)
                .max_speaker_labels(max_speakers as i32);
        } else {
            tracing::warn!("Single-speaker range requested, speaker labels disabled");
        }

        self.client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .language_code(LanguageCode::from(request.language_code.as_str()))
            .media_format(media_format)
            .media_sample_rate_hertz(request.sample_rate_hertz as i32)
            .media(media)
            .settings(settings.build())
            .send()
            .await
            .map_err(|e| {
                ScribeError::Transcription(format!(
                    "Failed to start transcription job: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(job_name)
    }

    /// Poll the job until it reaches a terminal state
    async fn wait_for_completion(&self, job_name: &str) -> Result<TranscriptionJob> {
        let start_time = Instant::now();
        let mut check_count: u64 = 0;

        loop {
            check_count += 1;

            let job = self.get_transcription_job(job_name).await?;

            match job_state(job.transcription_job_status(), job.failure_reason())? {
                JobState::Running => {
                    tracing::debug!(
                        job = %job_name,
                        elapsed_secs = start_time.elapsed().as_secs(),
                        check = check_count,
                        "Transcription in progress"
                    );
                    sleep(poll_delay(check_count)).await;
                }
                JobState::Completed => {
                    tracing::info!(
                        job = %job_name,
                        elapsed_secs = start_time.elapsed().as_secs(),
                        "Transcription job completed"
                    );
                    return Ok(job);
                }
            }
        }
    }

    /// Get transcription job details
    async fn get_transcription_job(&self, job_name: &str) -> Result<TranscriptionJob> {
        let response = self
            .client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .map_err(|e| {
                ScribeError::Transcription(format!(
                    "Failed to get transcription job status: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| ScribeError::Transcription("Transcription job not found".to_string()))
    }

    /// Download transcript JSON from the job's output location
    async fn download_transcript(&self, job: &TranscriptionJob) -> Result<String> {
        let uri = job
            .transcript()
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| ScribeError::Transcription("No transcript URI found".to_string()))?;

        let response = self.http.get(uri).send().await.map_err(|e| {
            ScribeError::Transcription(format!("Failed to download transcript: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ScribeError::Transcription(format!(
                "Failed to download transcript: HTTP {}",
                response.status()
            )));
        }

        response.text().await.map_err(|e| {
            ScribeError::Transcription(format!("Failed to read transcript content: {}", e))
        })
    }
}

#[async_trait]
impl SpeechService for AwsTranscribeService {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<RecognitionResult>> {
        let job_name = self.start_transcription_job(request).await?;

        // Deletes the job unless it completes: deadline, cancellation and failures all clean up
        let mut guard = JobGuard::new(self.client.clone(), job_name);
        let job = self.wait_for_completion(guard.job_name()).await?;
        guard.disarm();

        let transcript_json = self.download_transcript(&job).await?;
        parse_transcript(&transcript_json)
    }
}

/// Where a polled job stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Running,
    Completed,
}

/// Classify a polled job status; a failed or unrecognized status ends polling with an error
fn job_state(
    status: Option<&TranscriptionJobStatus>,
    failure_reason: Option<&str>,
) -> Result<JobState> {
    match status {
        Some(TranscriptionJobStatus::Queued) | Some(TranscriptionJobStatus::InProgress) => {
            Ok(JobState::Running)
        }
        Some(TranscriptionJobStatus::Completed) => Ok(JobState::Completed),
        Some(TranscriptionJobStatus::Failed) => Err(ScribeError::Transcription(format!(
            "Transcription job failed: {}",
            failure_reason.unwrap_or("Unknown error")
        ))),
        other => Err(ScribeError::Transcription(format!(
            "Unexpected transcription job status: {:?}",
            other
        ))),
    }
}

/// Linear backoff between status checks, capped at 30 seconds
fn poll_delay(check_count: u64) -> Duration {
    Duration::from_secs(std::cmp::min(5 + check_count.saturating_sub(1) * 2, 30))
}

/// Deletes an abandoned transcription job when dropped while armed
struct JobGuard {
    client: TranscribeClient,
    job_name: String,
    armed: bool,
}

impl JobGuard {
    fn new(client: TranscribeClient, job_name: String) -> Self {
        Self {
            client,
            job_name,
            armed: true,
        }
    }

    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(job = %self.job_name, "No runtime to delete abandoned transcription job");
            return;
        };

        let client = self.client.clone();
        let job_name = std::mem::take(&mut self.job_name);
        tracing::info!(job = %job_name, "Deleting abandoned transcription job");
        runtime.spawn(async move {
            if let Err(e) = client
                .delete_transcription_job()
                .transcription_job_name(&job_name)
                .send()
                .await
            {
                tracing::warn!(
                    job = %job_name,
                    error = %DisplayErrorContext(&e),
                    "Failed to delete abandoned transcription job"
                );
            }
        });
    }
}

/// Parse a Transcribe output document into per-turn recognition results
pub fn parse_transcript(json: &str) -> Result<Vec<RecognitionResult>> {
    let transcript: AwsTranscript = serde_json::from_str(json).map_err(|e| {
        ScribeError::Transcription(format!("Failed to parse transcript JSON: {}", e))
    })?;

    Ok(group_items(&transcript.results.items))
}

/// Words accumulated for the current speaker turn
#[derive(Default)]
struct Turn {
    text: String,
    words: Vec<WordInfo>,
    confidences: Vec<f64>,
    speaker: Option<u32>,
}

impl Turn {
    fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn push_word(&mut self, word: WordInfo, confidence: Option<f64>) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&word.word);
        self.speaker = word.speaker_tag;
        self.confidences.extend(confidence);
        self.words.push(word);
    }

    fn finish(&mut self) -> RecognitionResult {
        let turn = std::mem::take(self);
        let confidence = if turn.confidences.is_empty() {
            0.0
        } else {
            turn.confidences.iter().sum::<f64>() / turn.confidences.len() as f64
        };

        RecognitionResult {
            alternatives: vec![RecognitionAlternative {
                transcript: turn.text,
                confidence,
                words: turn.words,
            }],
        }
    }
}

/// Group the flat item list into results, one per speaker turn, closed at sentence ends
fn group_items(items: &[TranscriptItem]) -> Vec<RecognitionResult> {
    let mut results = Vec::new();
    let mut current = Turn::default();

    for item in items {
        let Some(alternative) = item.alternatives.first() else {
            continue;
        };

        match item.item_type.as_str() {
            "pronunciation" => {
                let start_time = item.start_time.as_deref().and_then(|s| s.parse::<f64>().ok());
                let end_time = item.end_time.as_deref().and_then(|s| s.parse::<f64>().ok());
                let (Some(start_time), Some(end_time)) = (start_time, end_time) else {
                    continue;
                };

                let speaker_tag = item.speaker_label.as_deref().and_then(parse_speaker_label);
                if !current.is_empty() && current.speaker != speaker_tag {
                    results.push(current.finish());
                }

                let confidence = alternative
                    .confidence
                    .as_deref()
                    .and_then(|c| c.parse::<f64>().ok());

                current.push_word(
                    WordInfo {
                        word: alternative.content.clone(),
                        start_time,
                        end_time,
                        speaker_tag,
                    },
                    confidence,
                );
            }
            "punctuation" => {
                if current.is_empty() {
                    continue;
                }
                current.text.push_str(&alternative.content);
                if matches!(alternative.content.as_str(), "." | "?" | "!") {
                    results.push(current.finish());
                }
            }
            _ => {}
        }
    }

    if !current.is_empty() {
        results.push(current.finish());
    }

    results
}

/// `spk_0` becomes speaker 1
fn parse_speaker_label(label: &str) -> Option<u32> {
    label
        .strip_prefix("spk_")
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| n + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::TranscriptResult;

    #[test]
    fn test_queued_and_running_jobs_keep_polling() {
        assert_eq!(
            job_state(Some(&TranscriptionJobStatus::Queued), None).unwrap(),
            JobState::Running
        );
        assert_eq!(
            job_state(Some(&TranscriptionJobStatus::InProgress), None).unwrap(),
            JobState::Running
        );
        assert_eq!(
            job_state(Some(&TranscriptionJobStatus::Completed), None).unwrap(),
            JobState::Completed
        );
    }

    #[test]
    fn test_failed_job_reports_reason() {
        let err = job_state(
            Some(&TranscriptionJobStatus::Failed),
            Some("The media format is not supported"),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "transcription_error");
        assert!(err.to_string().contains("The media format is not supported"));

        let err = job_state(Some(&TranscriptionJobStatus::Failed), None).unwrap_err();
        assert!(err.to_string().contains("Unknown error"));
    }

    #[test]
    fn test_missing_or_unknown_status_stops_polling() {
        let err = job_state(None, None).unwrap_err();
        assert!(err.to_string().contains("Unexpected transcription job status"));

        let unknown = TranscriptionJobStatus::from("PAUSED");
        assert!(job_state(Some(&unknown), None).is_err());
    }

    fn offline_client() -> TranscribeClient {
        use aws_sdk_transcribe::config::{BehaviorVersion, Region};

        let config = aws_sdk_transcribe::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        TranscribeClient::from_conf(config)
    }

    #[test]
    fn test_guard_without_runtime_drops_quietly() {
        let guard = JobGuard::new(offline_client(), "scribe_abandoned".to_string());
        assert_eq!(guard.job_name(), "scribe_abandoned");
        drop(guard);
    }

    #[test]
    fn test_disarmed_guard_keeps_job() {
        let mut guard = JobGuard::new(offline_client(), "scribe_done".to_string());
        guard.disarm();
        assert!(!guard.armed);
    }

    #[test]
    fn test_poll_delay_grows_then_caps() {
        assert_eq!(poll_delay(1), Duration::from_secs(5));
        assert_eq!(poll_delay(2), Duration::from_secs(7));
        assert_eq!(poll_delay(13), Duration::from_secs(29));
        assert_eq!(poll_delay(14), Duration::from_secs(30));
        assert_eq!(poll_delay(100), Duration::from_secs(30));
    }

    const SAMPLE: &str = r#"{
        "jobName": "scribe_1",
        "accountId": "123",
        "status": "COMPLETED",
        "results": {
            "transcripts": [{"transcript": "Hi there. How are you? Fine"}],
            "items": [
                {"start_time": "0.5", "end_time": "0.8", "type": "pronunciation", "speaker_label": "spk_0",
                 "alternatives": [{"confidence": "0.9", "content": "Hi"}]},
                {"start_time": "0.9", "end_time": "1.2", "type": "pronunciation", "speaker_label": "spk_0",
                 "alternatives": [{"confidence": "0.7", "content": "there"}]},
                {"type": "punctuation", "alternatives": [{"confidence": "0.0", "content": "."}]},
                {"start_time": "1.5", "end_time": "1.7", "type": "pronunciation", "speaker_label": "spk_0",
                 "alternatives": [{"confidence": "1.0", "content": "How"}]},
                {"start_time": "1.7", "end_time": "1.8", "type": "pronunciation", "speaker_label": "spk_0",
                 "alternatives": [{"confidence": "1.0", "content": "are"}]},
                {"start_time": "1.8", "end_time": "2.0", "type": "pronunciation", "speaker_label": "spk_0",
                 "alternatives": [{"confidence": "1.0", "content": "you"}]},
                {"type": "punctuation", "alternatives": [{"confidence": "0.0", "content": "?"}]},
                {"start_time": "65.1", "end_time": "65.6", "type": "pronunciation", "speaker_label": "spk_1",
                 "alternatives": [{"confidence": "0.8", "content": "Fine"}]}
            ]
        }
    }"#;

    #[test]
    fn test_groups_by_sentence_and_speaker() {
        let results = parse_transcript(SAMPLE).unwrap();

        let transcripts: Vec<&str> = results
            .iter()
            .map(|r| r.alternatives[0].transcript.as_str())
            .collect();
        assert_eq!(transcripts, vec!["Hi there.", "How are you?", "Fine"]);

        let first = &results[0].alternatives[0];
        assert!((first.confidence - 0.8).abs() < 1e-9);
        assert_eq!(first.words.len(), 2);
        assert_eq!(first.words[0].speaker_tag, Some(1));
        assert_eq!(results[2].alternatives[0].words[0].speaker_tag, Some(2));
    }

    #[test]
    fn test_speaker_change_splits_without_punctuation() {
        let json = r#"{"results": {"items": [
            {"start_time": "0.0", "end_time": "0.4", "type": "pronunciation", "speaker_label": "spk_0",
             "alternatives": [{"confidence": "0.9", "content": "yes"}]},
            {"start_time": "0.5", "end_time": "0.9", "type": "pronunciation", "speaker_label": "spk_1",
             "alternatives": [{"confidence": "0.9", "content": "no"}]}
        ]}}"#;

        let results = parse_transcript(json).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_formats_into_speaker_lines() {
        let transcript = TranscriptResult::from_recognition(parse_transcript(SAMPLE).unwrap());

        assert_eq!(
            transcript.formatted_transcript,
            "[00:00:00] Speaker 1: Hi there.\n[00:00:01] Speaker 1: How are you?\n[00:01:05] Speaker 2: Fine"
        );
    }

    #[test]
    fn test_missing_speaker_labels_leave_tag_empty() {
        let json = r#"{"results": {"items": [
            {"start_time": "3.0", "end_time": "3.4", "type": "pronunciation",
             "alternatives": [{"confidence": "0.9", "content": "solo"}]}
        ]}}"#;

        let results = parse_transcript(json).unwrap();
        assert_eq!(results[0].alternatives[0].words[0].speaker_tag, None);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = parse_transcript("{not json").unwrap_err();
        assert_eq!(err.kind(), "transcription_error");
    }

    #[test]
    fn test_parse_speaker_label() {
        assert_eq!(parse_speaker_label("spk_0"), Some(1));
        assert_eq!(parse_speaker_label("spk_9"), Some(10));
        assert_eq!(parse_speaker_label("speaker"), None);
    }
}
