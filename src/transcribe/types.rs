use serde::{Deserialize, Serialize};

/// Where a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    /// Captions published by the platform
    Native,
    /// Generated by the speech service from downloaded audio
    Transcribed,
}

/// One timed line of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,

    /// Diarized speaker, absent for native captions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_tag: Option<u32>,

    pub text: String,
}

/// A platform caption cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub text: String,

    /// Offset in seconds
    pub start: f64,

    /// Length in seconds
    pub duration: f64,
}

/// Word with timing as reported by the speech service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordInfo {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    pub speaker_tag: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionAlternative {
    pub transcript: String,
    pub confidence: f64,
    pub words: Vec<WordInfo>,
}

/// One recognition result; the first alternative is the most likely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub alternatives: Vec<RecognitionAlternative>,
}

/// Unflattened transcript data, shaped by the path that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTranscript {
    Captions(Vec<CaptionCue>),
    Recognition(Vec<RecognitionResult>),
}

/// Normalized transcript returned regardless of how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Rendered utterances joined by newlines
    pub formatted_transcript: String,

    pub raw_transcript: RawTranscript,

    /// Ordered by start time
    pub utterances: Vec<Utterance>,

    pub source: TranscriptSource,
}

impl TranscriptResult {
    /// Build a native transcript from caption cues
    pub fn from_captions(cues: Vec<CaptionCue>) -> Self {
        let utterances: Vec<Utterance> = cues
            .iter()
            .map(|cue| Utterance {
                start_time: cue.start,
                end_time: span_end(cue.start, cue.start + cue.duration),
                speaker_tag: None,
                text: cue.text.clone(),
            })
            .collect();

        let formatted_transcript = cues
            .iter()
            .map(|cue| cue.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            formatted_transcript,
            raw_transcript: RawTranscript::Captions(cues),
            utterances,
            source: TranscriptSource::Native,
        }
    }

    /// Build a diarized transcript from speech recognition results
    pub fn from_recognition(results: Vec<RecognitionResult>) -> Self {
        let utterances: Vec<Utterance> = results.iter().filter_map(utterance_for).collect();

        let formatted_transcript = utterances
            .iter()
            .map(render_line)
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            formatted_transcript,
            raw_transcript: RawTranscript::Recognition(results),
            utterances,
            source: TranscriptSource::Transcribed,
        }
    }
}

/// Line for a result: text from the top alternative, time and speaker from its first word
fn utterance_for(result: &RecognitionResult) -> Option<Utterance> {
    let alternative = result.alternatives.first()?;
    let text = alternative.transcript.trim();
    if text.is_empty() {
        return None;
    }

    let Some(first) = alternative.words.first() else {
        tracing::warn!(transcript = %text, "Recognition result has no word timings, skipping");
        return None;
    };
    let end_time = alternative
        .words
        .last()
        .map(|w| w.end_time)
        .unwrap_or(first.end_time);

    Some(Utterance {
        start_time: first.start_time,
        end_time: span_end(first.start_time, end_time),
        speaker_tag: first.speaker_tag,
        text: text.to_string(),
    })
}

/// Shortest span an utterance may cover
const MIN_UTTERANCE_SECS: f64 = 0.001;

/// `end`, pushed past `start` when the source reports an empty or inverted span
fn span_end(start: f64, end: f64) -> f64 {
    if end > start {
        end
    } else {
        start + MIN_UTTERANCE_SECS
    }
}

/// `[HH:MM:SS] Speaker <tag>: <text>`; an undiarized line reports speaker 0
pub fn render_line(utterance: &Utterance) -> String {
    format!(
        "[{}] Speaker {}: {}",
        format_timestamp(utterance.start_time),
        utterance.speaker_tag.unwrap_or(0),
        utterance.text
    )
}

/// Render seconds as `HH:MM:SS`, truncated to whole seconds
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
