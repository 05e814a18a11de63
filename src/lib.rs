//! Scribe Service - resolves transcripts for video URLs
//!
//! Given a video URL the service first asks the platform for a native caption
//! track. When none exists it downloads the audio, stores it in S3 and runs a
//! diarized AWS Transcribe job, returning one normalized transcript shape
//! either way. Video metadata lookups and document indexing ride along on the
//! same HTTP surface.

pub mod audio;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod indexing;
pub mod output;
pub mod resolver;
pub mod server;
pub mod storage;
pub mod transcribe;
pub mod utils;
pub mod wiring;

pub use audio::{AudioAcquirer, AudioReference};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{extract_video_id, MetadataFetcher, NativeTranscriptFetcher, VideoMetadata};
pub use indexing::{DocumentIndexer, IndexedDocument, NewDocument};
pub use resolver::{ResolvedTranscript, TranscriptResolver};
pub use transcribe::{TranscriptResult, TranscriptSource, Transcriber, Utterance};

/// Result type used throughout the library
pub type Result<T, E = ScribeError> = std::result::Result<T, E>;

/// Error taxonomy shared by every pipeline stage
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("No native transcript available: {0}")]
    NotFound(String),

    #[error("Caption service unavailable: {0}")]
    Captions(String),

    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Object storage operation failed: {0}")]
    Storage(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Document indexing failed: {0}")]
    Indexing(String),

    #[error("Video metadata unavailable: {0}")]
    Metadata(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScribeError {
    /// Stable tag reported to HTTP clients alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            ScribeError::InvalidUrl(_) => "invalid_url",
            ScribeError::InvalidInput(_) => "invalid_input",
            ScribeError::NotFound(_) => "not_found",
            ScribeError::Captions(_) => "captions_error",
            ScribeError::Download(_) => "download_error",
            ScribeError::Storage(_) => "storage_error",
            ScribeError::Transcription(_) => "transcription_error",
            ScribeError::Indexing(_) => "indexing_error",
            ScribeError::Metadata(_) => "metadata_error",
            ScribeError::Cancelled(_) => "cancelled",
            ScribeError::Config(_) => "config_error",
        }
    }
}
