use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scribe",
    about = "Scribe Service - transcripts for video URLs, native captions first, AWS Transcribe otherwise",
    version,
    long_about = "Serves an HTTP API that resolves video transcripts. Platform captions are used when they exist; otherwise the audio is downloaded, stored in S3 and transcribed with speaker diarization by AWS Transcribe. The same pipeline is available from the command line."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config dir)
    #[arg(short, long, global = true, env = "SCRIBE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file with API keys by name
    #[arg(long, global = true, env = "SCRIBE_CREDENTIALS", value_name = "FILE")]
    pub credentials: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Resolve the transcript of a single video
    Resolve {
        #[arg(value_name = "URL")]
        url: String,

        /// Language code for transcription (default from config)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the metadata of a video as JSON
    Metadata {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Verify the storage bucket with a list/put/delete round trip
    TestConnection,

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted transcript lines
    Text,
    /// Full transcript result as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
