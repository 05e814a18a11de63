use anyhow::{Context, Result};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod credentials;

pub use credentials::Credentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// AWS configuration
    pub aws: AwsConfig,

    /// YouTube caption and Data API settings
    pub youtube: YoutubeConfig,

    /// Dify dataset used as the vector index
    pub indexing: IndexingConfig,

    /// Firestore collection receiving document records
    pub document_store: DocumentStoreConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Deadline for a single resolving request, independent of the transcription ceiling
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for durable audio storage
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Lifetime of signed audio URLs
    pub signed_url_ttl_secs: u64,

    /// Transcription job settings
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Language used when the caller does not pass one
    pub default_language: String,

    /// Sample rate of the normalized audio
    pub sample_rate: u32,

    /// Lower bound on diarized speakers
    pub min_speakers: u8,

    /// Upper bound on diarized speakers
    pub max_speakers: u8,

    /// Ceiling on a single transcription job
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    /// Data API key; looked up in the credentials file when absent
    pub api_key: Option<String>,

    /// Caption languages in order of preference
    pub caption_languages: Vec<String>,

    pub data_api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub base_url: String,
    pub dataset_id: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    pub project_id: String,
    pub collection: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Temporary directory for downloads
    pub temp_dir: Option<PathBuf>,

    /// JSON file holding API keys by name
    pub credentials_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                request_timeout_secs: 900,
            },
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                s3_bucket: "".to_string(),
                s3_key_prefix: Some("audio/".to_string()),
                signed_url_ttl_secs: 3600,
                transcription: TranscriptionConfig {
                    default_language: "en-US".to_string(),
                    sample_rate: 16000,
                    min_speakers: 2,
                    max_speakers: 2,
                    timeout_secs: 600,
                },
            },
            youtube: YoutubeConfig {
                api_key: None,
                caption_languages: vec!["en".to_string()],
                data_api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            },
            indexing: IndexingConfig {
                base_url: "https://api.dify.ai/v1".to_string(),
                dataset_id: "".to_string(),
                api_key: None,
            },
            document_store: DocumentStoreConfig {
                project_id: "".to_string(),
                collection: "articles".to_string(),
                access_token: None,
            },
            app: AppConfig {
                temp_dir: None,
                credentials_file: None,
                json_logs: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the default locations
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            Ok(config)
        }
    }

    /// Read a YAML configuration file; [`Config::validate`] runs once services are built
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("scribe-service").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.aws.s3_bucket.is_empty() {
            anyhow::bail!("AWS S3 bucket must be configured");
        }

        let transcription = &self.aws.transcription;
        if transcription.min_speakers == 0 || transcription.min_speakers > transcription.max_speakers {
            anyhow::bail!(
                "Speaker range {}..={} is invalid",
                transcription.min_speakers,
                transcription.max_speakers
            );
        }

        if transcription.timeout_secs == 0 {
            anyhow::bail!("Transcription timeout must be positive");
        }

        Ok(())
    }

    /// Resolve secrets that were left out of the YAML from the credentials file
    pub fn resolve_secrets(&mut self, credentials: &Credentials) {
        if self.youtube.api_key.is_none() {
            self.youtube.api_key = credentials.get("youtube_api_key");
        }
        if self.indexing.api_key.is_none() {
            self.indexing.api_key = credentials.get("dify_datasets_api_key");
        }
        if self.document_store.access_token.is_none() {
            self.document_store.access_token = credentials.get("firestore_access_token");
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        use console::style;

        println!("{}", style("Current Configuration:").bold());
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  AWS Region: {}", self.aws.region);
        println!("  S3 Bucket: {}", self.aws.s3_bucket);
        if let Some(prefix) = &self.aws.s3_key_prefix {
            println!("  S3 Prefix: {}", prefix);
        }
        println!("  Default Language: {}", self.aws.transcription.default_language);
        println!(
            "  Speakers: {}..={}",
            self.aws.transcription.min_speakers, self.aws.transcription.max_speakers
        );
        println!("  Transcription Timeout: {}s", self.aws.transcription.timeout_secs);
        println!("  YouTube API Key: {}", mask(self.youtube.api_key.as_deref()));
        println!("  Dify Dataset: {}", self.indexing.dataset_id);
        println!("  Dify API Key: {}", mask(self.indexing.api_key.as_deref()));
        println!(
            "  Firestore: {}/{}",
            self.document_store.project_id, self.document_store.collection
        );
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.aws.region.clone())
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.aws.signed_url_ttl_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.aws.transcription.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}****", s.chars().take(4).collect::<String>()),
        Some(_) => "****".to_string(),
        None => style_unset(),
    }
}

fn style_unset() -> String {
    console::style("(not set)").dim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.aws.s3_bucket = "speech-audio".to_string();
        config
    }

    #[test]
    fn test_defaults_match_observed_service() {
        let config = Config::default();
        assert_eq!(config.aws.transcription.default_language, "en-US");
        assert_eq!(config.aws.transcription.min_speakers, 2);
        assert_eq!(config.aws.transcription.max_speakers, 2);
        assert_eq!(config.transcription_timeout(), Duration::from_secs(600));
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_validate_requires_bucket() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_speaker_range() {
        let mut config = valid();
        config.aws.transcription.min_speakers = 3;
        assert!(config.validate().is_err());

        config.aws.transcription.min_speakers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = valid();

        fs_err::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.aws.s3_bucket, "speech-audio");
        assert_eq!(loaded.document_store.collection, "articles");
    }

    #[test]
    fn test_secrets_fall_back_to_credentials_file() {
        let mut config = valid();
        config.youtube.api_key = Some("inline".to_string());

        let credentials = Credentials::from_json(
            r#"{"youtube_api_key": "from-file", "dify_datasets_api_key": "dify"}"#,
        )
        .unwrap();
        config.resolve_secrets(&credentials);

        assert_eq!(config.youtube.api_key.as_deref(), Some("inline"));
        assert_eq!(config.indexing.api_key.as_deref(), Some("dify"));
        assert_eq!(config.document_store.access_token, None);
    }

    #[test]
    fn test_mask_counts_characters_not_bytes() {
        assert_eq!(mask(Some("ключ-секрет")), "ключ****");
        assert_eq!(mask(Some("日本語")), "****");
    }

    #[test]
    fn test_mask_hides_secret_tail() {
        assert_eq!(mask(Some("abcdefgh")), "abcd****");
        assert_eq!(mask(Some("abc")), "****");
    }
}
