//! Builds the process-wide clients and the components composed from them.

use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::Client as TranscribeClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioAcquirer;
use crate::config::Config;
use crate::extractors::{
    MetadataFetcher, NativeTranscriptFetcher, YoutubeCaptionSource, YoutubeDataApi,
    YtDlpDownloader,
};
use crate::indexing::{DifyDatasetIndex, DocumentIndexer, FirestoreDocumentStore};
use crate::resolver::TranscriptResolver;
use crate::server::AppState;
use crate::storage::{ObjectStore, S3ObjectStore};
use crate::transcribe::{AwsTranscribeService, DiarizationConfig, Transcriber, TranscriberSettings};
use crate::{Result, ScribeError};

/// Every long-lived component, constructed once and shared across requests
pub struct Services {
    pub resolver: Arc<TranscriptResolver>,
    pub metadata: Arc<MetadataFetcher>,
    pub store: Arc<dyn ObjectStore>,
    pub indexer: Arc<DocumentIndexer>,
}

impl Services {
    pub async fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ScribeError::Config(e.to_string()))?;

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.aws_region())
            .load()
            .await;

        let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
            S3Client::new(&aws_config),
            config.aws.s3_bucket.clone(),
        ));
        let speech = Arc::new(AwsTranscribeService::new(TranscribeClient::new(&aws_config)));

        let transcription = &config.aws.transcription;
        let transcriber = Transcriber::new(
            speech,
            TranscriberSettings {
                timeout: config.transcription_timeout(),
                sample_rate_hertz: transcription.sample_rate,
                diarization: DiarizationConfig {
                    min_speakers: transcription.min_speakers,
                    max_speakers: transcription.max_speakers,
                },
            },
        );

        let acquirer = AudioAcquirer::new(
            Arc::new(YtDlpDownloader::new(transcription.sample_rate)),
            store.clone(),
        )
        .with_key_prefix(config.aws.s3_key_prefix.clone().unwrap_or_default())
        .with_signed_url_ttl(config.signed_url_ttl())
        .with_temp_root(config.app.temp_dir.clone());

        let native = NativeTranscriptFetcher::new(Arc::new(YoutubeCaptionSource::new(
            config.youtube.caption_languages.clone(),
        )));

        let resolver = TranscriptResolver::new(native, acquirer, transcriber)
            .with_default_language(transcription.default_language.clone());

        let metadata = MetadataFetcher::new(Arc::new(YoutubeDataApi::new(
            config.youtube.data_api_base_url.clone(),
            secret(config.youtube.api_key.as_deref(), "youtube.api_key"),
        )));

        let indexer = DocumentIndexer::new(
            Arc::new(DifyDatasetIndex::new(
                config.indexing.base_url.clone(),
                config.indexing.dataset_id.clone(),
                secret(config.indexing.api_key.as_deref(), "indexing.api_key"),
            )),
            Arc::new(FirestoreDocumentStore::new(
                config.document_store.project_id.clone(),
                config.document_store.collection.clone(),
                secret(
                    config.document_store.access_token.as_deref(),
                    "document_store.access_token",
                ),
            )),
        );

        Ok(Self {
            resolver: Arc::new(resolver),
            metadata: Arc::new(metadata),
            store,
            indexer: Arc::new(indexer),
        })
    }

    pub fn into_state(self, config: &Config, shutdown: CancellationToken) -> AppState {
        AppState {
            resolver: self.resolver,
            metadata: self.metadata,
            store: self.store,
            indexer: self.indexer,
            shutdown,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Missing keys only fail the endpoints that need them
fn secret(value: Option<&str>, name: &str) -> String {
    match value {
        Some(value) => value.to_string(),
        None => {
            tracing::warn!(key = name, "Secret not configured; dependent endpoints will fail");
            String::new()
        }
    }
}
