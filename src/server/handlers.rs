use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{render_chain, ApiError};
use super::{with_deadline, AppState};
use crate::audio::AudioReference;
use crate::extractors::VideoMetadata;
use crate::indexing::NewDocument;
use crate::resolver::ResolvedTranscript;
use crate::storage::probe_connection;
use crate::transcribe::TranscriptResult;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub url: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeQuery {
    pub gcs_uri: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateDocumentForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<String>,
    pub llm_processed: Option<String>,
    pub user_id: Option<String>,
}

impl CreateDocumentForm {
    /// Read the fields from either an urlencoded or a `multipart/form-data` body
    pub async fn from_body(request: Request) -> Result<Self, ApiError> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<Self>::from_request(request, &()).await?;
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(request, &()).await?;
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field.text().await?;
            form.set(&name, value);
        }
        Ok(form)
    }

    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "content" => &mut self.content,
            "metadata" => &mut self.metadata,
            "llm_processed" => &mut self.llm_processed,
            "user_id" => &mut self.user_id,
            _ => return,
        };
        *slot = Some(value);
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
    pub gcs_uri: String,
    pub expires_at: DateTime<Utc>,
}

impl From<AudioReference> for DownloadResponse {
    fn from(audio: AudioReference) -> Self {
        Self {
            download_url: audio.signed_access_url,
            gcs_uri: audio.storage_uri,
            expires_at: audio.expiry,
        }
    }
}

/// Metadata, transcript and (when audio was stored) download info in one object
///
/// A failed metadata lookup leaves the metadata fields out and reports the
/// failure in `metadata_error`; the transcript is still returned.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub metadata: Option<VideoMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,

    #[serde(flatten)]
    pub transcript: TranscriptResult,

    #[serde(flatten)]
    pub download: Option<DownloadResponse>,
}

impl VideoResponse {
    fn new(metadata: crate::Result<VideoMetadata>, resolved: ResolvedTranscript) -> Self {
        let (metadata, metadata_error) = match metadata {
            Ok(metadata) => (Some(metadata), None),
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Metadata unavailable, returning transcript only");
                (None, Some(e.to_string()))
            }
        };

        Self {
            metadata,
            metadata_error,
            transcript: resolved.transcript,
            download: resolved.audio.map(DownloadResponse::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateDocumentResponse {
    pub status: &'static str,
    pub vector_id: String,
    pub db_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectionFailure {
    pub status: &'static str,
    pub message: String,
    pub traceback: String,
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_metadata(value: Option<&str>) -> Result<Map<String, Value>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Map::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::bad_request(format!("Invalid metadata JSON: {}", e))),
    }
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

/// `GET /v`: metadata alongside a native-or-transcribed transcript
#[tracing::instrument(skip(state))]
pub async fn video_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<VideoResponse>, ApiError> {
    let url = required(query.url, "No URL provided")?;
    let cancel = state.shutdown.child_token();

    let (metadata, resolved) = tokio::join!(
        state.metadata.fetch_video_metadata(&url),
        with_deadline(
            state.request_timeout,
            &cancel,
            state.resolver.resolve(&url, query.lang.as_deref(), &cancel),
        ),
    );

    Ok(Json(VideoResponse::new(metadata, resolved?)))
}

/// `GET /audio`: like `/v` but always transcribes downloaded audio
#[tracing::instrument(skip(state))]
pub async fn audio_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<VideoResponse>, ApiError> {
    let url = required(query.url, "No URL provided")?;
    let cancel = state.shutdown.child_token();

    let (metadata, resolved) = tokio::join!(
        state.metadata.fetch_video_metadata(&url),
        with_deadline(
            state.request_timeout,
            &cancel,
            state
                .resolver
                .transcribe_audio(&url, query.lang.as_deref(), &cancel),
        ),
    );

    Ok(Json(VideoResponse::new(metadata, resolved?)))
}

#[tracing::instrument(skip(state))]
pub async fn download_audio_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let url = required(query.url, "No URL provided")?;
    let cancel = state.shutdown.child_token();

    let audio = with_deadline(
        state.request_timeout,
        &cancel,
        state.resolver.acquirer().acquire_audio(&url),
    )
    .await?;

    Ok(Json(DownloadResponse::from(audio)))
}

#[tracing::instrument(skip(state))]
pub async fn transcribe_handler(
    State(state): State<AppState>,
    Query(query): Query<TranscribeQuery>,
) -> Result<Json<TranscriptResult>, ApiError> {
    let locator = required(query.gcs_uri, "No GCS URI provided")?;
    let cancel = state.shutdown.child_token();
    let language = state.resolver.language(query.lang.as_deref());

    let transcript = with_deadline(
        state.request_timeout,
        &cancel,
        state
            .resolver
            .transcriber()
            .transcribe(&locator, &language, &cancel),
    )
    .await?;

    Ok(Json(transcript))
}

#[tracing::instrument(skip(state))]
pub async fn video_metadata_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<VideoMetadata>, ApiError> {
    let url = required(query.url, "No URL provided")?;
    Ok(Json(state.metadata.fetch_video_metadata(&url).await?))
}

#[tracing::instrument(skip(state))]
pub async fn video_transcript_handler(
    State(state): State<AppState>,
    Query(query): Query<VideoQuery>,
) -> Result<Json<TranscriptResult>, ApiError> {
    let url = required(query.url, "No URL provided")?;
    Ok(Json(state.resolver.native().fetch_native_transcript(&url).await?))
}

pub async fn test_connection_handler(State(state): State<AppState>) -> Response {
    match probe_connection(state.store.as_ref()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Storage connection test failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectionFailure {
                    status: "error",
                    message: e.to_string(),
                    traceback: render_chain(&e),
                }),
            )
                .into_response()
        }
    }
}

/// `POST /create-document`: index the text, then record it
#[tracing::instrument(skip(state, request))]
pub async fn create_document_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<CreateDocumentResponse>, ApiError> {
    let form = CreateDocumentForm::from_body(request).await?;
    let title = required(form.title, "No title provided")?;
    let content = required(form.content, "No content provided")?;
    let metadata = parse_metadata(form.metadata.as_deref())?;

    let document = NewDocument {
        title,
        content,
        metadata,
        llm_processed: non_blank(form.llm_processed),
        user_id: non_blank(form.user_id),
    };

    let indexed = state.indexer.create_document(document).await?;

    Ok(Json(CreateDocumentResponse {
        status: "success",
        vector_id: indexed.record.vector_id,
        db_id: indexed.db_id,
    }))
}
