pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::extractors::MetadataFetcher;
use crate::indexing::DocumentIndexer;
use crate::resolver::TranscriptResolver;
use crate::storage::ObjectStore;
use crate::{Result, ScribeError};

/// Shared, immutable handles built once per process
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TranscriptResolver>,
    pub metadata: Arc<MetadataFetcher>,
    pub store: Arc<dyn ObjectStore>,
    pub indexer: Arc<DocumentIndexer>,
    /// Parent of every per-request token; cancelled on shutdown
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v", get(handlers::video_handler))
        .route("/audio", get(handlers::audio_handler))
        .route("/download-audio", get(handlers::download_audio_handler))
        .route("/transcribe", get(handlers::transcribe_handler))
        .route("/video-metadata", get(handlers::video_metadata_handler))
        .route("/video-transcript", get(handlers::video_transcript_handler))
        .route("/test-connection", get(handlers::test_connection_handler))
        .route("/create-document", post(handlers::create_document_handler))
        .layer(trace_layer)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
///
/// In-flight requests observe the shutdown through their cancellation tokens.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling in-flight work");
    token.cancel();
}

/// Run `work` under `deadline`, cancelling `cancel` when it runs out
pub async fn with_deadline<T, F>(deadline: Duration, cancel: &CancellationToken, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(ScribeError::Cancelled(format!(
                "request exceeded its {}s deadline",
                deadline.as_secs()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_token() {
        let cancel = CancellationToken::new();
        let err = with_deadline(Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = with_deadline(Duration::from_secs(5), &cancel, async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(!cancel.is_cancelled());
    }
}
