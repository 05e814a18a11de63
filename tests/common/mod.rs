#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use scribe_service::extractors::{AudioDownloader, CaptionSource, MetadataSource};
use scribe_service::indexing::{DocumentIndex, DocumentRecord, DocumentStore};
use scribe_service::server::AppState;
use scribe_service::storage::ObjectStore;
use scribe_service::transcribe::{
    CaptionCue, RecognitionAlternative, RecognitionRequest, RecognitionResult, SpeechService,
    TranscriberSettings, WordInfo,
};
use scribe_service::{
    AudioAcquirer, DocumentIndexer, MetadataFetcher, NativeTranscriptFetcher, ScribeError,
    Transcriber, TranscriptResolver, VideoMetadata,
};

pub struct MockCaptionSource {
    pub cues: Option<Vec<CaptionCue>>,
}

#[async_trait]
impl CaptionSource for MockCaptionSource {
    async fn fetch_captions(&self, video_id: &str) -> scribe_service::Result<Vec<CaptionCue>> {
        self.cues
            .clone()
            .ok_or_else(|| ScribeError::NotFound(format!("no captions for {}", video_id)))
    }
}

pub struct MockMetadataSource;

#[async_trait]
impl MetadataSource for MockMetadataSource {
    async fn video_metadata(&self, video_id: &str) -> scribe_service::Result<VideoMetadata> {
        Ok(VideoMetadata {
            title: format!("Video {}", video_id),
            description: "A recorded conversation".to_string(),
            thumbnails: BTreeMap::from([(
                "default".to_string(),
                "https://i.ytimg.com/vi/x/default.jpg".to_string(),
            )]),
            channel_title: "Channel".to_string(),
            published_at: None,
            tags: BTreeSet::from(["talk".to_string()]),
            language: Some("en".to_string()),
        })
    }
}

#[derive(Default)]
pub struct MockDownloader {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioDownloader for MockDownloader {
    async fn download(&self, _url: &str, stem: &Path) -> scribe_service::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = stem.with_extension("wav");
        fs_err::write(&path, b"RIFF....WAVE")
            .map_err(|e| ScribeError::Download(e.to_string()))?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct MockObjectStore {
    pub fail: bool,
    pub objects: Mutex<Vec<String>>,
}

impl MockObjectStore {
    fn check(&self) -> scribe_service::Result<()> {
        if self.fail {
            return Err(ScribeError::Storage("AccessDenied".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn bucket(&self) -> String {
        "speech-audio".to_string()
    }

    fn uri_for(&self, key: &str) -> String {
        format!("s3://speech-audio/{}", key)
    }

    async fn upload_file(&self, key: &str, _path: &Path, _content_type: &str) -> scribe_service::Result<()> {
        self.check()?;
        self.objects.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn put_bytes(&self, key: &str, _body: Vec<u8>, _content_type: &str) -> scribe_service::Result<()> {
        self.check()?;
        self.objects.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn signed_url(&self, key: &str, _expires_in: Duration) -> scribe_service::Result<String> {
        Ok(format!("https://speech-audio.s3.amazonaws.com/{}?X-Amz-Signature=abc", key))
    }

    async fn list(&self, max_results: i32) -> scribe_service::Result<Vec<String>> {
        self.check()?;
        let objects = self.objects.lock().unwrap();
        Ok(objects.iter().take(max_results as usize).cloned().collect())
    }

    async fn delete(&self, key: &str) -> scribe_service::Result<()> {
        self.check()?;
        self.objects.lock().unwrap().retain(|k| k != key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSpeechService {
    pub requests: Mutex<Vec<RecognitionRequest>>,
}

#[async_trait]
impl SpeechService for MockSpeechService {
    async fn recognize(&self, request: &RecognitionRequest) -> scribe_service::Result<Vec<RecognitionResult>> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(vec![
            result("Welcome to the show.", 0.0, 1),
            result("Glad to be here.", 65.2, 2),
        ])
    }
}

fn result(transcript: &str, start: f64, speaker: u32) -> RecognitionResult {
    let words = transcript
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| WordInfo {
            word: word.to_string(),
            start_time: start + i as f64 * 0.4,
            end_time: start + i as f64 * 0.4 + 0.3,
            speaker_tag: Some(speaker),
        })
        .collect();

    RecognitionResult {
        alternatives: vec![RecognitionAlternative {
            transcript: transcript.to_string(),
            confidence: 0.9,
            words,
        }],
    }
}

#[derive(Default)]
pub struct MockDocumentIndex {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DocumentIndex for MockDocumentIndex {
    async fn create_by_text(&self, _title: &str, _text: &str) -> scribe_service::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("vec-123".to_string())
    }
}

#[derive(Default)]
pub struct MockDocumentStore {
    pub records: Mutex<Vec<DocumentRecord>>,
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn create_record(&self, record: &DocumentRecord) -> scribe_service::Result<String> {
        self.records.lock().unwrap().push(record.clone());
        Ok("db-456".to_string())
    }
}

/// Test doubles behind an [`AppState`], kept around for call-count assertions
pub struct Harness {
    pub state: AppState,
    pub downloader: Arc<MockDownloader>,
    pub store: Arc<MockObjectStore>,
    pub speech: Arc<MockSpeechService>,
    pub index: Arc<MockDocumentIndex>,
    pub records: Arc<MockDocumentStore>,
}

pub fn harness(captions: Option<Vec<CaptionCue>>, store: MockObjectStore) -> Harness {
    let downloader = Arc::new(MockDownloader::default());
    let store = Arc::new(store);
    let speech = Arc::new(MockSpeechService::default());
    let index = Arc::new(MockDocumentIndex::default());
    let records = Arc::new(MockDocumentStore::default());

    let resolver = TranscriptResolver::new(
        NativeTranscriptFetcher::new(Arc::new(MockCaptionSource { cues: captions })),
        AudioAcquirer::new(downloader.clone(), store.clone()),
        Transcriber::new(speech.clone(), TranscriberSettings::default()),
    );

    let state = AppState {
        resolver: Arc::new(resolver),
        metadata: Arc::new(MetadataFetcher::new(Arc::new(MockMetadataSource))),
        store: store.clone(),
        indexer: Arc::new(DocumentIndexer::new(index.clone(), records.clone())),
        shutdown: CancellationToken::new(),
        request_timeout: Duration::from_secs(30),
    };

    Harness {
        state,
        downloader,
        store,
        speech,
        index,
        records,
    }
}

pub fn native_cues() -> Vec<CaptionCue> {
    vec![
        CaptionCue { text: "hello there".to_string(), start: 0.5, duration: 2.0 },
        CaptionCue { text: "general kenobi".to_string(), start: 2.5, duration: 1.5 },
    ]
}
