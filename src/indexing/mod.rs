pub mod dify;
pub mod firestore;

pub use dify::DifyDatasetIndex;
pub use firestore::FirestoreDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{Result, ScribeError};

/// Free-text document submitted for indexing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Free-form marker set by callers that post-processed the text
    #[serde(default)]
    pub llm_processed: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Record persisted to the document store once indexing succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub llm_processed: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Id assigned by the index
    pub vector_id: String,
}

/// Stored record together with the id the document store assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(flatten)]
    pub record: DocumentRecord,
    pub db_id: String,
}

/// Vector/search index accepting raw text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Index `text` under `title`, returning the index's document id
    async fn create_by_text(&self, title: &str, text: &str) -> Result<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist `record`, returning the generated record id
    async fn create_record(&self, record: &DocumentRecord) -> Result<String>;
}

pub struct DocumentIndexer {
    index: Arc<dyn DocumentIndex>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentIndexer {
    pub fn new(index: Arc<dyn DocumentIndex>, store: Arc<dyn DocumentStore>) -> Self {
        Self { index, store }
    }

    /// Index the document, then record it.
    ///
    /// Nothing is written to the store when indexing fails.
    pub async fn create_document(&self, document: NewDocument) -> Result<IndexedDocument> {
        if document.title.trim().is_empty() {
            return Err(ScribeError::InvalidInput("No title provided".to_string()));
        }
        if document.content.trim().is_empty() {
            return Err(ScribeError::InvalidInput("No content provided".to_string()));
        }

        let vector_id = self
            .index
            .create_by_text(&document.title, &document.content)
            .await?;
        tracing::info!(vector_id = %vector_id, title = %document.title, "Document indexed");

        let record = DocumentRecord {
            title: document.title,
            content: document.content,
            metadata: document.metadata,
            llm_processed: document.llm_processed,
            user_id: document.user_id,
            timestamp: Utc::now(),
            vector_id: vector_id.clone(),
        };
        let db_id = self.store.create_record(&record).await?;
        tracing::info!(db_id = %db_id, vector_id = %vector_id, "Document record stored");

        Ok(IndexedDocument { record, db_id })
    }
}
