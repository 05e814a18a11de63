use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{DocumentRecord, DocumentStore};
use crate::{Result, ScribeError};

/// Firestore collection written through the REST API
pub struct FirestoreDocumentStore {
    client: Client,
    base_url: String,
    project_id: String,
    collection: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    /// `projects/{p}/databases/(default)/documents/{collection}/{id}`
    name: String,
}

impl FirestoreDocumentStore {
    pub fn new(
        project_id: impl Into<String>,
        collection: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: project_id.into(),
            collection: collection.into(),
            access_token: access_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url, self.project_id, self.collection
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn create_record(&self, record: &DocumentRecord) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": record_fields(record) }))
            .send()
            .await
            .map_err(|e| ScribeError::Storage(format!("document store request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, collection = %self.collection, "Firestore rejected record");
            return Err(ScribeError::Storage(format!("HTTP {}: {}", status, body)));
        }

        let created: CreatedRecord = response
            .json()
            .await
            .map_err(|e| ScribeError::Storage(format!("unreadable store response: {}", e)))?;

        created
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ScribeError::Storage(format!("no record id in {}", created.name)))
    }
}

fn record_fields(record: &DocumentRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("title".into(), json!({ "stringValue": record.title }));
    fields.insert("content".into(), json!({ "stringValue": record.content }));
    fields.insert(
        "metadata".into(),
        json!({ "mapValue": { "fields": map_fields(&record.metadata) } }),
    );
    fields.insert("llm_processed".into(), optional_string(record.llm_processed.as_deref()));
    fields.insert("user_id".into(), optional_string(record.user_id.as_deref()));
    fields.insert(
        "timestamp".into(),
        json!({ "timestampValue": record.timestamp.to_rfc3339() }),
    );
    fields.insert("vector_id".into(), json!({ "stringValue": record.vector_id }));
    fields
}

fn optional_string(value: Option<&str>) -> Value {
    match value {
        Some(s) => json!({ "stringValue": s }),
        None => json!({ "nullValue": null }),
    }
}

fn map_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), firestore_value(value)))
        .collect()
}

/// Typed Firestore value for an arbitrary JSON value
fn firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        // integers travel as strings
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(firestore_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": map_fields(map) } }),
    }
}
