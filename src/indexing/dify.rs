use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::DocumentIndex;
use crate::{Result, ScribeError};

/// Dify knowledge-base dataset fed through the create-by-text endpoint
pub struct DifyDatasetIndex {
    client: Client,
    base_url: String,
    dataset_id: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateByTextRequest<'a> {
    name: &'a str,
    text: &'a str,
    indexing_technique: &'static str,
    process_rule: ProcessRule,
}

#[derive(Debug, Serialize)]
struct ProcessRule {
    mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreateByTextResponse {
    document: CreatedDocument,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    id: String,
}

impl DifyDatasetIndex {
    pub fn new(
        base_url: impl Into<String>,
        dataset_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dataset_id: dataset_id.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/datasets/{}/document/create-by-text",
            self.base_url, self.dataset_id
        )
    }
}

#[async_trait]
impl DocumentIndex for DifyDatasetIndex {
    async fn create_by_text(&self, title: &str, text: &str) -> Result<String> {
        let body = CreateByTextRequest {
            name: title,
            text,
            indexing_technique: "high_quality",
            process_rule: ProcessRule { mode: "automatic" },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScribeError::Indexing(format!("index request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, dataset = %self.dataset_id, "Dify rejected document");
            return Err(ScribeError::Indexing(format!("HTTP {}: {}", status, body)));
        }

        let created: CreateByTextResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::Indexing(format!("unreadable index response: {}", e)))?;

        Ok(created.document.id)
    }
}
