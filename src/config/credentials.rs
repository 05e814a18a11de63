use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// API keys read from a flat JSON file, looked up by name
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    entries: Map<String, Value>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read credentials file")?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Map<String, Value> = serde_json::from_str(content)
            .context("Credentials file must be a JSON object")?;
        Ok(Self { entries })
    }

    /// String value stored under `name`, if any
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
