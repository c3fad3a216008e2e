use super::append_path_segments;
use crate::tools::traits::{Tool, ToolFuture};
use crate::tools::types::{ParamType, ParameterSchema};
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value, json};

pub const DEFAULT_DICTIONARY_BASE_URL: &str = "https://api.dictionaryapi.dev";

/// Checks an online dictionary for the candidate word.
pub struct KnownWordTool {
    client: Client,
    base_url: String,
}

impl KnownWordTool {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn is_known_word(&self, candidate: &str) -> anyhow::Result<bool> {
        let url = append_path_segments(&self.base_url, &["api", "v2", "entries", "en", candidate])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("dictionary lookup for '{candidate}' failed"))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "unexpected status {status} for word '{candidate}': {}",
                    crate::llm::sanitize_api_error(&body)
                )
            }
        }
    }
}

impl Tool for KnownWordTool {
    fn name(&self) -> &str {
        "get_is_known_word"
    }

    fn description(&self) -> &str {
        "Checks the online dictionary to determine if the candidate is an actual word."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("candidate", ParamType::String, "The candidate word")
    }

    fn execute<'a>(&'a self, args: &'a Map<String, Value>) -> ToolFuture<'a> {
        Box::pin(async move {
            let candidate = args
                .get("candidate")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Missing 'candidate' parameter"))?;
            let known = self.is_known_word(candidate).await?;
            tracing::debug!(candidate, known, "Dictionary lookup");
            Ok(json!(known))
        })
    }
}
