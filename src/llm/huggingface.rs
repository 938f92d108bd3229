//! Hugging Face Inference API backend.

use crate::error::{NlqError, Result};
use crate::llm::CompletionBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<GeneratedText>),
    Single(GeneratedText),
}

pub struct HuggingFaceBackend {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HuggingFaceBackend {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NlqError::Config(format!("Failed to create HTTP client for Hugging Face: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for HuggingFaceBackend {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {"return_full_text": false}
        });
        debug!("Calling Hugging Face endpoint {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| NlqError::generation(format!("Hugging Face API call failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NlqError::generation(format!("Failed to read Hugging Face response: {}", e)))?;

        if !status.is_success() {
            error!("Hugging Face API error: {} - {}", status, text);
            return Err(NlqError::Generation {
                message: format!("Hugging Face API error: {}", status),
                status: Some(status.as_u16()),
                body: Some(text),
            });
        }

        let parsed: InferenceResponse = serde_json::from_str(&text).map_err(|e| NlqError::Generation {
            message: format!("Failed to parse Hugging Face response: {}", e),
            status: Some(status.as_u16()),
            body: Some(text.clone()),
        })?;

        let first = match parsed {
            InferenceResponse::Batch(items) => items.into_iter().next(),
            InferenceResponse::Single(item) => Some(item),
        };

        match first {
            Some(GeneratedText { error: Some(err), .. }) => {
                error!("Hugging Face reported an error: {}", err);
                Err(NlqError::Generation {
                    message: format!("Hugging Face error: {}", err),
                    status: Some(status.as_u16()),
                    body: Some(text),
                })
            }
            Some(GeneratedText { generated_text, .. }) => Ok(generated_text.unwrap_or_default()),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_and_single_shapes() {
        let batch: InferenceResponse =
            serde_json::from_str(r#"[{"generated_text": "SELECT 1"}]"#).unwrap();
        assert!(matches!(batch, InferenceResponse::Batch(ref v) if v[0].generated_text.as_deref() == Some("SELECT 1")));

        let single: InferenceResponse =
            serde_json::from_str(r#"{"generated_text": "SELECT 2"}"#).unwrap();
        assert!(matches!(single, InferenceResponse::Single(ref g) if g.generated_text.as_deref() == Some("SELECT 2")));
    }
}
