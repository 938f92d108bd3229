//! Ollama backend (`/api/generate`, non-streaming).

use crate::error::{NlqError, Result};
use crate::llm::CompletionBackend;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NlqError::Config(format!("Failed to create HTTP client for Ollama: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("Calling Ollama model {} at {}", self.model, url);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| NlqError::generation(format!("Ollama API call failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NlqError::generation(format!("Failed to read Ollama response: {}", e)))?;

        if !status.is_success() {
            error!("Ollama API error: {} - {}", status, text);
            return Err(NlqError::Generation {
                message: format!("Ollama API error: {}", status),
                status: Some(status.as_u16()),
                body: Some(text),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| NlqError::Generation {
            message: format!("Failed to parse Ollama response: {}", e),
            status: Some(status.as_u16()),
            body: Some(text.clone()),
        })?;

        if let Some(err) = parsed.error {
            return Err(NlqError::Generation {
                message: format!("Ollama error: {}", err),
                status: Some(status.as_u16()),
                body: Some(text),
            });
        }

        Ok(parsed.response.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_non_streaming() {
        let body = serde_json::to_value(GenerateRequest {
            model: "sqlcoder",
            prompt: "p",
            stream: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "sqlcoder", "prompt": "p", "stream": false}));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let backend = OllamaBackend::new("http://localhost:11434/", "sqlcoder", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url, "http://localhost:11434");
    }
}
