use crate::config::{Config, LlmBackendKind};
use crate::error::{NlqError, Result};
use crate::llm::prompt::{
    build_dataset_inference_prompt, build_generation_prompt, clean_generated_query, match_dataset,
};
use crate::llm::{CompletionBackend, HuggingFaceBackend, OllamaBackend, QueryGenerator};
use crate::metadata::DatasetMetadata;
use async_trait::async_trait;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LlmQueryGenerator {
    backend: Arc<dyn CompletionBackend>,
}

impl LlmQueryGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Build the configured backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn CompletionBackend> = match config.backend {
            LlmBackendKind::HuggingFace => {
                let api_key = config.huggingface_api_key.clone().ok_or_else(|| {
                    NlqError::Config(
                        "HUGGINGFACE_API_KEY is required when LLM_BACKEND is huggingface".to_string(),
                    )
                })?;
                Arc::new(HuggingFaceBackend::new(
                    config.huggingface_endpoint.clone(),
                    api_key,
                    config.generation_timeout,
                )?)
            }
            LlmBackendKind::Ollama => Arc::new(OllamaBackend::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
                config.generation_timeout,
            )?),
        };
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate_query(
        &self,
        natural_query: &str,
        metadata: &[DatasetMetadata],
        limit: NonZeroU32,
    ) -> Result<String> {
        let prompt = build_generation_prompt(natural_query, metadata, limit);
        debug!("Generation prompt:\n{}", prompt);

        let raw = self.backend.complete(&prompt).await?;
        let query = clean_generated_query(&raw);
        if query.is_empty() {
            return Err(NlqError::Generation {
                message: format!("{} returned an empty query", self.backend.name()),
                status: None,
                body: Some(raw),
            });
        }

        info!("Generated query via {}: {}", self.backend.name(), query);
        Ok(query)
    }

    async fn infer_dataset(
        &self,
        natural_query: &str,
        metadata: &[DatasetMetadata],
    ) -> Result<Option<String>> {
        if metadata.is_empty() {
            return Ok(None);
        }
        let prompt = build_dataset_inference_prompt(natural_query, metadata);
        let answer = self.backend.complete(&prompt).await?;

        match match_dataset(&answer, metadata) {
            Some(dataset) => {
                info!("Model picked dataset {}", dataset.dataset_name);
                Ok(Some(dataset.dataset_name.clone()))
            }
            None => {
                warn!("Model answer names no known dataset: {}", answer.trim());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedBackend {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn dataset(name: &str) -> DatasetMetadata {
        DatasetMetadata {
            dataset_name: name.to_string(),
            dataverse_name: "TinySocial".to_string(),
            primary_key: vec!["id".to_string()],
            partitioning_key: vec!["id".to_string()],
            dataset_type: "INTERNAL".to_string(),
            storage_format: "ROW".to_string(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn limit() -> NonZeroU32 {
        NonZeroU32::new(50).unwrap()
    }

    #[tokio::test]
    async fn test_generate_cleans_reply() {
        let backend = ScriptedBackend::new("```sql\nSELECT u.name FROM Users u LIMIT 50;\n```");
        let generator = LlmQueryGenerator::new(backend.clone());

        let query = generator
            .generate_query("names of users", &[dataset("Users")], limit())
            .await
            .unwrap();
        assert_eq!(query, "SELECT u.name FROM Users u LIMIT 50;");

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("DATASET Users"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_generation_fault() {
        let generator = LlmQueryGenerator::new(ScriptedBackend::new("  \n "));
        let err = generator
            .generate_query("names of users", &[dataset("Users")], limit())
            .await
            .unwrap_err();
        assert!(matches!(err, NlqError::Generation { .. }));
        assert!(err.to_string().contains("empty query"));
    }

    #[tokio::test]
    async fn test_infer_dataset() {
        let generator = LlmQueryGenerator::new(ScriptedBackend::new("The relevant dataset is Reviews"));
        let picked = generator
            .infer_dataset("review counts", &[dataset("Businesses"), dataset("Reviews")])
            .await
            .unwrap();
        assert_eq!(picked.as_deref(), Some("Reviews"));

        let generator = LlmQueryGenerator::new(ScriptedBackend::new("no idea"));
        let picked = generator
            .infer_dataset("review counts", &[dataset("Businesses")])
            .await
            .unwrap();
        assert!(picked.is_none());
    }

    #[test]
    fn test_from_config_selects_backend() {
        let config = Config {
            backend: LlmBackendKind::Ollama,
            ..Config::default()
        };
        let generator = LlmQueryGenerator::from_config(&config).unwrap();
        assert_eq!(generator.backend_name(), "ollama");
    }

    #[test]
    fn test_from_config_requires_huggingface_key() {
        let err = LlmQueryGenerator::from_config(&Config::default()).err().unwrap();
        assert!(matches!(err, NlqError::Config(_)));
        assert!(err.to_string().contains("HUGGINGFACE_API_KEY"));
    }
}
