//! Query generation through an external language model.

pub mod generator;
pub mod huggingface;
pub mod ollama;
pub mod prompt;

use crate::error::Result;
use crate::metadata::DatasetMetadata;
use async_trait::async_trait;
use std::num::NonZeroU32;

pub use generator::LlmQueryGenerator;
pub use huggingface::HuggingFaceBackend;
pub use ollama::OllamaBackend;

/// Raw text completion from an inference endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Produces a candidate SQL++ query for a question. The output is untrusted
/// until it passes the safety verifier.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Fails with `NlqError::Generation` on upstream errors or an empty result.
    async fn generate_query(
        &self,
        natural_query: &str,
        metadata: &[DatasetMetadata],
        limit: NonZeroU32,
    ) -> Result<String>;

    /// Name of the dataset the question concerns, if the model can tell.
    async fn infer_dataset(
        &self,
        _natural_query: &str,
        _metadata: &[DatasetMetadata],
    ) -> Result<Option<String>> {
        Ok(None)
    }
}
