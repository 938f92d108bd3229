//! Natural-language questions to verified SQL++ over AsterixDB.

pub mod asterixdb;
pub mod config;
pub mod error;
pub mod identifier;
pub mod llm;
pub mod metadata;
pub mod packager;
pub mod pipeline;
pub mod verifier;

pub use config::{Config, LlmBackendKind};
pub use error::{NlqError, Result};
pub use metadata::{DatasetMetadata, IndexMetadata, SchemaField};
pub use packager::{QueryPackage, QueryPackager};
pub use pipeline::{NlqPipeline, PipelineOutcome, PipelineTimeouts};
pub use verifier::{CheckOutcome, SafetyVerifier, VerificationCheck, VerificationResult};
