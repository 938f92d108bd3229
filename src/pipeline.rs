//! Query Pipeline
//!
//! metadata fetch → generation → packaging → verification → execution.
//! Single shot: the first fault aborts, a rejected candidate never reaches
//! the executor.

use crate::asterixdb::{AsterixClient, AsterixExecutor, AsterixMetadataProvider, MetadataProvider, QueryExecutor};
use crate::config::Config;
use crate::error::{NlqError, Result};
use crate::identifier::validate_dataverse_name;
use crate::llm::{LlmQueryGenerator, QueryGenerator};
use crate::metadata::DatasetMetadata;
use crate::packager::{QueryPackage, QueryPackager};
use crate::verifier::{SafetyVerifier, VerificationResult};
use serde_json::Value;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bounds for the three network-bound steps.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTimeouts {
    pub metadata: Duration,
    pub generation: Duration,
    pub execution: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(30),
            generation: Duration::from_secs(120),
            execution: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Executed {
        package: QueryPackage,
        verification: VerificationResult,
        rows: Vec<Value>,
    },
    /// The candidate failed verification; nothing was executed.
    Rejected {
        package: QueryPackage,
        verification: VerificationResult,
    },
}

impl PipelineOutcome {
    pub fn package(&self) -> &QueryPackage {
        match self {
            PipelineOutcome::Executed { package, .. } | PipelineOutcome::Rejected { package, .. } => package,
        }
    }

    pub fn verification(&self) -> &VerificationResult {
        match self {
            PipelineOutcome::Executed { verification, .. }
            | PipelineOutcome::Rejected { verification, .. } => verification,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, PipelineOutcome::Executed { .. })
    }

    /// Rows on success, `NlqError::Verification` for a rejected candidate.
    pub fn into_rows(self) -> Result<Vec<Value>> {
        match self {
            PipelineOutcome::Executed { rows, .. } => Ok(rows),
            PipelineOutcome::Rejected { verification, .. } => Err(NlqError::Verification(verification)),
        }
    }
}

pub struct NlqPipeline {
    metadata_provider: Arc<dyn MetadataProvider>,
    /// Absent for catalog-only pipelines (`verify_query`, `fetch_metadata`).
    generator: Option<Arc<dyn QueryGenerator>>,
    executor: Arc<dyn QueryExecutor>,
    packager: QueryPackager,
    verifier: SafetyVerifier,
    timeouts: PipelineTimeouts,
    narrow_schema: bool,
}

impl NlqPipeline {
    pub fn new(
        metadata_provider: Arc<dyn MetadataProvider>,
        generator: Arc<dyn QueryGenerator>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            generator: Some(generator),
            ..Self::without_generator(metadata_provider, executor)
        }
    }

    /// Wire the AsterixDB collaborators and the configured model backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = AsterixClient::new(config.asterixdb_url.clone(), config.request_timeout)?;
        let generator = LlmQueryGenerator::from_config(config)?;

        Ok(Self::new(
            Arc::new(AsterixMetadataProvider::new(client.clone())),
            Arc::new(generator),
            Arc::new(AsterixExecutor::new(client)),
        )
        .with_timeouts(PipelineTimeouts {
            metadata: config.request_timeout,
            generation: config.generation_timeout,
            execution: config.request_timeout,
        })
        .with_narrow_schema(config.narrow_schema))
    }

    /// Pipeline without a model backend. `run` and `prepare` fail with a
    /// configuration error; `verify_query` and `fetch_metadata` work.
    pub fn without_generator(
        metadata_provider: Arc<dyn MetadataProvider>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            metadata_provider,
            generator: None,
            executor,
            packager: QueryPackager::new(),
            verifier: SafetyVerifier::new(),
            timeouts: PipelineTimeouts::default(),
            narrow_schema: false,
        }
    }

    /// AsterixDB collaborators only; needs no backend credentials.
    pub fn catalog_only(config: &Config) -> Result<Self> {
        let client = AsterixClient::new(config.asterixdb_url.clone(), config.request_timeout)?;

        Ok(Self::without_generator(
            Arc::new(AsterixMetadataProvider::new(client.clone())),
            Arc::new(AsterixExecutor::new(client)),
        )
        .with_timeouts(PipelineTimeouts {
            metadata: config.request_timeout,
            generation: config.generation_timeout,
            execution: config.request_timeout,
        }))
    }

    pub fn with_timeouts(mut self, timeouts: PipelineTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_narrow_schema(mut self, narrow_schema: bool) -> Self {
        self.narrow_schema = narrow_schema;
        self
    }

    /// Full cycle. `Ok(Rejected)` is an expected outcome, `Err` is a fault.
    pub async fn run(
        &self,
        dataverse_name: &str,
        natural_query: &str,
        limit: NonZeroU32,
    ) -> Result<PipelineOutcome> {
        let (package, verification) = self.prepare(dataverse_name, natural_query, limit).await?;

        if !verification.passed {
            warn!(
                package = %package.id(),
                "Skipping execution: candidate failed {:?}",
                verification.failed_checks()
            );
            return Ok(PipelineOutcome::Rejected { package, verification });
        }

        info!(package = %package.id(), "Step 5: executing verified query");
        let rows = bounded(
            self.timeouts.execution,
            self.executor.execute(package.query(), package.dataverse_name()),
            || NlqError::execution(format!("execution timed out after {:?}", self.timeouts.execution)),
        )
        .await?;

        Ok(PipelineOutcome::Executed {
            package,
            verification,
            rows,
        })
    }

    /// Everything up to and including verification, without execution (dry run).
    pub async fn prepare(
        &self,
        dataverse_name: &str,
        natural_query: &str,
        limit: NonZeroU32,
    ) -> Result<(QueryPackage, VerificationResult)> {
        validate_dataverse_name(dataverse_name)?;
        let generator = self.generator()?;

        info!("Step 1: fetching metadata for dataverse {}", dataverse_name);
        let metadata = self.fetch_metadata(dataverse_name).await?;

        info!("Step 2: generating query");
        let context = self.schema_context(generator, natural_query, &metadata).await?;
        let generated = bounded(
            self.timeouts.generation,
            generator.generate_query(natural_query, &context, limit),
            || NlqError::generation(format!("generation timed out after {:?}", self.timeouts.generation)),
        )
        .await?;

        info!("Step 3: packaging");
        let package = self
            .packager
            .package(dataverse_name, natural_query, &generated, metadata, limit);

        info!(package = %package.id(), "Step 4: verifying");
        let verification = self.verifier.verify(&package);
        Ok((package, verification))
    }

    /// Package and verify a caller-supplied query against fresh metadata.
    /// Never executes.
    pub async fn verify_query(
        &self,
        dataverse_name: &str,
        query: &str,
        limit: NonZeroU32,
    ) -> Result<(QueryPackage, VerificationResult)> {
        validate_dataverse_name(dataverse_name)?;
        let metadata = self.fetch_metadata(dataverse_name).await?;
        let package = self.packager.package(dataverse_name, "", query, metadata, limit);
        let verification = self.verifier.verify(&package);
        Ok((package, verification))
    }

    pub async fn fetch_metadata(&self, dataverse_name: &str) -> Result<Vec<DatasetMetadata>> {
        bounded(
            self.timeouts.metadata,
            self.metadata_provider.fetch_metadata(dataverse_name),
            || {
                NlqError::MetadataFetch(format!(
                    "metadata fetch for '{}' timed out after {:?}",
                    dataverse_name, self.timeouts.metadata
                ))
            },
        )
        .await
    }

    fn generator(&self) -> Result<&dyn QueryGenerator> {
        self.generator
            .as_deref()
            .ok_or_else(|| NlqError::Config("no query generator configured for this pipeline".to_string()))
    }

    /// Schema handed to the generator. The package always keeps the full set.
    async fn schema_context(
        &self,
        generator: &dyn QueryGenerator,
        natural_query: &str,
        metadata: &[DatasetMetadata],
    ) -> Result<Vec<DatasetMetadata>> {
        if !self.narrow_schema || metadata.len() < 2 {
            return Ok(metadata.to_vec());
        }

        let picked = bounded(
            self.timeouts.generation,
            generator.infer_dataset(natural_query, metadata),
            || NlqError::generation(format!("dataset inference timed out after {:?}", self.timeouts.generation)),
        )
        .await?;

        match picked.and_then(|name| metadata.iter().find(|d| d.dataset_name == name)) {
            Some(dataset) => {
                info!("Narrowed schema context to dataset {}", dataset.dataset_name);
                Ok(vec![dataset.clone()])
            }
            None => {
                warn!("Dataset inference inconclusive, using all {} datasets", metadata.len());
                Ok(metadata.to_vec())
            }
        }
    }
}

async fn bounded<T, F>(limit: Duration, fut: F, on_timeout: impl FnOnce() -> NlqError) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
