//! Execution of verified queries against a dataverse.

use crate::asterixdb::client::AsterixClient;
use crate::error::{NlqError, Result};
use crate::identifier::validate_dataverse_name;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::info;

/// Runs a query string in the context of a dataverse.
///
/// Only the pipeline calls this, and only with the text of a package that
/// passed verification.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, dataverse_name: &str) -> Result<Vec<Value>>;
}

/// `USE <dataverse>;` followed by the query.
pub fn scoped_statement(query: &str, dataverse_name: &str) -> Result<String> {
    let dataverse_name = validate_dataverse_name(dataverse_name)?;
    Ok(format!("USE {};\n{}", dataverse_name, query.trim()))
}

pub struct AsterixExecutor {
    client: AsterixClient,
}

impl AsterixExecutor {
    pub fn new(client: AsterixClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryExecutor for AsterixExecutor {
    async fn execute(&self, query: &str, dataverse_name: &str) -> Result<Vec<Value>> {
        let start_time = Instant::now();
        let statement = scoped_statement(query, dataverse_name)?;
        info!("Executing query in dataverse {}", dataverse_name);

        let rows = self
            .client
            .run_statement(&statement)
            .await
            .map_err(|e| NlqError::QueryExecution {
                message: e.message,
                status: e.status,
                body: e.body,
            })?;

        info!(
            "Query completed in {}ms, returned {} rows",
            start_time.elapsed().as_millis(),
            rows.len()
        );
        Ok(rows)
    }
}
