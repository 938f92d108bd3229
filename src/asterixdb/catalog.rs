//! Dataverse metadata from the AsterixDB system catalog.

use crate::asterixdb::client::AsterixClient;
use crate::error::{NlqError, Result};
use crate::identifier::validate_dataverse_name;
use crate::metadata::{extract_metadata, DatasetMetadata};
use async_trait::async_trait;
use tracing::info;

/// Source of schema context for one dataverse.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fresh snapshot on every call; nothing is cached.
    async fn fetch_metadata(&self, dataverse_name: &str) -> Result<Vec<DatasetMetadata>>;
}

/// Catalog statement joining `Dataset`, `Datatype` and `Index` for one dataverse.
///
/// The name is allow-list validated before it is placed in the string literal.
pub fn catalog_statement(dataverse_name: &str) -> Result<String> {
    let dataverse_name = validate_dataverse_name(dataverse_name)?;
    Ok(format!(
        r#"USE Metadata;
SELECT {{
    "Dataset": ds,
    "Datatype": tp,
    "Indexes": (
        SELECT VALUE ix
        FROM `Index` ix
        WHERE ix.DataverseName = ds.DataverseName AND ix.DatasetName = ds.DatasetName
    )
}}
FROM `Dataset` ds
JOIN `Datatype` tp
ON ds.DataverseName = tp.DataverseName AND ds.DatatypeName = tp.DatatypeName
WHERE ds.DataverseName = "{}";"#,
        dataverse_name
    ))
}

pub struct AsterixMetadataProvider {
    client: AsterixClient,
}

impl AsterixMetadataProvider {
    pub fn new(client: AsterixClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataProvider for AsterixMetadataProvider {
    async fn fetch_metadata(&self, dataverse_name: &str) -> Result<Vec<DatasetMetadata>> {
        let statement = catalog_statement(dataverse_name)?;
        info!(
            "Fetching catalog metadata for dataverse {} from {}",
            dataverse_name,
            self.client.endpoint()
        );

        let rows = self.client.run_statement(&statement).await.map_err(|e| {
            let mut message = format!("Catalog query for '{}' failed: {}", dataverse_name, e);
            if let Some(body) = e.body {
                message.push_str(&format!(". Response: {}", body));
            }
            NlqError::MetadataFetch(message)
        })?;

        if rows.is_empty() {
            return Err(NlqError::MetadataFetch(format!(
                "No metadata found for dataverse: {}",
                dataverse_name
            )));
        }

        let metadata = extract_metadata(&rows)?;
        info!(
            "Loaded {} datasets for dataverse {}",
            metadata.len(),
            dataverse_name
        );
        Ok(metadata)
    }
}
