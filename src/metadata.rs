//! Dataverse schema metadata
//!
//! Typed snapshot of the AsterixDB system catalog for one dataverse, plus
//! extraction from raw catalog rows and rendering into prompt context.

use crate::error::{NlqError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub nullable: bool,
    pub missable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub index_name: String,
    pub dataset_name: String,
    pub dataverse_name: String,
    pub index_type: String,
    pub search_key: Vec<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub dataverse_name: String,
    pub primary_key: Vec<String>,
    pub partitioning_key: Vec<String>,
    pub dataset_type: String,
    pub storage_format: String,
    pub fields: Vec<SchemaField>,
    pub indexes: Vec<IndexMetadata>,
}

impl DatasetMetadata {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// DDL-like rendering used as schema context in generation prompts.
    pub fn to_ddl(&self) -> String {
        let mut out = format!(
            "DATASET {} -- type: {}, format: {}\n",
            self.dataset_name, self.dataset_type, self.storage_format
        );
        if !self.primary_key.is_empty() {
            out.push_str(&format!("  PRIMARY KEY ({})\n", self.primary_key.join(", ")));
        }
        for field in &self.fields {
            let mut line = format!("  {}: {}", field.name, field.field_type);
            if !field.nullable && !field.missable {
                line.push_str(" NOT NULL");
            } else {
                if field.nullable {
                    line.push_str(" NULLABLE");
                }
                if field.missable {
                    line.push_str(" MISSABLE");
                }
            }
            out.push_str(&line);
            out.push('\n');
        }
        for index in self.indexes.iter().filter(|i| !i.is_primary) {
            out.push_str(&format!(
                "  INDEX {} {} ({})\n",
                index.index_name,
                index.index_type,
                index.search_key.join(", ")
            ));
        }
        out
    }
}

/// Render every dataset of a dataverse as one schema block.
pub fn render_schema(metadata: &[DatasetMetadata]) -> String {
    metadata
        .iter()
        .map(DatasetMetadata::to_ddl)
        .collect::<Vec<_>>()
        .join("\n")
}

// Raw catalog row shapes. Each row of the catalog statement is wrapped in `$1`.

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "$1")]
    entry: Option<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "Dataset")]
    dataset: Option<RawDataset>,
    #[serde(rename = "Datatype")]
    datatype: Option<RawDatatype>,
    #[serde(rename = "Indexes")]
    indexes: Option<Vec<RawIndex>>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    #[serde(rename = "DatasetName")]
    dataset_name: String,
    #[serde(rename = "DataverseName")]
    dataverse_name: String,
    #[serde(rename = "DatasetType", default)]
    dataset_type: Option<String>,
    #[serde(rename = "InternalDetails", default)]
    internal_details: Option<RawInternalDetails>,
    #[serde(rename = "DatasetFormat", default)]
    dataset_format: Option<RawDatasetFormat>,
}

#[derive(Debug, Deserialize)]
struct RawInternalDetails {
    #[serde(rename = "PrimaryKey", default)]
    primary_key: Value,
    #[serde(rename = "PartitioningKey", default)]
    partitioning_key: Value,
}

#[derive(Debug, Deserialize)]
struct RawDatasetFormat {
    #[serde(rename = "Format", default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDatatype {
    #[serde(rename = "Derived", default)]
    derived: Option<RawDerived>,
}

#[derive(Debug, Deserialize)]
struct RawDerived {
    #[serde(rename = "Record", default)]
    record: Option<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Fields", default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "FieldName")]
    field_name: String,
    #[serde(rename = "FieldType", default)]
    field_type: Value,
    #[serde(rename = "IsNullable", default)]
    is_nullable: bool,
    #[serde(rename = "IsMissable", default)]
    is_missable: bool,
}

#[derive(Debug, Deserialize)]
struct RawIndex {
    #[serde(rename = "IndexName")]
    index_name: String,
    #[serde(rename = "DatasetName")]
    dataset_name: String,
    #[serde(rename = "DataverseName")]
    dataverse_name: String,
    #[serde(rename = "IndexStructure", default)]
    index_structure: Option<String>,
    #[serde(rename = "SearchKey", default)]
    search_key: Value,
    #[serde(rename = "IsPrimary", default)]
    is_primary: bool,
}

/// Convert the `results` array of the catalog statement into typed metadata.
pub fn extract_metadata(rows: &[Value]) -> Result<Vec<DatasetMetadata>> {
    rows.iter().enumerate().map(|(i, row)| extract_row(i, row)).collect()
}

fn extract_row(position: usize, row: &Value) -> Result<DatasetMetadata> {
    let row: CatalogRow = serde_json::from_value(row.clone()).map_err(|e| {
        NlqError::MetadataFetch(format!("Malformed catalog row {}: {}", position, e))
    })?;
    let entry = row.entry.ok_or_else(|| {
        NlqError::MetadataFetch(format!("Catalog row {} is missing the $1 key", position))
    })?;

    let (dataset, datatype, indexes) = match (entry.dataset, entry.datatype, entry.indexes) {
        (Some(ds), Some(tp), Some(ix)) => (ds, tp, ix),
        _ => {
            return Err(NlqError::MetadataFetch(format!(
                "Catalog row {} is missing Dataset, Datatype, or Indexes",
                position
            )))
        }
    };

    let (primary_key, partitioning_key) = match &dataset.internal_details {
        Some(details) => (key_paths(&details.primary_key), key_paths(&details.partitioning_key)),
        None => (Vec::new(), Vec::new()),
    };

    let fields = datatype
        .derived
        .and_then(|d| d.record)
        .map(|r| r.fields)
        .unwrap_or_default()
        .into_iter()
        .map(|f| SchemaField {
            name: f.field_name,
            field_type: type_name(&f.field_type),
            nullable: f.is_nullable,
            missable: f.is_missable,
        })
        .collect();

    let indexes = indexes
        .into_iter()
        .map(|ix| IndexMetadata {
            index_name: ix.index_name,
            dataset_name: ix.dataset_name,
            dataverse_name: ix.dataverse_name,
            index_type: ix.index_structure.unwrap_or_else(|| "Unknown".to_string()),
            search_key: key_paths(&ix.search_key),
            is_primary: ix.is_primary,
        })
        .collect();

    Ok(DatasetMetadata {
        dataset_name: dataset.dataset_name,
        dataverse_name: dataset.dataverse_name,
        primary_key,
        partitioning_key,
        dataset_type: dataset.dataset_type.unwrap_or_else(|| "Unknown".to_string()),
        storage_format: dataset
            .dataset_format
            .and_then(|f| f.format)
            .unwrap_or_else(|| "Unknown".to_string()),
        fields,
        indexes,
    })
}

/// Catalog key lists are lists of field paths, e.g. `[["address", "city"], ["id"]]`.
/// Each path is flattened to a dotted name.
fn key_paths(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Array(segments) => {
                    let parts: Vec<&str> = segments.iter().filter_map(Value::as_str).collect();
                    if parts.is_empty() {
                        None
                    } else {
                        Some(parts.join("."))
                    }
                }
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "any".to_string(),
        other => other.to_string(),
    }
}
