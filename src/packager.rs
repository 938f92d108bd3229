//! Query Packager
//!
//! Bundles a generated query with its provenance and result-size policy.

use crate::metadata::DatasetMetadata;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Immutable bundle handed to the verifier and, on PASS, to the executor.
///
/// Fields are read-only after construction; there is no way to swap the
/// query text of a package that has already been verified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPackage {
    id: Uuid,
    natural_query: String,
    query: String,
    dataverse_name: String,
    metadata: Vec<DatasetMetadata>,
    limit: NonZeroU32,
    timestamp: DateTime<Utc>,
}

impl QueryPackage {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn natural_query(&self) -> &str {
        &self.natural_query
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn dataverse_name(&self) -> &str {
        &self.dataverse_name
    }

    pub fn metadata(&self) -> &[DatasetMetadata] {
        &self.metadata
    }

    pub fn limit(&self) -> NonZeroU32 {
        self.limit
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPackager;

impl QueryPackager {
    pub fn new() -> Self {
        Self
    }

    /// Build a package stamped with the current time.
    ///
    /// Never fails: an empty dataverse or empty metadata is carried as-is
    /// and rejected later by the verifier.
    pub fn package(
        &self,
        dataverse_name: &str,
        natural_query: &str,
        generated_query: &str,
        metadata: Vec<DatasetMetadata>,
        limit: NonZeroU32,
    ) -> QueryPackage {
        self.package_at(
            dataverse_name,
            natural_query,
            generated_query,
            metadata,
            limit,
            Utc::now(),
        )
    }

    pub fn package_at(
        &self,
        dataverse_name: &str,
        natural_query: &str,
        generated_query: &str,
        metadata: Vec<DatasetMetadata>,
        limit: NonZeroU32,
        timestamp: DateTime<Utc>,
    ) -> QueryPackage {
        QueryPackage {
            id: Uuid::new_v4(),
            natural_query: natural_query.to_string(),
            query: generated_query.to_string(),
            dataverse_name: dataverse_name.to_string(),
            metadata,
            limit,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limit(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_package_carries_inputs() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 2, 10, 30, 0).unwrap();
        let pkg = QueryPackager::new().package_at(
            "TinySocial",
            "Get the names of users older than 30",
            "SELECT u.name FROM Users u WHERE u.age > 30 LIMIT 50",
            Vec::new(),
            limit(50),
            ts,
        );

        assert_eq!(pkg.dataverse_name(), "TinySocial");
        assert_eq!(pkg.natural_query(), "Get the names of users older than 30");
        assert!(pkg.query().ends_with("LIMIT 50"));
        assert!(pkg.metadata().is_empty());
        assert_eq!(pkg.limit().get(), 50);
        assert_eq!(pkg.timestamp(), ts);
    }

    #[test]
    fn test_package_stamps_current_time() {
        let before = Utc::now();
        let pkg = QueryPackager::new().package("dv", "q", "SELECT 1", Vec::new(), limit(1));
        assert!(pkg.timestamp() >= before);
        assert!(pkg.timestamp() <= Utc::now());
    }

    #[test]
    fn test_each_package_gets_its_own_id() {
        let packager = QueryPackager::new();
        let a = packager.package("dv", "q", "SELECT 1", Vec::new(), limit(1));
        let b = packager.package("dv", "q", "SELECT 1", Vec::new(), limit(1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_empty_inputs_do_not_fail_construction() {
        let pkg = QueryPackager::new().package("", "", "", Vec::new(), limit(10));
        assert_eq!(pkg.dataverse_name(), "");
        assert_eq!(pkg.query(), "");
    }
}
