//! AsterixDB collaborators: catalog metadata and query execution over the
//! HTTP query service.

pub mod catalog;
pub mod client;
pub mod executor;

pub use catalog::{catalog_statement, AsterixMetadataProvider, MetadataProvider};
pub use client::{AsterixClient, StatementError};
pub use executor::{scoped_statement, AsterixExecutor, QueryExecutor};
