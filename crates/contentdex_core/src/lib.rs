//! Content-addressed file catalog.
//! This crate owns every catalog invariant: one record per fingerprint,
//! idempotent scans, and repositories that may share a path.

pub mod config;
pub mod db;
pub mod fingerprint;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod traverse;

pub use config::{default_catalog_path, default_log_dir, CatalogConfig, ConfigError, TableNames};
pub use fingerprint::{DigestAlgorithm, FingerprintError, FingerprintResult, Fingerprinter};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::content::{ContentId, ContentIdError, ContentRecord, MetadataRef};
pub use model::location::Location;
pub use model::repository::{RepoId, Repository};
pub use service::ingest_service::{
    CancellationToken, IngestError, IngestResult, IngestService, ScanOptions, ScanReport,
    SkipCause, SkippedFile,
};
pub use store::catalog_store::{
    CatalogQuery, CatalogStore, RecordOutcome, SqliteCatalogStore, StoreError, StoreResult,
};
pub use traverse::{
    accept_all, extension_filter, FilterScope, PathPredicate, TraversalEvent, TraversalFailure,
    TraverseError, Traverser,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
