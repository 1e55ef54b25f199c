//! Ingest use-case service.
//!
//! # Responsibility
//! - Scan a directory tree into a registered repository.
//! - Own the duplicate-path policy for repository registration.
//!
//! # Invariants
//! - Per-file fingerprint failures are reported, never fatal.
//! - Store errors abort the scan; rows committed before the error stay valid.
//! - Re-running a scan is safe: every recording operation is idempotent.
//! - A scan into an unregistered repository records nothing.
//! - Cancellation stops new work and still returns the partial report.

use crate::config::CatalogConfig;
use crate::fingerprint::{FingerprintError, Fingerprinter};
use crate::model::repository::RepoId;
use crate::store::catalog_store::{CatalogQuery, CatalogStore, StoreError};
use crate::traverse::{
    FilterScope, PathPredicate, TraversalEvent, TraversalFailure, TraverseError, Traverser,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type IngestResult<T> = Result<T, IngestError>;

/// Fatal ingest error.
#[derive(Debug)]
pub enum IngestError {
    /// The scan root cannot be traversed at all.
    Traverse(TraverseError),
    Store(StoreError),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traverse(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Traverse(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<TraverseError> for IngestError {
    fn from(value: TraverseError) -> Self {
        Self::Traverse(value)
    }
}

impl From<StoreError> for IngestError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Shared flag for cancelling a running scan from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Options for one scan.
#[derive(Clone)]
pub struct ScanOptions {
    pub recursive: bool,
    /// `None` accepts every file.
    pub filter: Option<PathPredicate>,
    pub filter_scope: FilterScope,
    pub cancellation: Option<CancellationToken>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            filter: None,
            filter_scope: FilterScope::FilesOnly,
            cancellation: None,
        }
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("recursive", &self.recursive)
            .field("filtered", &self.filter.is_some())
            .field("filter_scope", &self.filter_scope)
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl ScanOptions {
    pub fn with_filter(mut self, predicate: PathPredicate, scope: FilterScope) -> Self {
        self.filter = Some(predicate);
        self.filter_scope = scope;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn traverser(&self) -> Traverser {
        let traverser = Traverser::new().recursive(self.recursive);
        match &self.filter {
            Some(predicate) => traverser.filter(Arc::clone(predicate), self.filter_scope),
            None => traverser,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Why an accepted file was not recorded.
#[derive(Debug)]
pub enum SkipCause {
    Fingerprint(FingerprintError),
    /// The path cannot be stored as UTF-8 text.
    NonUtf8Path,
}

impl Display for SkipCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fingerprint(err) => write!(f, "{err}"),
            Self::NonUtf8Path => f.write_str("path is not valid UTF-8"),
        }
    }
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub cause: SkipCause,
}

/// Aggregate result of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Accepted files, including skipped ones.
    pub files_seen: u64,
    pub content_created: u64,
    pub locations_created: u64,
    pub skipped: Vec<SkippedFile>,
    pub partial_failures: Vec<TraversalFailure>,
    pub cancelled: bool,
}

/// Use-case service composing traverser, fingerprinter and store.
pub struct IngestService<S: CatalogStore> {
    store: S,
    fingerprinter: Fingerprinter,
}

impl<S: CatalogStore> IngestService<S> {
    pub fn new(store: S, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    /// Creates a service fingerprinting with the configured digest.
    pub fn from_config(store: S, config: &CatalogConfig) -> Self {
        Self::new(store, Fingerprinter::new(config.digest_algorithm))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a repository unless its path is already known.
    ///
    /// # Contract
    /// - Returns `None` without inserting when a repository with the same
    ///   path exists and `allow_duplicate_path` is false.
    /// - Otherwise always inserts and returns the new id.
    pub fn add_repository(
        &self,
        path: &str,
        description: &str,
        allow_duplicate_path: bool,
    ) -> IngestResult<Option<RepoId>> {
        let existing = self.store.find_repositories_by_path(path)?;
        if !existing.is_empty() && !allow_duplicate_path {
            info!(
                "event=repository_added module=ingest status=skipped reason=duplicate_path existing={}",
                existing.len()
            );
            return Ok(None);
        }

        let repo_id = self.store.register_repository(path, description)?;
        info!("event=repository_added module=ingest status=ok repo_id={repo_id}");
        Ok(Some(repo_id))
    }
}

impl<S: CatalogStore + CatalogQuery> IngestService<S> {
    /// Scans `root` and records every accepted file under `repo_id`.
    ///
    /// # Errors
    /// - `Traverse` when `root` cannot be traversed at all.
    /// - `Store` when a store operation fails.
    /// - `Store(UnknownRepository)` before any file is read when `repo_id`
    ///   is not registered; nothing is recorded in that case.
    pub fn scan_into_repository(
        &self,
        root: impl AsRef<Path>,
        repo_id: RepoId,
        options: &ScanOptions,
    ) -> IngestResult<ScanReport> {
        let root = root.as_ref();
        let started_at = Instant::now();
        info!(
            "event=scan_start module=ingest status=start repo_id={repo_id} digest={} root={}",
            self.fingerprinter.algorithm(),
            root.display()
        );

        if self.store.get_repository(repo_id)?.is_none() {
            warn!(
                "event=scan_start module=ingest status=error error_code=unknown_repository repo_id={repo_id}"
            );
            return Err(StoreError::UnknownRepository(repo_id).into());
        }

        let traversal = options.traverser().walk(root)?;
        let mut report = ScanReport::default();

        for event in traversal {
            if options.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let path = match event {
                TraversalEvent::File(path) => path,
                TraversalEvent::Failure(failure) => {
                    report.partial_failures.push(failure);
                    continue;
                }
            };
            report.files_seen += 1;
            self.ingest_file(repo_id, path, &mut report)?;
        }
        if report.cancelled {
            warn!(
                "event=scan_cancelled module=ingest status=cancelled repo_id={repo_id} files_seen={}",
                report.files_seen
            );
        }
        info!(
            "event=scan_finish module=ingest status=ok repo_id={repo_id} duration_ms={} files_seen={} content_created={} locations_created={} skipped={} partial_failures={} cancelled={}",
            started_at.elapsed().as_millis(),
            report.files_seen,
            report.content_created,
            report.locations_created,
            report.skipped.len(),
            report.partial_failures.len(),
            report.cancelled
        );
        Ok(report)
    }

    fn ingest_file(
        &self,
        repo_id: RepoId,
        path: PathBuf,
        report: &mut ScanReport,
    ) -> IngestResult<()> {
        let Some(observed_path) = path.to_str().map(str::to_owned) else {
            skip(report, path, SkipCause::NonUtf8Path);
            return Ok(());
        };

        let content_id = match self.fingerprinter.fingerprint_file(&path) {
            Ok(content_id) => content_id,
            Err(err) => {
                skip(report, path, SkipCause::Fingerprint(err));
                return Ok(());
            }
        };

        if self.store.record_content(&content_id, None)?.created {
            report.content_created += 1;
        }
        if self
            .store
            .record_location(repo_id, &content_id, &observed_path)?
            .created
        {
            report.locations_created += 1;
        }
        Ok(())
    }
}

fn skip(report: &mut ScanReport, path: PathBuf, cause: SkipCause) {
    let code = match &cause {
        SkipCause::Fingerprint(err) => err.code(),
        SkipCause::NonUtf8Path => "non_utf8_path",
    };
    warn!(
        "event=file_skipped module=ingest status=error error_code={code} path={} error={}",
        path.display(),
        cause
    );
    report.skipped.push(SkippedFile { path, cause });
}
