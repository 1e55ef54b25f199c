//! Directory traversal as a pull-based event sequence.
//!
//! # Responsibility
//! - Enumerate every regular file reachable from a root directory.
//! - Apply a caller predicate to files, and optionally to directories.
//! - Report unreadable subtrees as events instead of aborting the walk.
//!
//! # Invariants
//! - Symbolic links are never followed. A file reached only through a
//!   symlink is skipped and a symlinked directory is not descended. The root
//!   itself may be a symlink to a directory.
//! - Each reachable regular file is yielded at most once per walk.
//! - Only a root that cannot be traversed at all is a hard error.

use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Caller predicate deciding whether a discovered path is processed.
pub type PathPredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

pub type TraverseResult<T> = Result<T, TraverseError>;

/// Where the filter predicate applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterScope {
    /// Files are filtered; every directory is still descended.
    #[default]
    FilesOnly,
    /// Directories are filtered too; a rejected directory prunes its subtree.
    FilesAndDirectories,
}

/// Root-level traversal failure.
#[derive(Debug)]
pub enum TraverseError {
    RootNotFound(PathBuf),
    RootNotDirectory(PathBuf),
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for TraverseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootNotFound(path) => write!(f, "scan root not found: `{}`", path.display()),
            Self::RootNotDirectory(path) => {
                write!(f, "scan root is not a directory: `{}`", path.display())
            }
            Self::RootUnreadable { path, source } => {
                write!(f, "cannot read scan root `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for TraverseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RootUnreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A subtree (or single entry) that could not be enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalFailure {
    /// Offending path, when the walker could name it.
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Display for TraversalFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "`{}`: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// One item pulled from a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalEvent {
    /// An accepted regular file.
    File(PathBuf),
    /// A partial failure; the walk continues with sibling subtrees.
    Failure(TraversalFailure),
}

/// Traversal options.
#[derive(Clone)]
pub struct Traverser {
    recursive: bool,
    filter: Option<PathPredicate>,
    scope: FilterScope,
}

impl Default for Traverser {
    fn default() -> Self {
        Self {
            recursive: true,
            filter: None,
            scope: FilterScope::FilesOnly,
        }
    }
}

impl std::fmt::Debug for Traverser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traverser")
            .field("recursive", &self.recursive)
            .field("filtered", &self.filter.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}

impl Traverser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables descending into subdirectories (default: on).
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Installs a filter predicate with the given scope.
    pub fn filter(mut self, predicate: PathPredicate, scope: FilterScope) -> Self {
        self.filter = Some(predicate);
        self.scope = scope;
        self
    }

    /// Starts a walk under `root`.
    ///
    /// # Errors
    /// - `RootNotFound` / `RootNotDirectory` when `root` is not a directory.
    /// - `RootUnreadable` when the root directory cannot be listed.
    pub fn walk(&self, root: impl AsRef<Path>) -> TraverseResult<Traversal> {
        let root = root.as_ref();
        let metadata = match std::fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TraverseError::RootNotFound(root.to_path_buf()));
            }
            Err(source) => {
                return Err(TraverseError::RootUnreadable {
                    path: root.to_path_buf(),
                    source,
                });
            }
        };
        if !metadata.is_dir() {
            return Err(TraverseError::RootNotDirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|source| TraverseError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        Ok(Traversal {
            inner: walker.into_iter(),
            filter: self.filter.clone(),
            scope: self.scope,
        })
    }
}

/// Lazy traversal cursor; pull events with `Iterator::next`.
pub struct Traversal {
    inner: walkdir::IntoIter,
    filter: Option<PathPredicate>,
    scope: FilterScope,
}

impl Traversal {
    fn accepts(&self, path: &Path) -> bool {
        self.filter.as_ref().map_or(true, |predicate| predicate(path))
    }
}

impl Iterator for Traversal {
    type Item = TraversalEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let failure = TraversalFailure {
                        path: err.path().map(Path::to_path_buf),
                        message: err
                            .io_error()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| err.to_string()),
                    };
                    warn!(
                        "event=traversal_partial_failure module=traverse status=error error={}",
                        failure
                    );
                    return Some(TraversalEvent::Failure(failure));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                if self.scope == FilterScope::FilesAndDirectories && !self.accepts(entry.path()) {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if file_type.is_file() && self.accepts(entry.path()) {
                return Some(TraversalEvent::File(entry.into_path()));
            }
        }
    }
}

/// Predicate accepting every path.
pub fn accept_all() -> PathPredicate {
    Arc::new(|_: &Path| true)
}

/// Predicate accepting files whose extension is in `extensions`
/// (case-insensitive, without the leading dot).
///
/// Meant for `FilterScope::FilesOnly`; with directory scope it would prune
/// every directory lacking a matching extension.
pub fn extension_filter(extensions: &[&str]) -> PathPredicate {
    let allowed: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    Arc::new(move |path: &Path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| allowed.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    })
}
