//! Repository domain model.
//!
//! # Invariants
//! - `repo_id` is assigned by the store and never reused.
//! - `path` may be shared by several repositories (distinct volumes mounted
//!   at one mount point); `description` tells them apart.

use serde::{Deserialize, Serialize};

/// Surrogate identity of a registered repository.
pub type RepoId = i64;

/// A registered storage location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: RepoId,
    pub path: String,
    pub description: String,
}
