//! Location domain model.

use crate::model::content::ContentId;
use crate::model::repository::RepoId;
use serde::{Deserialize, Serialize};

/// One observation of a content identity inside a repository.
///
/// The whole triple is the identity; recording it twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub repo_id: RepoId,
    pub content_id: ContentId,
    /// Path as discovered during the scan, not normalized.
    pub observed_path: String,
}
