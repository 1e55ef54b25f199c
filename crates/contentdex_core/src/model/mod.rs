//! Catalog domain model.
//!
//! # Responsibility
//! - Define the three catalog entities: content, repository, location.
//! - Keep content identity as a validated value type.
//!
//! # Invariants
//! - One `ContentRecord` per distinct `ContentId`.
//! - Repository paths are not unique; `RepoId` is.

pub mod content;
pub mod location;
pub mod repository;
