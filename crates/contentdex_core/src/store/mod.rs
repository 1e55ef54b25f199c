//! Catalog store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow write contract the ingest layer depends on.
//! - Isolate SQLite query details from orchestration.
//!
//! # Invariants
//! - The store is the only component that mutates catalog tables.
//! - Duplicate content and duplicate locations are no-ops, never errors.
//! - Repository registration always inserts; path policy lives upstream.

pub mod catalog_store;
