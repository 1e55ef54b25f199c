//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate traversal, fingerprinting and store calls into use-cases.
//! - Keep CLI layers decoupled from storage details.

pub mod ingest_service;
