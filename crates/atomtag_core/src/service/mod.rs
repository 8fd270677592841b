//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate catalog, reconciler and handler calls into archive-level
//!   operations.
//! - Keep the CLI decoupled from storage details.

pub mod archive_service;

pub use archive_service::{ArchiveService, ServiceError};
