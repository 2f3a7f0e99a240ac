//! Backend abstraction shared by the relational store and document indexes.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::BackendError;

/// Identifies the type of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// In-process document index.
    Memory,
    /// Elasticsearch (search engine).
    Elasticsearch,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Elasticsearch => write!(f, "elasticsearch"),
        }
    }
}

/// A backend that can be health-checked and initialized.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Checks if the backend is healthy and accepting requests.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Creates tables or indexes if needed. Idempotent.
    async fn initialize(&self) -> Result<(), BackendError>;
}
