//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the crate, following a
//! hierarchy that separates caller errors (validation, unresolved references,
//! missing entities) from backend failures and index synchronization failures.
//!
//! Index synchronization failures ([`SyncError`]) are never surfaced to the
//! caller of a write: the synchronization engine logs and swallows them.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Validation errors raised before any write
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Foreign-key stub resolution errors
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Document index synchronization errors
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl StorageError {
    /// Returns true if this error was caused by the caller's input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            StorageError::Validation(_)
                | StorageError::Reference(_)
                | StorageError::Resource(_)
        )
    }
}

/// Errors related to entity state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested entity was not found.
    #[error("entity not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    /// An entity with the given ID already exists.
    #[error("entity already exists: {kind}/{id}")]
    AlreadyExists { kind: String, id: String },
}

/// Errors raised by input validation.
///
/// A validation error is always raised before the relational store is touched.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The criteria join mode is neither `and` nor `or`.
    #[error("invalid join mode '{value}': expected 'and' or 'or'")]
    InvalidJoinMode { value: String },

    /// A sibling nomenclature with the same name and kind already exists.
    #[error("nomenclature '{name}' of kind {kind} already exists under the same parent")]
    DuplicateNomenclature { name: String, kind: String },

    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A relation is structurally invalid (e.g. a nomenclature cycle).
    #[error("invalid reference {field}: {message}")]
    InvalidReference { field: String, message: String },

    /// The criteria object cannot be compiled.
    #[error("invalid criteria for {field}: {message}")]
    InvalidCriteria { field: String, message: String },
}

/// Errors resolving foreign-key stubs into loaded entities.
#[derive(Error, Debug)]
pub enum ReferenceError {
    /// A referenced entity does not exist.
    #[error("unresolved reference {field} -> {kind}/{id}")]
    Unresolved {
        field: String,
        kind: String,
        id: String,
    },
}

/// Errors originating from a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors raised while propagating a change into the document index.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The document index cannot be reached.
    #[error("document index unavailable: {message}")]
    IndexUnavailable { message: String },

    /// A document changed between read and write during a patch.
    #[error("version conflict on {index}/{id}")]
    VersionConflict { index: String, id: String },

    /// A field patch could not be applied to a document.
    #[error("patch failed on {index}/{id}: {message}")]
    PatchFailed {
        index: String,
        id: String,
        message: String,
    },

    /// The index kind is not known to the backend.
    #[error("unknown index kind: {kind}")]
    UnknownIndexKind { kind: String },

    /// The embedding table failed startup validation.
    #[error("invalid projection mapping: {message}")]
    InvalidMapping { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for index synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Internal {
            backend_name: "unknown".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
