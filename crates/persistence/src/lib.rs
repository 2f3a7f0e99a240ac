//! Roster Persistence Layer
//!
//! This crate stores personnel records (employees, students, workplaces,
//! phones and nomenclature lookup lists) in a relational store and keeps a
//! denormalized document index in step with every committed write.
//!
//! # Features
//!
//! - **Criteria queries**: per-entity filter bags compiled into parameterized
//!   SQL, with joins through relations and AND/OR combination
//! - **Denormalized index**: each document copies the display names of the
//!   entities it references, and embeds summaries of its children
//! - **Change propagation**: a rename, move, disable or delete is patched
//!   into every document that copied the old value
//! - **Recovery**: the index can be cleared and rebuilt from the relational
//!   store at any time
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! roster-persistence = { version = "0.1", features = ["elasticsearch"] }
//! ```
//!
//! - `sqlite` (default) - relational store, in-memory or file based
//! - `elasticsearch` - Elasticsearch document index
//!
//! The in-memory document index is always available.
//!
//! # Architecture
//!
//! - [`types`] - entities, filters, criteria, DTOs and paging
//! - [`specification`] - criteria-to-SQL compilation
//! - [`core`] - repository and document index traits
//! - [`projection`] - entity-to-document mapping and the embedding table
//! - [`sync`] - change events, the event bus and index propagation
//! - [`service`] - the validated write path
//! - [`backends`] - SQLite, in-memory and Elasticsearch implementations
//! - [`error`] - error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use roster_persistence::specification::{Criteria, JoinMode};
//! use roster_persistence::types::{EmployeeCriteria, StringFilter};
//!
//! let criteria = EmployeeCriteria {
//!     work_place_name: Some(StringFilter::equals("Rectorado")),
//!     ..Default::default()
//! };
//! let spec = criteria.to_specification(JoinMode::And);
//! assert!(!spec.is_unrestricted());
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod projection;
pub mod service;
pub mod specification;
pub mod sync;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult, SyncError, SyncResult};
pub use service::{PersonnelService, ReferenceResolution, ServiceConfig};
pub use types::{EntityId, EntityKind, PageRequest};

// Re-export core traits
pub use core::{Backend, BackendKind, DocumentIndex, NomenclatureTree, RelationalStore, Repository};

pub use sync::{ChangeEvent, IndexRebuilder, SyncEngine};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
