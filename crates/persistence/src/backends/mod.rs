//! Backend implementations.
//!
//! # Available Backends
//!
//! | Backend | Feature | Role |
//! |---------|---------|------|
//! | SQLite | `sqlite` | Relational store, source of truth |
//! | Memory | always on | Document index for tests and single-process use |
//! | Elasticsearch | `elasticsearch` | Document index |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use roster_persistence::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // In-memory database, one pooled connection
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! // Or a file database
//! let backend = SqliteBackend::open("./data/roster.db")?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod memory;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
