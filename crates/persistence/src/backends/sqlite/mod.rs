//! SQLite backend implementation.
//!
//! This module implements the relational store on SQLite. It supports both
//! in-memory databases (great for testing) and file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use roster_persistence::backends::sqlite::SqliteBackend;
//! use roster_persistence::core::Repository;
//! use roster_persistence::types::{Person, Student};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! let student = Student::new(Person::new("900101", "Ana"));
//! backend.save(&student).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! One table per entity kind (`employees`, `students`, `work_places`,
//! `phones`, `nomenclatures`). Relations are stored as id columns named
//! `<relation>_id`; criteria queries alias the root table as `t0`.

mod backend;
pub(crate) mod mapping;
mod repository;
pub mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
