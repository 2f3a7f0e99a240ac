//! Core traits and abstractions.
//!
//! - [`Backend`] - health and initialization shared by every backend
//! - [`Repository`] - CRUD and criteria queries over one entity type
//! - [`NomenclatureTree`] - subtree queries over nomenclature parent links
//! - [`RelationalStore`] - every repository the write path needs, bundled
//! - [`DocumentIndex`] - the denormalized search index
//! - [`DocumentMatch`], [`FieldPatch`] - structured queries and updates
//!   against index documents
//!
//! ```text
//!   write path ──► RelationalStore (source of truth)
//!        │
//!        └──► ChangeEvent ──► listeners ──► DocumentIndex (derived)
//! ```

pub mod backend;
pub mod index;
pub mod patch;
pub mod repository;

pub use backend::{Backend, BackendKind};
pub use index::{DocumentIndex, IndexKind};
pub use patch::{DocumentMatch, FieldPatch, values_at};
pub use repository::{NomenclatureTree, RelationalStore, Repository};
