//! Synchronization of the document index with the relational store.
//!
//! # Flow
//!
//! ```text
//! write path ── ChangeEvent ──► EventBus ──► EntityIndexListener (per kind)
//!                                       └──► NomenclatureIndexListener
//!                                                   │
//!                                     Propagator + EmbeddingTable
//!                                                   │
//!                                                   ▼
//!                                             DocumentIndex
//! ```
//!
//! | Event | Own document | Embedded copies |
//! |-------|--------------|-----------------|
//! | `Created` | upsert | summary upserted into owner collections |
//! | `Updated` | upsert | changed fields patched by query; moves re-home collection entries |
//! | `Deleted` | delete | references nulled, collection entries removed, orphans deleted |
//! | `StatusChanged` | as `Created` / `Deleted` | as `Created` / `Deleted` |
//!
//! Every patch is an overwrite or a keyed upsert/removal, so redelivering an
//! event is harmless. The index can always be rebuilt from the relational
//! store with [`IndexRebuilder`].

pub mod bus;
mod engine;
mod event;
mod listeners;
mod propagate;
mod rebuild;

pub use bus::{ChangeListener, EventBus, EventType, ListenerStats, PublishOutcome};
pub use engine::SyncEngine;
pub use event::{ChangeEvent, EntitySnapshot, FieldChange, diff_documents};
pub use listeners::{EntityIndexListener, NomenclatureIndexListener};
pub use propagate::Propagator;
pub use rebuild::{DEFAULT_BATCH_SIZE, IndexRebuilder, KindReport, RebuildReport, SnapshotSource};
