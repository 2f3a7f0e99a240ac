//! Elasticsearch document index.
//!
//! Stores the denormalized documents the sync engine maintains. The
//! relational store stays the source of truth; everything here can be
//! rebuilt with [`IndexRebuilder`](crate::sync::IndexRebuilder).
//!
//! # Index Structure
//!
//! Each index kind gets its own index, `{prefix}_{kind}` (e.g.
//! `roster_employee`), with `_id` equal to the entity id. All indices share
//! the mapping installed by the index template.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use roster_persistence::backends::elasticsearch::{ElasticsearchConfig, ElasticsearchIndex};
//! use roster_persistence::core::Backend;
//! use roster_persistence::sync::SyncEngine;
//!
//! let config = ElasticsearchConfig {
//!     nodes: vec!["http://localhost:9200".to_string()],
//!     ..Default::default()
//! };
//! let index = Arc::new(ElasticsearchIndex::new(config)?);
//! index.initialize().await?;
//! let engine = SyncEngine::new(index)?;
//! ```

mod backend;
mod index;
mod query;
mod schema;

pub use backend::{ElasticsearchAuth, ElasticsearchConfig, ElasticsearchIndex};
pub use query::to_query;
