//! In-process document index.
//!
//! Holds every document in a `BTreeMap` per index kind behind a
//! `parking_lot` lock. Queries and patches are evaluated with
//! [`DocumentMatch::matches`] and [`FieldPatch::apply`], so this index
//! behaves the same as a remote one for everything the sync layer does.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::core::{Backend, BackendKind, DocumentIndex, DocumentMatch, FieldPatch, IndexKind};
use crate::error::{BackendError, SyncResult};

/// An in-memory [`DocumentIndex`].
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: RwLock<HashMap<IndexKind, BTreeMap<String, Value>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all kinds.
    pub fn len(&self) -> usize {
        self.documents.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, kind: IndexKind, id: &str, document: Value) -> SyncResult<()> {
        self.documents
            .write()
            .entry(kind)
            .or_default()
            .insert(id.to_string(), document);
        tracing::trace!(index = %kind, id, "Upserted document");
        Ok(())
    }

    async fn get(&self, kind: IndexKind, id: &str) -> SyncResult<Option<Value>> {
        Ok(self
            .documents
            .read()
            .get(&kind)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn delete_by_id(&self, kind: IndexKind, id: &str) -> SyncResult<bool> {
        let removed = self
            .documents
            .write()
            .get_mut(&kind)
            .and_then(|docs| docs.remove(id))
            .is_some();
        Ok(removed)
    }

    async fn search(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<Vec<Value>> {
        Ok(self
            .documents
            .read()
            .get(&kind)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matcher.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_by_query(
        &self,
        kind: IndexKind,
        matcher: &DocumentMatch,
        patch: &FieldPatch,
    ) -> SyncResult<usize> {
        let mut guard = self.documents.write();
        let Some(docs) = guard.get_mut(&kind) else {
            return Ok(0);
        };

        let mut updated = 0;
        for (id, doc) in docs.iter_mut().filter(|(_, doc)| matcher.matches(doc)) {
            if patch.apply(kind.as_str(), id, doc)? {
                updated += 1;
            }
        }
        tracing::debug!(index = %kind, updated, "Applied update by query");
        Ok(updated)
    }

    async fn delete_by_query(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<usize> {
        let mut guard = self.documents.write();
        let Some(docs) = guard.get_mut(&kind) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|_, doc| !matcher.matches(doc));
        let deleted = before - docs.len();
        tracing::debug!(index = %kind, deleted, "Applied delete by query");
        Ok(deleted)
    }

    async fn count(&self, kind: IndexKind) -> SyncResult<u64> {
        Ok(self
            .documents
            .read()
            .get(&kind)
            .map_or(0, |docs| docs.len() as u64))
    }
}

#[async_trait]
impl Backend for MemoryIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
