//! Service wiring and index inspection helpers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use roster_persistence::backends::memory::MemoryIndex;
use roster_persistence::backends::sqlite::SqliteBackend;
use roster_persistence::core::{DocumentIndex, DocumentMatch, FieldPatch, IndexKind};
use roster_persistence::error::{SyncError, SyncResult};
use roster_persistence::service::{PersonnelService, ServiceConfig};
use roster_persistence::sync::SyncEngine;
use roster_persistence::types::{EntityId, EntityKind};

/// A service over a fresh in-memory store and index.
pub struct TestContext {
    pub store: Arc<SqliteBackend>,
    pub index: Arc<MemoryIndex>,
    pub service: PersonnelService<SqliteBackend>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let store = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        store.init_schema().expect("Failed to initialize schema");
        let store = Arc::new(store);

        let index = Arc::new(MemoryIndex::new());
        let sync = Arc::new(SyncEngine::new(index.clone()).expect("Invalid embedding table"));
        let service = PersonnelService::new(store.clone(), sync, config);

        Self {
            store,
            index,
            service,
        }
    }

    /// Reads one document, `None` if absent.
    pub async fn doc(&self, kind: IndexKind, id: EntityId) -> Option<Value> {
        self.index
            .get(kind, &id.to_string())
            .await
            .expect("Memory index read failed")
    }

    /// Reads one document, panicking if absent.
    pub async fn expect_doc(&self, kind: IndexKind, id: EntityId) -> Value {
        self.doc(kind, id)
            .await
            .unwrap_or_else(|| panic!("no {kind} document for {id}"))
    }

    /// Every document of every kind, keyed by kind and id.
    pub async fn dump(&self) -> BTreeMap<(EntityKind, String), Value> {
        let mut all = BTreeMap::new();
        for kind in EntityKind::ALL {
            for doc in self.index.search(kind, &DocumentMatch::All).await.unwrap() {
                let id = doc["id"].as_str().unwrap_or_default().to_string();
                all.insert((kind, id), doc);
            }
        }
        all
    }

    /// Asserts that no document anywhere still references `id`.
    pub async fn assert_no_references(&self, id: EntityId) {
        let needle = Value::String(id.to_string());
        for ((kind, doc_id), doc) in self.dump().await {
            if doc_id == id.to_string() {
                panic!("{kind} document {doc_id} still exists");
            }
            assert!(
                !contains_value(&doc, &needle),
                "{kind} document {doc_id} still references {id}: {doc}"
            );
        }
    }
}

fn contains_value(doc: &Value, needle: &Value) -> bool {
    match doc {
        Value::Object(map) => map.values().any(|v| contains_value(v, needle)),
        Value::Array(items) => items.iter().any(|v| contains_value(v, needle)),
        other => other == needle,
    }
}

/// A document index that rejects every request.
#[derive(Debug, Default)]
pub struct FailingIndex;

fn down() -> SyncError {
    SyncError::IndexUnavailable {
        message: "index is down".to_string(),
    }
}

#[async_trait]
impl DocumentIndex for FailingIndex {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn upsert(&self, _kind: IndexKind, _id: &str, _document: Value) -> SyncResult<()> {
        Err(down())
    }

    async fn get(&self, _kind: IndexKind, _id: &str) -> SyncResult<Option<Value>> {
        Err(down())
    }

    async fn delete_by_id(&self, _kind: IndexKind, _id: &str) -> SyncResult<bool> {
        Err(down())
    }

    async fn search(&self, _kind: IndexKind, _matcher: &DocumentMatch) -> SyncResult<Vec<Value>> {
        Err(down())
    }

    async fn update_by_query(
        &self,
        _kind: IndexKind,
        _matcher: &DocumentMatch,
        _patch: &FieldPatch,
    ) -> SyncResult<usize> {
        Err(down())
    }

    async fn delete_by_query(
        &self,
        _kind: IndexKind,
        _matcher: &DocumentMatch,
    ) -> SyncResult<usize> {
        Err(down())
    }

    async fn count(&self, _kind: IndexKind) -> SyncResult<u64> {
        Err(down())
    }
}
