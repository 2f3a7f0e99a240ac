//! The document index abstraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncResult;
use crate::types::EntityKind;

use super::patch::{DocumentMatch, FieldPatch};

/// Index kinds map one-to-one onto entity kinds.
pub type IndexKind = EntityKind;

/// A store of denormalized JSON documents, one collection per [`IndexKind`].
///
/// Documents are keyed by the id of the entity they project and always
/// carry that id in their `id` field.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Returns a human-readable name for this index backend.
    fn backend_name(&self) -> &'static str;

    /// Inserts or wholly replaces a document.
    async fn upsert(&self, kind: IndexKind, id: &str, document: Value) -> SyncResult<()>;

    /// Reads a document.
    async fn get(&self, kind: IndexKind, id: &str) -> SyncResult<Option<Value>>;

    /// Deletes a document. Returns false if it did not exist.
    async fn delete_by_id(&self, kind: IndexKind, id: &str) -> SyncResult<bool>;

    /// Returns every document embedding a reference with the given id at
    /// `path` (e.g. `employees` or `work_place`).
    async fn find_all_by_embedded_ref(
        &self,
        kind: IndexKind,
        path: &str,
        id: &str,
    ) -> SyncResult<Vec<Value>> {
        self.search(kind, &DocumentMatch::equals(format!("{path}.id"), id))
            .await
    }

    /// Returns every document matching `matcher`.
    async fn search(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<Vec<Value>>;

    /// Applies `patch` to every matching document. Returns how many changed.
    async fn update_by_query(
        &self,
        kind: IndexKind,
        matcher: &DocumentMatch,
        patch: &FieldPatch,
    ) -> SyncResult<usize>;

    /// Deletes every matching document. Returns how many were deleted.
    async fn delete_by_query(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<usize>;

    /// Counts the documents of one kind.
    async fn count(&self, kind: IndexKind) -> SyncResult<u64>;

    /// Removes every document of one kind.
    async fn clear(&self, kind: IndexKind) -> SyncResult<()> {
        self.delete_by_query(kind, &DocumentMatch::All).await.map(|_| ())
    }
}
