//! Table-driven propagation of entity changes into embedding documents.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::{DocumentIndex, DocumentMatch, FieldPatch, values_at};
use crate::error::SyncResult;
use crate::projection::{Embedding, EmbeddingShape, EmbeddingTable, RemovalPolicy, select_fields};
use crate::types::{EntityId, EntityKind};

use super::event::{EntitySnapshot, FieldChange};

/// Applies the index side of entity changes.
///
/// Own documents are replaced wholesale; copies inside other documents are
/// patched in place, as declared by the [`EmbeddingTable`].
pub struct Propagator {
    index: Arc<dyn DocumentIndex>,
    table: EmbeddingTable,
}

impl std::fmt::Debug for Propagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Propagator")
            .field("index", &self.index.backend_name())
            .field("embeddings", &self.table.embeddings().len())
            .finish()
    }
}

/// Non-null string values at a dotted path.
fn ids_at(doc: &Value, path: &str) -> Vec<String> {
    values_at(doc, path)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn touches(changes: &[FieldChange], fields: &[&str]) -> bool {
    changes.iter().any(|c| fields.contains(&c.field.as_str()))
}

fn nulls(fields: &[&str]) -> Map<String, Value> {
    fields.iter().map(|f| (f.to_string(), Value::Null)).collect()
}

impl Propagator {
    pub fn new(index: Arc<dyn DocumentIndex>, table: EmbeddingTable) -> Self {
        Self { index, table }
    }

    pub fn index(&self) -> &Arc<dyn DocumentIndex> {
        &self.index
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    /// Writes the entity's own document.
    pub async fn upsert_own(&self, snapshot: &EntitySnapshot) -> SyncResult<()> {
        let document = snapshot.document()?;
        self.index
            .upsert(snapshot.kind(), &snapshot.id().to_string(), document)
            .await?;
        tracing::debug!(index = %snapshot.kind(), id = %snapshot.id(), "Indexed document");
        Ok(())
    }

    /// Removes the entity's own document.
    pub async fn delete_own(&self, kind: EntityKind, id: EntityId) -> SyncResult<bool> {
        let deleted = self.index.delete_by_id(kind, &id.to_string()).await?;
        tracing::debug!(index = %kind, id = %id, deleted, "Removed document");
        Ok(deleted)
    }

    /// Adds the entity's summary to the collections of the documents that
    /// own it.
    pub async fn attach(&self, snapshot: &EntitySnapshot) -> SyncResult<()> {
        let document = snapshot.document()?;
        let summary = snapshot.summary()?;

        for embedding in self.table.embeddings_of(snapshot.kind()) {
            if let EmbeddingShape::Collection { path, owner_path } = embedding.shape {
                for owner in ids_at(&document, owner_path) {
                    self.upsert_element(embedding, path, &owner, &summary).await?;
                }
            }
        }
        Ok(())
    }

    /// Brings every copy of the entity in line with `current`.
    ///
    /// Collection copies follow ownership moves: the summary leaves the old
    /// owner's collection and is upserted into the new owner's. Other copies
    /// are patched only when one of their fields changed.
    pub async fn propagate_update(
        &self,
        previous: &EntitySnapshot,
        current: &EntitySnapshot,
        changes: &[FieldChange],
    ) -> SyncResult<()> {
        let id = current.id().to_string();
        let before = previous.document()?;
        let after = current.document()?;
        let summary = current.summary()?;

        for embedding in self.table.embeddings_of(current.kind()) {
            match embedding.shape {
                EmbeddingShape::Collection { path, owner_path } => {
                    let old_owners = ids_at(&before, owner_path);
                    let new_owners = ids_at(&after, owner_path);
                    for owner in old_owners.iter().filter(|o| !new_owners.contains(o)) {
                        let patch = FieldPatch::RemoveFromCollection {
                            collection: path.to_string(),
                            key: "id".to_string(),
                            key_value: Value::String(id.clone()),
                        };
                        self.index
                            .update_by_query(embedding.target, &DocumentMatch::id(owner), &patch)
                            .await?;
                        tracing::debug!(index = %embedding.target, owner = %owner, id = %id, "Moved out of collection");
                    }
                    let moved = old_owners != new_owners;
                    if moved || touches(changes, embedding.fields) {
                        for owner in &new_owners {
                            self.upsert_element(embedding, path, owner, &summary).await?;
                        }
                    }
                }
                _ if !touches(changes, embedding.fields) => {}
                EmbeddingShape::Flat {
                    id_field,
                    name_field,
                } => {
                    let patch = FieldPatch::set(name_field, summary["name"].clone());
                    self.patch(embedding, DocumentMatch::equals(id_field, id.clone()), &patch)
                        .await?;
                }
                EmbeddingShape::Object { path } => {
                    let fields = select_fields(&summary, embedding.fields)
                        .into_iter()
                        .map(|(field, value)| (format!("{path}.{field}"), value))
                        .collect();
                    let patch = FieldPatch::Set(fields);
                    self.patch(embedding, DocumentMatch::equals(embedding.match_path(), id.clone()), &patch)
                        .await?;
                }
                EmbeddingShape::CollectionFlat {
                    collection,
                    id_field,
                    name_field,
                } => {
                    let mut fields = Map::new();
                    fields.insert(name_field.to_string(), summary["name"].clone());
                    let patch = FieldPatch::SetInCollection {
                        collection: collection.to_string(),
                        key: id_field.to_string(),
                        key_value: Value::String(id.clone()),
                        fields,
                    };
                    self.patch(embedding, DocumentMatch::equals(embedding.match_path(), id.clone()), &patch)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Removes or nulls every copy of a removed entity.
    ///
    /// Documents whose only owner was the removed entity are deleted.
    pub async fn propagate_removal(&self, kind: EntityKind, id: EntityId) -> SyncResult<()> {
        let id = id.to_string();

        for embedding in self.table.embeddings_of(kind) {
            let matcher = DocumentMatch::equals(embedding.match_path(), id.clone());
            match (embedding.shape, embedding.removal) {
                (EmbeddingShape::Flat { id_field, name_field }, _) => {
                    let patch = FieldPatch::set(id_field, Value::Null).and_set(name_field, Value::Null);
                    self.patch(embedding, matcher, &patch).await?;
                }
                (EmbeddingShape::Object { path }, removal) => {
                    if let RemovalPolicy::DeleteIfOrphaned { other_owner } = removal {
                        let orphans = matcher.clone().and(DocumentMatch::missing(other_owner));
                        let deleted = self.index.delete_by_query(embedding.target, &orphans).await?;
                        tracing::debug!(index = %embedding.target, source = %kind, id = %id, deleted, "Deleted orphaned documents");
                    }
                    let patch = FieldPatch::set(path, Value::Null);
                    self.patch(embedding, matcher, &patch).await?;
                }
                (EmbeddingShape::Collection { path, .. }, _) => {
                    let patch = FieldPatch::RemoveFromCollection {
                        collection: path.to_string(),
                        key: "id".to_string(),
                        key_value: Value::String(id.clone()),
                    };
                    self.patch(embedding, matcher, &patch).await?;
                }
                (
                    EmbeddingShape::CollectionFlat {
                        collection,
                        id_field,
                        name_field,
                    },
                    _,
                ) => {
                    let patch = FieldPatch::SetInCollection {
                        collection: collection.to_string(),
                        key: id_field.to_string(),
                        key_value: Value::String(id.clone()),
                        fields: nulls(&[id_field, name_field]),
                    };
                    self.patch(embedding, matcher, &patch).await?;
                }
            }
        }
        Ok(())
    }

    async fn upsert_element(
        &self,
        embedding: &Embedding,
        collection: &str,
        owner: &str,
        summary: &Value,
    ) -> SyncResult<()> {
        let patch = FieldPatch::UpsertInCollection {
            collection: collection.to_string(),
            key: "id".to_string(),
            element: Value::Object(select_fields(summary, embedding.fields)),
        };
        let updated = self
            .index
            .update_by_query(embedding.target, &DocumentMatch::id(owner), &patch)
            .await?;
        tracing::debug!(index = %embedding.target, owner = %owner, collection, updated, "Upserted into collection");
        Ok(())
    }

    async fn patch(
        &self,
        embedding: &Embedding,
        matcher: DocumentMatch,
        patch: &FieldPatch,
    ) -> SyncResult<usize> {
        let updated = self
            .index
            .update_by_query(embedding.target, &matcher, patch)
            .await?;
        tracing::debug!(
            index = %embedding.target,
            source = %embedding.source,
            path = %embedding.match_path(),
            updated,
            "Patched embedded copies"
        );
        Ok(updated)
    }
}
