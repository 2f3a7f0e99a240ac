//! [`DocumentIndex`] implementation for Elasticsearch.
//!
//! Update by query is done client-side: matching documents are read with
//! their sequence numbers, patched with [`FieldPatch::apply`] and written
//! back with `if_seq_no`/`if_primary_term`. A concurrent write to the same
//! document makes the write fail with [`SyncError::VersionConflict`]; the
//! patch is not retried.

use async_trait::async_trait;
use elasticsearch::params::Refresh;
use elasticsearch::{CountParts, DeleteByQueryParts, DeleteParts, GetParts, IndexParts, SearchParts};
use serde_json::{Value, json};

use crate::core::{DocumentIndex, DocumentMatch, FieldPatch, IndexKind};
use crate::error::{SyncError, SyncResult};

use super::backend::ElasticsearchIndex;
use super::query::to_query;

const NOT_FOUND: u16 = 404;
const CONFLICT: u16 = 409;

fn unavailable(message: String) -> SyncError {
    SyncError::IndexUnavailable { message }
}

/// A search hit with the versioning needed for a conditional write.
struct Hit {
    id: String,
    seq_no: i64,
    primary_term: i64,
    source: Value,
}

impl ElasticsearchIndex {
    fn refresh_param(&self) -> Refresh {
        if self.config().refresh_after_write {
            Refresh::WaitFor
        } else {
            Refresh::False
        }
    }

    async fn search_hits(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<Vec<Hit>> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .search(SearchParts::Index(&[&index]))
            .body(json!({
                "query": to_query(matcher),
                "size": self.config().max_result_window,
                "seq_no_primary_term": true
            }))
            .send()
            .await
            .map_err(|e| unavailable(format!("Search on {} failed: {}", index, e)))?;

        let status = response.status_code();
        if status.as_u16() == NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Search on {} failed (status {}): {}",
                index, status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse ES response: {}", e)))?;

        let hits = body
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .filter_map(|mut hit| {
                Some(Hit {
                    id: hit.get("_id")?.as_str()?.to_string(),
                    seq_no: hit.get("_seq_no")?.as_i64()?,
                    primary_term: hit.get("_primary_term")?.as_i64()?,
                    source: hit.get_mut("_source")?.take(),
                })
            })
            .collect())
    }

    async fn write_conditionally(&self, kind: IndexKind, hit: &Hit) -> SyncResult<()> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .index(IndexParts::IndexId(&index, &hit.id))
            .if_seq_no(hit.seq_no)
            .if_primary_term(hit.primary_term)
            .refresh(self.refresh_param())
            .body(&hit.source)
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to index {}/{}: {}", index, hit.id, e)))?;

        let status = response.status_code();
        if status.as_u16() == CONFLICT {
            return Err(SyncError::VersionConflict {
                index,
                id: hit.id.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Failed to index {}/{} (status {}): {}",
                index, hit.id, status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for ElasticsearchIndex {
    fn backend_name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn upsert(&self, kind: IndexKind, id: &str, document: Value) -> SyncResult<()> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .index(IndexParts::IndexId(&index, id))
            .refresh(self.refresh_param())
            .body(document)
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to index {}/{}: {}", index, id, e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Failed to index {}/{} (status {}): {}",
                index, id, status, body
            )));
        }
        tracing::trace!(index = %index, id, "Upserted document");
        Ok(())
    }

    async fn get(&self, kind: IndexKind, id: &str) -> SyncResult<Option<Value>> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .get(GetParts::IndexId(&index, id))
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to read {}/{}: {}", index, id, e)))?;

        let status = response.status_code();
        if status.as_u16() == NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(unavailable(format!(
                "Failed to read {}/{} (status {})",
                index, id, status
            )));
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse ES response: {}", e)))?;
        Ok(body.get_mut("_source").map(Value::take))
    }

    async fn delete_by_id(&self, kind: IndexKind, id: &str) -> SyncResult<bool> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .delete(DeleteParts::IndexId(&index, id))
            .refresh(self.refresh_param())
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to delete {}/{}: {}", index, id, e)))?;

        let status = response.status_code();
        if status.as_u16() == NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(unavailable(format!(
                "Failed to delete {}/{} (status {})",
                index, id, status
            )));
        }
        tracing::trace!(index = %index, id, "Deleted document");
        Ok(true)
    }

    async fn search(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<Vec<Value>> {
        Ok(self
            .search_hits(kind, matcher)
            .await?
            .into_iter()
            .map(|hit| hit.source)
            .collect())
    }

    async fn update_by_query(
        &self,
        kind: IndexKind,
        matcher: &DocumentMatch,
        patch: &FieldPatch,
    ) -> SyncResult<usize> {
        let index = self.index_name(kind);
        let mut updated = 0;
        for mut hit in self.search_hits(kind, matcher).await? {
            if !patch.apply(&index, &hit.id, &mut hit.source)? {
                continue;
            }
            self.write_conditionally(kind, &hit).await?;
            updated += 1;
        }
        tracing::debug!(index = %index, updated, "Applied update by query");
        Ok(updated)
    }

    async fn delete_by_query(&self, kind: IndexKind, matcher: &DocumentMatch) -> SyncResult<usize> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .delete_by_query(DeleteByQueryParts::Index(&[&index]))
            .refresh(self.config().refresh_after_write)
            .body(json!({ "query": to_query(matcher) }))
            .send()
            .await
            .map_err(|e| unavailable(format!("Delete by query on {} failed: {}", index, e)))?;

        let status = response.status_code();
        if status.as_u16() == NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!(
                "Delete by query on {} failed (status {}): {}",
                index, status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse ES response: {}", e)))?;
        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0) as usize;
        tracing::debug!(index = %index, deleted, "Applied delete by query");
        Ok(deleted)
    }

    async fn count(&self, kind: IndexKind) -> SyncResult<u64> {
        let index = self.index_name(kind);
        let response = self
            .client()
            .count(CountParts::Index(&[&index]))
            .send()
            .await
            .map_err(|e| unavailable(format!("Count on {} failed: {}", index, e)))?;

        let status = response.status_code();
        if status.as_u16() == NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(unavailable(format!(
                "Count on {} failed (status {})",
                index, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("Failed to parse ES response: {}", e)))?;
        Ok(body.get("count").and_then(Value::as_u64).unwrap_or(0))
    }
}
