//! Full index rebuild from the relational store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{StorageResult, SyncError};
use crate::types::{EntityKind, PageRequest};

use super::engine::SyncEngine;
use super::event::{ChangeEvent, EntitySnapshot};

/// Default number of entities loaded per batch.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Pages through every entity of one kind, references resolved.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshots(&self, kind: EntityKind, page: &PageRequest)
    -> StorageResult<Vec<EntitySnapshot>>;
}

/// Counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindReport {
    /// Entities replayed into the index.
    pub indexed: u64,
    /// Entities not indexed because they are inactive.
    pub skipped: u64,
    /// Entities whose replay failed.
    pub failed: u64,
}

/// Outcome of [`IndexRebuilder::rebuild`].
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    pub kinds: BTreeMap<EntityKind, KindReport>,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl RebuildReport {
    pub fn total_indexed(&self) -> u64 {
        self.kinds.values().map(|k| k.indexed).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.kinds.values().map(|k| k.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.total_failed() == 0
    }
}

/// Clears the index and replays a create for every entity.
///
/// Kinds are replayed referenced-first (nomenclature, workplaces, employees,
/// students, phones) so that collection upserts always find their owner.
pub struct IndexRebuilder {
    engine: Arc<SyncEngine>,
    batch_size: u32,
}

impl IndexRebuilder {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rebuilds every index kind. Failures are collected in the report.
    ///
    /// Returns an error only if clearing the index fails.
    pub async fn rebuild(&self, source: &dyn SnapshotSource) -> Result<RebuildReport, SyncError> {
        let started = Instant::now();
        let mut report = RebuildReport::default();

        for kind in EntityKind::ALL {
            self.engine.index().clear(kind).await?;
        }
        tracing::info!("Cleared document index");

        for kind in EntityKind::ALL {
            let counts = self.rebuild_kind(kind, source, &mut report.errors).await;
            tracing::info!(
                kind = %kind,
                indexed = counts.indexed,
                skipped = counts.skipped,
                failed = counts.failed,
                "Rebuilt index kind"
            );
            report.kinds.insert(kind, counts);
        }

        report.duration = started.elapsed();
        tracing::info!(
            indexed = report.total_indexed(),
            failed = report.total_failed(),
            elapsed_ms = report.duration.as_millis() as u64,
            "Index rebuild complete"
        );
        Ok(report)
    }

    async fn rebuild_kind(
        &self,
        kind: EntityKind,
        source: &dyn SnapshotSource,
        errors: &mut Vec<String>,
    ) -> KindReport {
        let mut counts = KindReport::default();
        let mut page = PageRequest::first(self.batch_size);

        loop {
            let batch = match source.snapshots(kind, &page).await {
                Ok(batch) => batch,
                Err(e) => {
                    errors.push(format!("{kind} batch at offset {}: {e}", page.offset));
                    break;
                }
            };
            let batch_len = batch.len();

            for snapshot in batch {
                if !snapshot.is_indexed() {
                    counts.skipped += 1;
                    continue;
                }
                let id = snapshot.id();
                let outcome = self.engine.publish(&ChangeEvent::Created { entity: snapshot }).await;
                if outcome.failed > 0 {
                    counts.failed += 1;
                    errors.push(format!("{kind}/{id}: index write failed"));
                } else {
                    counts.indexed += 1;
                }
            }

            tracing::debug!(kind = %kind, offset = page.offset, batch = batch_len, "Replayed batch");
            if batch_len < page.effective_limit() as usize {
                break;
            }
            page = page.next();
        }

        counts
    }
}
