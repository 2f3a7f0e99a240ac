//! Wiring of the index listeners onto an event bus.

use std::sync::Arc;

use crate::core::DocumentIndex;
use crate::error::SyncResult;
use crate::projection::EmbeddingTable;
use crate::types::EntityKind;

use super::bus::{ChangeListener, EventBus, EventType, ListenerStats, PublishOutcome};
use super::event::ChangeEvent;
use super::listeners::{EntityIndexListener, NomenclatureIndexListener};
use super::propagate::Propagator;

/// Keeps a [`DocumentIndex`] consistent with the relational store.
///
/// The write path publishes one [`ChangeEvent`] per committed write; the
/// engine applies it to the index before `publish` returns. Index failures
/// are logged and counted but never returned.
#[derive(Debug)]
pub struct SyncEngine {
    bus: EventBus,
    propagator: Arc<Propagator>,
}

impl SyncEngine {
    /// Creates an engine over `index` with the standard embedding table.
    pub fn new(index: Arc<dyn DocumentIndex>) -> SyncResult<Self> {
        Self::with_table(index, EmbeddingTable::standard())
    }

    /// Creates an engine with a custom embedding table.
    ///
    /// Fails if the table does not validate.
    pub fn with_table(index: Arc<dyn DocumentIndex>, table: EmbeddingTable) -> SyncResult<Self> {
        table.validate()?;
        let backend = index.backend_name();
        let propagator = Arc::new(Propagator::new(index, table));
        let bus = EventBus::new();

        for kind in [
            EntityKind::Employee,
            EntityKind::Student,
            EntityKind::WorkPlace,
            EntityKind::Phone,
        ] {
            bus.subscribe(
                EventType::Kind(kind),
                Arc::new(EntityIndexListener::new(kind, Arc::clone(&propagator))),
            );
        }
        bus.subscribe(
            EventType::Kind(EntityKind::Nomenclature),
            Arc::new(NomenclatureIndexListener::new(Arc::clone(&propagator))),
        );

        tracing::info!(
            index = backend,
            listeners = bus.listener_count(),
            "Sync engine ready"
        );
        Ok(Self { bus, propagator })
    }

    /// Applies one committed change to the index.
    pub async fn publish(&self, event: &ChangeEvent) -> PublishOutcome {
        self.bus.publish(event).await
    }

    /// Registers an additional listener after the index listeners.
    pub fn subscribe(&self, event_type: EventType, listener: Arc<dyn ChangeListener>) {
        self.bus.subscribe(event_type, listener);
    }

    pub fn index(&self) -> &Arc<dyn DocumentIndex> {
        self.propagator.index()
    }

    pub fn table(&self) -> &EmbeddingTable {
        self.propagator.table()
    }

    /// Delivery statistics per listener.
    pub fn stats(&self) -> Vec<ListenerStats> {
        self.bus.stats()
    }
}
