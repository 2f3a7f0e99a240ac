//! Listeners that keep the document index in step with committed changes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::types::EntityKind;

use super::bus::ChangeListener;
use super::event::{ChangeEvent, EntitySnapshot};
use super::propagate::Propagator;

async fn index_created(propagator: &Propagator, snapshot: &EntitySnapshot) -> SyncResult<()> {
    if !snapshot.is_indexed() {
        return Ok(());
    }
    propagator.upsert_own(snapshot).await?;
    propagator.attach(snapshot).await
}

async fn index_removed(propagator: &Propagator, snapshot: &EntitySnapshot) -> SyncResult<()> {
    propagator.delete_own(snapshot.kind(), snapshot.id()).await?;
    propagator
        .propagate_removal(snapshot.kind(), snapshot.id())
        .await
}

/// Indexes employees, students, workplaces and phones.
///
/// An update that takes an entity out of the index (a phone saved as
/// inactive) is handled as a removal, and one that brings it back as a
/// create.
pub struct EntityIndexListener {
    kind: EntityKind,
    name: String,
    propagator: Arc<Propagator>,
}

impl EntityIndexListener {
    pub fn new(kind: EntityKind, propagator: Arc<Propagator>) -> Self {
        Self {
            kind,
            name: format!("{kind}-index"),
            propagator,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

#[async_trait]
impl ChangeListener for EntityIndexListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        let propagator = self.propagator.as_ref();
        match event {
            ChangeEvent::Created { entity } => index_created(propagator, entity).await,
            ChangeEvent::Updated {
                previous,
                current,
                changes,
            } => match (previous.is_indexed(), current.is_indexed()) {
                (_, false) => index_removed(propagator, current).await,
                (false, true) => index_created(propagator, current).await,
                (true, true) => {
                    propagator.upsert_own(current).await?;
                    propagator
                        .propagate_update(previous, current, changes)
                        .await
                }
            },
            ChangeEvent::Deleted { entity, .. } => index_removed(propagator, entity).await,
            ChangeEvent::StatusChanged {
                entity,
                enabled: true,
                ..
            } => index_created(propagator, entity).await,
            ChangeEvent::StatusChanged {
                entity,
                enabled: false,
                ..
            } => index_removed(propagator, entity).await,
        }
    }
}

/// Indexes nomenclature and cascades renames and subtree invalidation.
///
/// Deleting or disabling a node invalidates its whole subtree: the subtree's
/// documents are removed and every reference to one of its nodes is nulled.
/// Enabling a node restores the subtree's own documents.
pub struct NomenclatureIndexListener {
    propagator: Arc<Propagator>,
}

impl NomenclatureIndexListener {
    pub fn new(propagator: Arc<Propagator>) -> Self {
        Self { propagator }
    }

    async fn invalidate(
        &self,
        root: &EntitySnapshot,
        dependents: &[EntitySnapshot],
    ) -> SyncResult<()> {
        for node in std::iter::once(root).chain(dependents) {
            index_removed(&self.propagator, node).await?;
        }
        tracing::debug!(root = %root.id(), nodes = dependents.len() + 1, "Invalidated nomenclature subtree");
        Ok(())
    }
}

#[async_trait]
impl ChangeListener for NomenclatureIndexListener {
    fn name(&self) -> &str {
        "nomenclature-index"
    }

    async fn on_event(&self, event: &ChangeEvent) -> SyncResult<()> {
        let propagator = self.propagator.as_ref();
        match event {
            ChangeEvent::Created { entity } => index_created(propagator, entity).await,
            ChangeEvent::Updated {
                previous,
                current,
                changes,
            } => {
                if !current.is_indexed() {
                    return self.invalidate(current, &[]).await;
                }
                propagator.upsert_own(current).await?;
                propagator
                    .propagate_update(previous, current, changes)
                    .await
            }
            ChangeEvent::Deleted { entity, dependents } => self.invalidate(entity, dependents).await,
            ChangeEvent::StatusChanged {
                entity,
                enabled: false,
                dependents,
            } => self.invalidate(entity, dependents).await,
            ChangeEvent::StatusChanged {
                entity,
                enabled: true,
                dependents,
            } => {
                for node in std::iter::once(entity).chain(dependents) {
                    index_created(propagator, node).await?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryIndex;
    use crate::core::{DocumentIndex, IndexKind};
    use crate::projection::EmbeddingTable;
    use crate::types::{Employee, Nomenclature, NomenclatureKind, Person, Phone, Relation};

    fn setup() -> (Arc<MemoryIndex>, Arc<Propagator>) {
        let index = Arc::new(MemoryIndex::new());
        let propagator = Arc::new(Propagator::new(index.clone(), EmbeddingTable::standard()));
        (index, propagator)
    }

    #[tokio::test]
    async fn test_inactive_phone_update_removes_document() {
        let (index, propagator) = setup();
        let listener = EntityIndexListener::new(EntityKind::Phone, propagator);
        let phone = Phone::new(5551234);
        listener
            .on_event(&ChangeEvent::created(phone.clone()))
            .await
            .unwrap();
        assert_eq!(index.count(IndexKind::Phone).await.unwrap(), 1);

        let mut inactive = phone.clone();
        inactive.active = false;
        listener
            .on_event(&ChangeEvent::updated(phone, inactive))
            .await
            .unwrap();
        assert_eq!(index.count(IndexKind::Phone).await.unwrap(), 0);
        assert_eq!(listener.name(), "phone-index");
    }

    #[tokio::test]
    async fn test_disable_nulls_references_across_subtree() {
        let (index, propagator) = setup();
        let employees = EntityIndexListener::new(EntityKind::Employee, propagator.clone());
        let nomenclature = NomenclatureIndexListener::new(propagator);

        let district = Nomenclature::new("Centro", NomenclatureKind::District);
        let mut sub = Nomenclature::new("Norte", NomenclatureKind::SubDistrict);
        sub.parent = Some(Relation::loaded(district.clone()));
        for node in [&district, &sub] {
            nomenclature
                .on_event(&ChangeEvent::created(node.clone()))
                .await
                .unwrap();
        }

        let mut person = Person::new("1", "Cesar");
        person.district = Some(Relation::loaded(district.clone()));
        person.sub_district = Some(Relation::loaded(sub.clone()));
        let employee = Employee::new(person);
        employees
            .on_event(&ChangeEvent::created(employee.clone()))
            .await
            .unwrap();

        let mut disabled = district.clone();
        disabled.active = false;
        let mut disabled_sub = sub.clone();
        disabled_sub.active = false;
        nomenclature
            .on_event(&ChangeEvent::status_changed(
                disabled,
                false,
                vec![disabled_sub.into()],
            ))
            .await
            .unwrap();

        let doc = index
            .get(IndexKind::Employee, &employee.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert!(doc["district"].is_null());
        assert!(doc["district_id"].is_null());
        assert!(doc["sub_district"].is_null());
        assert_eq!(index.count(IndexKind::Nomenclature).await.unwrap(), 0);

        nomenclature
            .on_event(&ChangeEvent::status_changed(
                district,
                true,
                vec![sub.into()],
            ))
            .await
            .unwrap();
        assert_eq!(index.count(IndexKind::Nomenclature).await.unwrap(), 2);
    }
}
