//! The domain write path.
//!
//! [`PersonnelService`] is the only writer of the relational store. Every
//! write runs the same pipeline:
//!
//! ```text
//! DTO ─► entity with stubs ─► validate ─► resolve stubs ─► save ─► ChangeEvent ─► SyncEngine
//! ```
//!
//! Validation and reference resolution finish before the store is touched,
//! so a rejected write leaves no trace. The change event is published after
//! the relational write commits; index failures are logged by the sync engine
//! and never returned from the write.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use roster_persistence::backends::memory::MemoryIndex;
//! use roster_persistence::backends::sqlite::SqliteBackend;
//! use roster_persistence::service::{PersonnelService, ServiceConfig};
//! use roster_persistence::sync::SyncEngine;
//! use roster_persistence::types::{EmployeeDto, WorkPlaceDto};
//!
//! let store = SqliteBackend::in_memory()?;
//! store.init_schema()?;
//! let sync = Arc::new(SyncEngine::new(Arc::new(MemoryIndex::new()))?);
//! let service = PersonnelService::new(Arc::new(store), sync, ServiceConfig::default());
//!
//! let rectorado = service.save_work_place(WorkPlaceDto::new("Rectorado")).await?;
//! let mut cesar = EmployeeDto::new("85010112345", "Cesar");
//! cesar.work_place_id = Some(rectorado.id);
//! service.save_employee(cesar).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod resolve;
mod validate;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{NomenclatureTree, RelationalStore, Repository};
use crate::error::{ResourceError, StorageResult, SyncError};
use crate::specification::{EntityCriteria, JoinMode, Specification};
use crate::sync::{
    ChangeEvent, EntitySnapshot, IndexRebuilder, PublishOutcome, RebuildReport, SnapshotSource,
    SyncEngine,
};
use crate::types::{
    Employee, EmployeeDto, Entity, EntityId, EntityKind, Nomenclature, NomenclatureDto,
    PageRequest, Phone, PhoneDto, Student, StudentDto, WorkPlace, WorkPlaceDto,
};

pub use config::{ReferenceResolution, ServiceConfig};
pub use resolve::Resolve;

use resolve::Resolver;

/// Creates, updates, deletes and queries entities, keeping the document
/// index in step through a [`SyncEngine`].
pub struct PersonnelService<S: RelationalStore> {
    store: Arc<S>,
    sync: Arc<SyncEngine>,
    config: ServiceConfig,
}

impl<S: RelationalStore> PersonnelService<S> {
    pub fn new(store: Arc<S>, sync: Arc<SyncEngine>, config: ServiceConfig) -> Self {
        tracing::debug!(
            reference_resolution = %config.reference_resolution,
            "Personnel service created"
        );
        Self {
            store,
            sync,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The first page at the configured default size.
    pub fn default_page(&self) -> PageRequest {
        PageRequest::first(self.config.default_page_size)
    }

    fn repo<E: Entity>(&self) -> &dyn Repository<E>
    where
        S: Repository<E>,
    {
        self.store.as_ref()
    }

    fn resolver(&self) -> Resolver<'_, S> {
        Resolver::new(self.store.as_ref(), self.config.reference_resolution)
    }

    fn lenient_resolver(&self) -> Resolver<'_, S> {
        Resolver::new(self.store.as_ref(), ReferenceResolution::Lenient)
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    pub async fn save_employee(&self, dto: EmployeeDto) -> StorageResult<Employee> {
        let employee = dto.into_entity();
        validate::person(&employee.person)?;
        self.save_entity(employee).await
    }

    pub async fn save_student(&self, dto: StudentDto) -> StorageResult<Student> {
        let student = dto.into_entity();
        validate::person(&student.person)?;
        self.save_entity(student).await
    }

    /// Saves a workplace. The returned workplace carries its loaded
    /// employees and phones.
    pub async fn save_work_place(&self, dto: WorkPlaceDto) -> StorageResult<WorkPlace> {
        let work_place = dto.into_entity();
        validate::work_place(&work_place)?;
        self.save_entity(work_place).await
    }

    pub async fn save_phone(&self, dto: PhoneDto) -> StorageResult<Phone> {
        let phone = dto.into_entity();
        validate::phone(&phone)?;
        self.save_entity(phone).await
    }

    /// Saves a nomenclature entry.
    ///
    /// Fails with `DuplicateNomenclature` if a sibling has the same name and
    /// kind, and with `InvalidReference` if the parent is the entry itself or
    /// one of its descendants.
    ///
    /// A change to `active` on an existing entry applies to its whole
    /// subtree, as with [`set_nomenclature_active`](Self::set_nomenclature_active).
    pub async fn save_nomenclature(&self, dto: NomenclatureDto) -> StorageResult<Nomenclature> {
        let mut nomenclature = dto.into_entity();
        validate::nomenclature(self.store.as_ref(), &nomenclature).await?;

        let was_active = self
            .repo::<Nomenclature>()
            .find_by_id(nomenclature.id)
            .await?
            .map(|previous| previous.active);
        match was_active {
            Some(was_active) if was_active != nomenclature.active => {
                // Field changes go out under the old status, then the
                // toggle cascades.
                let id = nomenclature.id;
                let active = nomenclature.active;
                nomenclature.active = was_active;
                self.save_entity(nomenclature).await?;
                self.set_nomenclature_active(id, active).await?;
                self.get::<Nomenclature>(id).await
            }
            _ => self.save_entity(nomenclature).await,
        }
    }

    async fn save_entity<E>(&self, mut entity: E) -> StorageResult<E>
    where
        E: Resolve + Into<EntitySnapshot>,
        S: Repository<E>,
    {
        entity.resolve_references(&self.resolver()).await?;

        let previous = self.repo::<E>().find_by_id(entity.id()).await?;
        self.repo::<E>().save(&entity).await?;

        let event = match previous {
            None => ChangeEvent::created(entity.clone()),
            Some(mut previous) => {
                previous
                    .resolve_references(&self.lenient_resolver())
                    .await?;
                ChangeEvent::updated(previous, entity.clone())
            }
        };
        tracing::debug!(kind = %E::KIND, id = %entity.id(), event = event.name(), "Saved entity");
        self.publish(&event).await;
        Ok(entity)
    }

    pub async fn delete_employee(&self, id: EntityId) -> StorageResult<bool> {
        self.delete_entity::<Employee>(id, Vec::new()).await
    }

    pub async fn delete_student(&self, id: EntityId) -> StorageResult<bool> {
        self.delete_entity::<Student>(id, Vec::new()).await
    }

    /// Deletes a workplace, the phones only it owns, and detaches its
    /// employees and shared phones.
    pub async fn delete_work_place(&self, id: EntityId) -> StorageResult<bool> {
        self.delete_entity::<WorkPlace>(id, Vec::new()).await
    }

    pub async fn delete_phone(&self, id: EntityId) -> StorageResult<bool> {
        self.delete_entity::<Phone>(id, Vec::new()).await
    }

    /// Deletes a nomenclature entry with its whole subtree.
    pub async fn delete_nomenclature(&self, id: EntityId) -> StorageResult<bool> {
        let dependents = self.descendants(id).await?;
        self.delete_entity::<Nomenclature>(id, dependents).await
    }

    async fn delete_entity<E>(
        &self,
        id: EntityId,
        dependents: Vec<EntitySnapshot>,
    ) -> StorageResult<bool>
    where
        E: Resolve + Into<EntitySnapshot>,
        S: Repository<E>,
    {
        let Some(mut entity) = self.repo::<E>().find_by_id(id).await? else {
            return Ok(false);
        };
        entity
            .resolve_references(&self.lenient_resolver())
            .await?;

        if !self.repo::<E>().delete(id).await? {
            return Ok(false);
        }

        tracing::debug!(kind = %E::KIND, id = %id, dependents = dependents.len(), "Deleted entity");
        self.publish(&ChangeEvent::deleted(entity, dependents))
            .await;
        Ok(true)
    }

    /// Enables or disables a phone. A disabled phone stays in the store and
    /// leaves the index.
    pub async fn set_phone_active(&self, id: EntityId, active: bool) -> StorageResult<Phone> {
        let mut phone = self.get::<Phone>(id).await?;
        if phone.active == active {
            return Ok(phone);
        }

        phone.active = active;
        self.repo::<Phone>().save(&phone).await?;
        self.publish(&ChangeEvent::status_changed(phone.clone(), active, Vec::new()))
            .await;
        Ok(phone)
    }

    /// Enables or disables a nomenclature entry and its whole subtree.
    ///
    /// Returns the affected ids, root first.
    pub async fn set_nomenclature_active(
        &self,
        id: EntityId,
        active: bool,
    ) -> StorageResult<Vec<EntityId>> {
        if self.repo::<Nomenclature>().find_by_id(id).await?.is_none() {
            return Err(not_found(EntityKind::Nomenclature, id));
        }

        let ids = self.store.set_subtree_active(id, active).await?;
        let mut nodes = Vec::with_capacity(ids.len());
        for node_id in &ids {
            if let Some(node) = self.find::<Nomenclature>(*node_id).await? {
                nodes.push(EntitySnapshot::from(node));
            }
        }

        if nodes.is_empty() {
            return Ok(ids);
        }
        let root = nodes.remove(0);
        tracing::debug!(id = %id, active, nodes = ids.len(), "Changed nomenclature status");
        self.publish(&ChangeEvent::status_changed(root, active, nodes))
            .await;
        Ok(ids)
    }

    async fn descendants(&self, id: EntityId) -> StorageResult<Vec<EntitySnapshot>> {
        let mut dependents = Vec::new();
        for node_id in self.store.subtree_ids(id).await?.into_iter().skip(1) {
            if let Some(node) = self.find::<Nomenclature>(node_id).await? {
                dependents.push(node.into());
            }
        }
        Ok(dependents)
    }

    async fn publish(&self, event: &ChangeEvent) -> PublishOutcome {
        let outcome = self.sync.publish(event).await;
        if outcome.failed > 0 {
            tracing::warn!(
                kind = %event.kind(),
                id = %event.entity_id(),
                event = event.name(),
                failed = outcome.failed,
                "Index synchronization incomplete"
            );
        }
        outcome
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Reads one entity with its references loaded.
    ///
    /// Dangling references stay stubs.
    pub async fn find<E>(&self, id: EntityId) -> StorageResult<Option<E>>
    where
        E: Resolve,
        S: Repository<E>,
    {
        match self.repo::<E>().find_by_id(id).await? {
            Some(mut entity) => {
                entity
                    .resolve_references(&self.lenient_resolver())
                    .await?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Like [`find`](Self::find), failing with `NotFound` if absent.
    pub async fn get<E>(&self, id: EntityId) -> StorageResult<E>
    where
        E: Resolve,
        S: Repository<E>,
    {
        self.find::<E>(id)
            .await?
            .ok_or_else(|| not_found(E::KIND, id))
    }

    /// Returns one page of the entities matching `criteria`.
    pub async fn search<C>(
        &self,
        criteria: &C,
        mode: JoinMode,
        page: &PageRequest,
    ) -> StorageResult<Vec<C::Entity>>
    where
        C: EntityCriteria,
        C::Entity: Resolve,
        S: Repository<C::Entity>,
    {
        let spec = criteria.to_specification(mode);
        let mut entities = self.repo::<C::Entity>().find_all(&spec, page).await?;
        let resolver = self.lenient_resolver();
        for entity in &mut entities {
            entity.resolve_references(&resolver).await?;
        }
        tracing::debug!(
            kind = %<C::Entity as Entity>::KIND,
            mode = %mode,
            offset = page.offset,
            results = entities.len(),
            "Criteria search"
        );
        Ok(entities)
    }

    /// Counts the entities matching `criteria`.
    pub async fn count<C>(&self, criteria: &C, mode: JoinMode) -> StorageResult<u64>
    where
        C: EntityCriteria,
        S: Repository<C::Entity>,
    {
        self.repo::<C::Entity>()
            .count(&criteria.to_specification(mode))
            .await
    }

    async fn snapshot_page<E>(&self, page: &PageRequest) -> StorageResult<Vec<EntitySnapshot>>
    where
        E: Resolve + Into<EntitySnapshot>,
        S: Repository<E>,
    {
        let resolver = self.lenient_resolver();
        let entities = self.repo::<E>().find_all(&Specification::all(), page).await?;
        let mut snapshots = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.resolve_references(&resolver).await?;
            snapshots.push(entity.into());
        }
        Ok(snapshots)
    }

    /// Clears the document index and rebuilds it from the relational store.
    pub async fn rebuild_index(&self) -> Result<RebuildReport, SyncError> {
        IndexRebuilder::new(Arc::clone(&self.sync))
            .with_batch_size(self.config.rebuild_batch_size)
            .rebuild(self)
            .await
    }
}

#[async_trait]
impl<S: RelationalStore> SnapshotSource for PersonnelService<S> {
    async fn snapshots(
        &self,
        kind: EntityKind,
        page: &PageRequest,
    ) -> StorageResult<Vec<EntitySnapshot>> {
        match kind {
            EntityKind::Employee => self.snapshot_page::<Employee>(page).await,
            EntityKind::Student => self.snapshot_page::<Student>(page).await,
            EntityKind::WorkPlace => self.snapshot_page::<WorkPlace>(page).await,
            EntityKind::Phone => self.snapshot_page::<Phone>(page).await,
            EntityKind::Nomenclature => self.snapshot_page::<Nomenclature>(page).await,
        }
    }
}

fn not_found(kind: EntityKind, id: EntityId) -> crate::error::StorageError {
    ResourceError::NotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
    .into()
}
