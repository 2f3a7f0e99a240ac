//! Relational repository traits.
//!
//! The relational store is the source of truth. Every write the domain makes
//! goes through a [`Repository`]; the document index is derived from it.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::specification::Specification;
use crate::types::{
    Employee, Entity, EntityId, Nomenclature, PageRequest, Phone, Student, WorkPlace,
};

/// CRUD and criteria queries over one entity type.
///
/// Rows hold relations as foreign-key ids; entities read back from a
/// repository carry [`Relation::Stub`](crate::types::Relation::Stub)
/// references only. `WorkPlace` reverse relations are never loaded here.
///
/// # Delete semantics
///
/// `delete` runs in one transaction and also:
///
/// - `Employee`, `WorkPlace`: deletes phones whose only owner is the deleted
///   entity and detaches it from shared phones. A workplace also detaches its
///   employees.
/// - `Nomenclature`: deletes the whole subtree and clears every reference to
///   a deleted node.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Inserts the entity, or replaces the row with the same id.
    async fn save(&self, entity: &E) -> StorageResult<()>;

    /// Reads one entity.
    async fn find_by_id(&self, id: EntityId) -> StorageResult<Option<E>>;

    /// Deletes one entity. Returns false if it did not exist.
    async fn delete(&self, id: EntityId) -> StorageResult<bool>;

    /// Returns one page of entities matching the specification, in the
    /// entity's stable order.
    async fn find_all(&self, spec: &Specification, page: &PageRequest) -> StorageResult<Vec<E>>;

    /// Counts the entities matching the specification.
    async fn count(&self, spec: &Specification) -> StorageResult<u64>;
}

/// Tree queries over nomenclature parent links.
#[async_trait]
pub trait NomenclatureTree: Send + Sync {
    /// Returns `root` followed by all of its descendants at every depth.
    ///
    /// Returns an empty list if `root` does not exist.
    async fn subtree_ids(&self, root: EntityId) -> StorageResult<Vec<EntityId>>;

    /// Sets `active` on `root` and all of its descendants.
    ///
    /// Returns the affected ids, root first.
    async fn set_subtree_active(&self, root: EntityId, active: bool)
    -> StorageResult<Vec<EntityId>>;
}

/// Everything the domain write path needs from the relational store.
pub trait RelationalStore:
    Repository<Employee>
    + Repository<Student>
    + Repository<WorkPlace>
    + Repository<Phone>
    + Repository<Nomenclature>
    + NomenclatureTree
    + Send
    + Sync
    + 'static
{
}

impl<T> RelationalStore for T where
    T: Repository<Employee>
        + Repository<Student>
        + Repository<WorkPlace>
        + Repository<Phone>
        + Repository<Nomenclature>
        + NomenclatureTree
        + Send
        + Sync
        + 'static
{
}
