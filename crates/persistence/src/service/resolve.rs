//! Resolution of foreign-key stubs into loaded entities.

use async_trait::async_trait;

use crate::core::{RelationalStore, Repository};
use crate::error::{ReferenceError, StorageResult};
use crate::specification::{Criteria, EntityCriteria, JoinMode};
use crate::types::{
    Employee, EmployeeCriteria, Entity, Filter, MAX_PAGE_SIZE, Nomenclature, PageRequest, Person,
    Phone, PhoneCriteria, Relation, Student, WorkPlace,
};

use super::config::ReferenceResolution;

/// Loads the targets of relation stubs from the relational store.
pub struct Resolver<'a, S> {
    store: &'a S,
    policy: ReferenceResolution,
}

impl<'a, S: RelationalStore> Resolver<'a, S> {
    pub(crate) fn new(store: &'a S, policy: ReferenceResolution) -> Self {
        Self { store, policy }
    }

    /// A resolver over the same store that never fails on missing targets.
    pub(crate) fn lenient(&self) -> Resolver<'a, S> {
        Resolver::new(self.store, ReferenceResolution::Lenient)
    }

    /// Replaces a stub with the loaded entity.
    ///
    /// Loaded relations are left as they are. A missing target is an error
    /// under [`ReferenceResolution::Strict`] and stays a stub otherwise.
    pub(crate) async fn resolve<T>(
        &self,
        field: &str,
        relation: &mut Option<Relation<T>>,
    ) -> StorageResult<()>
    where
        T: Entity,
        S: Repository<T>,
    {
        let Some(Relation::Stub(id)) = relation else {
            return Ok(());
        };
        let id = *id;

        match Repository::<T>::find_by_id(self.store, id).await? {
            Some(entity) => {
                *relation = Some(Relation::loaded(entity));
                Ok(())
            }
            None => match self.policy {
                ReferenceResolution::Strict => Err(ReferenceError::Unresolved {
                    field: field.to_string(),
                    kind: T::KIND.to_string(),
                    id: id.to_string(),
                }
                .into()),
                ReferenceResolution::Lenient => {
                    tracing::warn!(field, kind = %T::KIND, id = %id, "Dangling reference kept as stub");
                    Ok(())
                }
            },
        }
    }

    /// Returns every entity matching `criteria`, page by page.
    pub(crate) async fn find_every<C>(&self, criteria: &C) -> StorageResult<Vec<C::Entity>>
    where
        C: EntityCriteria,
        S: Repository<C::Entity>,
    {
        let spec = criteria.to_specification(JoinMode::And);
        let mut page = PageRequest::first(MAX_PAGE_SIZE);
        let mut all = Vec::new();
        loop {
            let batch = Repository::<C::Entity>::find_all(self.store, &spec, &page).await?;
            let done = batch.len() < page.effective_limit() as usize;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page = page.next();
        }
    }

    async fn resolve_person(&self, person: &mut Person) -> StorageResult<()> {
        self.resolve("district", &mut person.district).await?;
        self.resolve("sub_district", &mut person.sub_district).await
    }

    /// Fills a workplace's employees and phones.
    ///
    /// Employees keep their workplace as a stub; their category is resolved
    /// leniently.
    pub(crate) async fn load_graph(&self, work_place: &mut WorkPlace) -> StorageResult<()> {
        let lenient = self.lenient();

        let mut employees = self
            .find_every(&EmployeeCriteria {
                work_place_id: Some(Filter::equals(work_place.id)),
                ..EmployeeCriteria::default()
            })
            .await?;
        for employee in &mut employees {
            lenient.resolve("category", &mut employee.category).await?;
        }

        let phones = self
            .find_every(&PhoneCriteria {
                work_place_id: Some(Filter::equals(work_place.id)),
                ..PhoneCriteria::default()
            })
            .await?;

        work_place.employees = employees;
        work_place.phones = phones;
        Ok(())
    }
}

/// Entities whose relations can be resolved before projection.
#[async_trait]
pub trait Resolve: Entity {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()>;
}

#[async_trait]
impl Resolve for Employee {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()> {
        resolver.resolve_person(&mut self.person).await?;
        resolver.resolve("category", &mut self.category).await?;
        resolver
            .resolve("scientific_degree", &mut self.scientific_degree)
            .await?;
        resolver.resolve("work_place", &mut self.work_place).await
    }
}

#[async_trait]
impl Resolve for Student {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()> {
        resolver.resolve_person(&mut self.person).await?;
        resolver.resolve("kind", &mut self.kind).await?;
        resolver.resolve("specialty", &mut self.specialty).await?;
        resolver.resolve("study_center", &mut self.study_center).await
    }
}

#[async_trait]
impl Resolve for WorkPlace {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()> {
        resolver.load_graph(self).await
    }
}

#[async_trait]
impl Resolve for Phone {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()> {
        resolver.resolve("employee", &mut self.employee).await?;
        resolver.resolve("work_place", &mut self.work_place).await?;

        // The phone document carries its employee's category.
        if let Some(Relation::Loaded(employee)) = &mut self.employee {
            resolver
                .lenient()
                .resolve("employee.category", &mut employee.category)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resolve for Nomenclature {
    async fn resolve_references<S: RelationalStore>(
        &mut self,
        resolver: &Resolver<'_, S>,
    ) -> StorageResult<()> {
        resolver.resolve("parent", &mut self.parent).await
    }
}
