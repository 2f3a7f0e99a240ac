//! [`Repository`] and [`NomenclatureTree`] implementations for SQLite.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, Transaction, params_from_iter};

use crate::core::{NomenclatureTree, Repository};
use crate::error::{ResourceError, StorageError, StorageResult};
use crate::specification::{ROOT_ALIAS, Specification, SqlParam};
use crate::types::{Employee, EntityId, Nomenclature, PageRequest, Phone, Student, WorkPlace};

use super::SqliteBackend;
use super::mapping::{NOMENCLATURE_REFERENCES, SqlEntity};

/// Per-entity cleanup run inside the delete transaction, before the row
/// itself is removed.
pub(crate) trait DeleteCascade {
    fn before_delete(_tx: &Transaction<'_>, _id: &str) -> rusqlite::Result<()> {
        Ok(())
    }
}

impl DeleteCascade for Student {}
impl DeleteCascade for Phone {}

impl DeleteCascade for Employee {
    fn before_delete(tx: &Transaction<'_>, id: &str) -> rusqlite::Result<()> {
        tx.execute(
            "DELETE FROM phones WHERE employee_id = ?1 AND work_place_id IS NULL",
            [id],
        )?;
        tx.execute(
            "UPDATE phones SET employee_id = NULL WHERE employee_id = ?1",
            [id],
        )?;
        Ok(())
    }
}

impl DeleteCascade for WorkPlace {
    fn before_delete(tx: &Transaction<'_>, id: &str) -> rusqlite::Result<()> {
        tx.execute(
            "DELETE FROM phones WHERE work_place_id = ?1 AND employee_id IS NULL",
            [id],
        )?;
        tx.execute(
            "UPDATE phones SET work_place_id = NULL WHERE work_place_id = ?1",
            [id],
        )?;
        tx.execute(
            "UPDATE employees SET work_place_id = NULL WHERE work_place_id = ?1",
            [id],
        )?;
        Ok(())
    }
}

impl DeleteCascade for Nomenclature {
    fn before_delete(tx: &Transaction<'_>, id: &str) -> rusqlite::Result<()> {
        let subtree = subtree_of(tx, id)?;
        for node in &subtree {
            for (table, column) in NOMENCLATURE_REFERENCES {
                tx.execute(
                    &format!("UPDATE {table} SET {column} = NULL WHERE {column} = ?1"),
                    [node],
                )?;
            }
        }
        for node in subtree.iter().filter(|node| node.as_str() != id) {
            tx.execute("DELETE FROM nomenclatures WHERE id = ?1", [node])?;
        }
        Ok(())
    }
}

/// Returns `root` and every descendant id, root first.
fn subtree_of(conn: &Connection, root: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM nomenclatures WHERE id = ?1
            UNION
            SELECT n.id FROM nomenclatures n JOIN subtree s ON n.parent_id = s.id
        )
        SELECT id FROM subtree",
    )?;
    let mut ids = stmt
        .query_map([root], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if let Some(position) = ids.iter().position(|id| id == root) {
        ids.swap(0, position);
    }
    Ok(ids)
}

fn map_write_error<E: SqlEntity>(entity: &E, err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::Resource(ResourceError::AlreadyExists {
                kind: E::KIND.to_string(),
                id: entity.id().to_string(),
            })
        }
        _ => err.into(),
    }
}

fn upsert_sql<E: SqlEntity>() -> String {
    let columns = E::COLUMNS.join(", ");
    let placeholders = vec!["?"; E::COLUMNS.len() + 2].join(", ");
    let updates = E::COLUMNS[1..]
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({columns}, created_at, updated_at) VALUES ({placeholders})
         ON CONFLICT(id) DO UPDATE SET {updates}, updated_at = excluded.updated_at",
        table = E::TABLE,
    )
}

#[async_trait]
impl<E> Repository<E> for SqliteBackend
where
    E: SqlEntity + DeleteCascade,
{
    async fn save(&self, entity: &E) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();
        let mut params = entity.to_params();
        params.push(SqlParam::String(now.clone()));
        params.push(SqlParam::String(now));

        conn.execute(&upsert_sql::<E>(), params_from_iter(params.iter()))
            .map_err(|e| map_write_error(entity, e))?;

        tracing::debug!(kind = %E::KIND, id = %entity.id(), "Saved row");
        Ok(())
    }

    async fn find_by_id(&self, id: EntityId) -> StorageResult<Option<E>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {ROOT_ALIAS}.* FROM {table} {ROOT_ALIAS} WHERE {ROOT_ALIAS}.id = ?1",
            table = E::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([id.to_string()], |row| E::from_row(row))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: EntityId) -> StorageResult<bool> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let id = id.to_string();

        E::before_delete(&tx, &id)?;
        let deleted = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", E::TABLE),
            [&id],
        )?;
        tx.commit()?;

        tracing::debug!(kind = %E::KIND, id = %id, deleted, "Deleted row");
        Ok(deleted > 0)
    }

    async fn find_all(&self, spec: &Specification, page: &PageRequest) -> StorageResult<Vec<E>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {ROOT_ALIAS}.* FROM {table} {ROOT_ALIAS} {where_clause} ORDER BY {order} LIMIT ? OFFSET ?",
            table = E::TABLE,
            where_clause = spec.where_clause(),
            order = E::ORDER_BY,
        );
        let mut params = spec.params().to_vec();
        params.push(SqlParam::Integer(i64::from(page.effective_limit())));
        params.push(SqlParam::Integer(i64::from(page.offset)));

        tracing::debug!(kind = %E::KIND, sql = %sql, "Running criteria query");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| E::from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn count(&self, spec: &Specification) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {table} {ROOT_ALIAS} {where_clause}",
            table = E::TABLE,
            where_clause = spec.where_clause(),
        );
        let count: i64 = conn.query_row(&sql, params_from_iter(spec.params().iter()), |row| {
            row.get(0)
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl NomenclatureTree for SqliteBackend {
    async fn subtree_ids(&self, root: EntityId) -> StorageResult<Vec<EntityId>> {
        let conn = self.get_connection()?;
        let ids = subtree_of(&conn, &root.to_string())?;
        ids.iter()
            .map(|id| {
                id.parse::<EntityId>().map_err(|e| {
                    StorageError::Backend(crate::error::BackendError::SerializationError {
                        message: format!("invalid nomenclature id '{id}': {e}"),
                    })
                })
            })
            .collect()
    }

    async fn set_subtree_active(
        &self,
        root: EntityId,
        active: bool,
    ) -> StorageResult<Vec<EntityId>> {
        let ids = self.subtree_ids(root).await?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for id in &ids {
            tx.execute(
                "UPDATE nomenclatures SET active = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![active, now, id.to_string()],
            )?;
        }
        tx.commit()?;

        tracing::debug!(root = %root, active, affected = ids.len(), "Toggled nomenclature subtree");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::{Criteria, JoinMode};
    use crate::types::{
        EmployeeCriteria, Filter, NomenclatureKind, Person, Relation, StringFilter,
    };

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let backend = backend();
        let mut employee = Employee::new(Person::new("850101", "Cesar"));
        employee.start_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 15);

        backend.save(&employee).await.unwrap();
        let found: Employee = backend.find_by_id(employee.id).await.unwrap().unwrap();
        assert_eq!(found, employee);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_row() {
        let backend = backend();
        let mut work_place = WorkPlace::new("Lab");
        backend.save(&work_place).await.unwrap();

        work_place.name = "Annex".to_string();
        backend.save(&work_place).await.unwrap();

        let found: WorkPlace = backend.find_by_id(work_place.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Annex");
        assert_eq!(
            Repository::<WorkPlace>::count(&backend, &Specification::all())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_ci_is_rejected() {
        let backend = backend();
        backend
            .save(&Employee::new(Person::new("850101", "Cesar")))
            .await
            .unwrap();
        let err = backend
            .save(&Employee::new(Person::new("850101", "Other")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_all_with_criteria_and_paging() {
        let backend = backend();
        for (ci, name) in [("1", "Ana"), ("2", "Beto"), ("3", "Carla")] {
            backend
                .save(&Employee::new(Person::new(ci, name)))
                .await
                .unwrap();
        }

        let spec = EmployeeCriteria {
            person: crate::types::PersonCriteria {
                name: Some(StringFilter {
                    filter: Filter::not_equals("Beto".to_string()),
                    ..StringFilter::default()
                }),
                ..Default::default()
            },
            ..EmployeeCriteria::default()
        }
        .to_specification(JoinMode::And);

        let all: Vec<Employee> = backend
            .find_all(&spec, &PageRequest::default())
            .await
            .unwrap();
        let names: Vec<_> = all.iter().map(|e| e.person.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Carla"]);

        let second: Vec<Employee> = backend
            .find_all(&spec, &PageRequest::new(1, 1))
            .await
            .unwrap();
        assert_eq!(second[0].person.name, "Carla");
        assert_eq!(Repository::<Employee>::count(&backend, &spec).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_employee_cascades_to_phones() {
        let backend = backend();
        let work_place = WorkPlace::new("Lab");
        let mut employee = Employee::new(Person::new("1", "Cesar"));
        employee.work_place = Some(Relation::Stub(work_place.id));
        let mut exclusive = Phone::new(111);
        exclusive.employee = Some(Relation::Stub(employee.id));
        let mut shared = Phone::new(222);
        shared.employee = Some(Relation::Stub(employee.id));
        shared.work_place = Some(Relation::Stub(work_place.id));

        backend.save(&work_place).await.unwrap();
        backend.save(&employee).await.unwrap();
        backend.save(&exclusive).await.unwrap();
        backend.save(&shared).await.unwrap();

        assert!(Repository::<Employee>::delete(&backend, employee.id).await.unwrap());

        let gone: Option<Phone> = backend.find_by_id(exclusive.id).await.unwrap();
        assert!(gone.is_none());
        let kept: Phone = backend.find_by_id(shared.id).await.unwrap().unwrap();
        assert!(kept.employee.is_none());
        assert_eq!(kept.work_place, Some(Relation::Stub(work_place.id)));
    }

    #[tokio::test]
    async fn test_delete_work_place_detaches_employees() {
        let backend = backend();
        let work_place = WorkPlace::new("Lab");
        let mut employee = Employee::new(Person::new("1", "Cesar"));
        employee.work_place = Some(Relation::Stub(work_place.id));
        backend.save(&work_place).await.unwrap();
        backend.save(&employee).await.unwrap();

        assert!(Repository::<WorkPlace>::delete(&backend, work_place.id).await.unwrap());
        let found: Employee = backend.find_by_id(employee.id).await.unwrap().unwrap();
        assert!(found.work_place.is_none());
        assert!(!Repository::<WorkPlace>::delete(&backend, work_place.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_nomenclature_subtree() {
        let backend = backend();
        let district = Nomenclature::new("Centro", NomenclatureKind::District);
        let mut sub = Nomenclature::new("Norte", NomenclatureKind::SubDistrict);
        sub.parent = Some(Relation::Stub(district.id));
        let mut leaf = Nomenclature::new("Barrio 1", NomenclatureKind::SubDistrict);
        leaf.parent = Some(Relation::Stub(sub.id));
        let other = Nomenclature::new("Sur", NomenclatureKind::District);
        for n in [&district, &sub, &leaf, &other] {
            backend.save(n).await.unwrap();
        }

        let ids = backend.subtree_ids(district.id).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], district.id);
        assert!(ids.contains(&leaf.id));
        assert!(!ids.contains(&other.id));

        assert!(backend.subtree_ids(EntityId::new()).await.unwrap().is_empty());

        backend.set_subtree_active(district.id, false).await.unwrap();
        let leaf_row: Nomenclature = backend.find_by_id(leaf.id).await.unwrap().unwrap();
        assert!(!leaf_row.active);
        let other_row: Nomenclature = backend.find_by_id(other.id).await.unwrap().unwrap();
        assert!(other_row.active);
    }

    #[tokio::test]
    async fn test_delete_nomenclature_clears_references() {
        let backend = backend();
        let district = Nomenclature::new("Centro", NomenclatureKind::District);
        let mut sub = Nomenclature::new("Norte", NomenclatureKind::SubDistrict);
        sub.parent = Some(Relation::Stub(district.id));
        backend.save(&district).await.unwrap();
        backend.save(&sub).await.unwrap();

        let mut person = Person::new("1", "Ana");
        person.district = Some(Relation::Stub(district.id));
        person.sub_district = Some(Relation::Stub(sub.id));
        let student = Student::new(person);
        backend.save(&student).await.unwrap();

        assert!(Repository::<Nomenclature>::delete(&backend, district.id).await.unwrap());

        let found: Student = backend.find_by_id(student.id).await.unwrap().unwrap();
        assert!(found.person.district.is_none());
        assert!(found.person.sub_district.is_none());
        let child: Option<Nomenclature> = backend.find_by_id(sub.id).await.unwrap();
        assert!(child.is_none());
    }
}
