//! Row mapping between entities and SQLite tables.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};

use crate::specification::{SqlParam, ToSqlParam};
use crate::types::{
    Employee, Entity, EntityId, Nomenclature, NomenclatureKind, Person, Phone, Relation, Student,
    WorkPlace, relation_id,
};

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::from(s.as_str()),
            SqlParam::Integer(i) => ToSqlOutput::from(*i),
            SqlParam::Float(f) => ToSqlOutput::from(*f),
            SqlParam::Null => ToSqlOutput::from(rusqlite::types::Null),
        })
    }
}

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl FromSql for NomenclatureKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// An entity stored as one row of one table.
pub(crate) trait SqlEntity: Entity + Sized {
    /// The table holding the rows.
    const TABLE: &'static str;

    /// Columns written by `save`, `id` first, in `to_params` order.
    const COLUMNS: &'static [&'static str];

    /// Stable ordering of query results.
    const ORDER_BY: &'static str;

    /// Column values in `COLUMNS` order.
    fn to_params(&self) -> Vec<SqlParam>;

    /// Reads an entity from a `SELECT t0.*` row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn relation_param<T: Entity>(relation: &Option<Relation<T>>) -> SqlParam {
    SqlParam::optional(relation_id(relation).as_ref())
}

fn stub_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Relation<T>>> {
    let id: Option<EntityId> = row.get(column)?;
    Ok(id.map(Relation::Stub))
}

fn date_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        })
    })
    .transpose()
}

const PERSON_COLUMNS_LEN: usize = 10;

fn person_params(person: &Person) -> Vec<SqlParam> {
    let params = vec![
        person.ci.to_sql_param(),
        person.name.to_sql_param(),
        SqlParam::optional(person.last_name.as_ref()),
        SqlParam::optional(person.email.as_ref()),
        SqlParam::optional(person.address.as_ref()),
        SqlParam::optional(person.gender.as_ref()),
        SqlParam::optional(person.age.as_ref()),
        person.active.to_sql_param(),
        relation_param(&person.district),
        relation_param(&person.sub_district),
    ];
    debug_assert_eq!(params.len(), PERSON_COLUMNS_LEN);
    params
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        ci: row.get("ci")?,
        name: row.get("name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        address: row.get("address")?,
        gender: row.get("gender")?,
        age: row.get("age")?,
        active: row.get("active")?,
        district: stub_column(row, "district_id")?,
        sub_district: stub_column(row, "sub_district_id")?,
    })
}

const PEOPLE_ORDER: &str = "t0.last_name, t0.name, t0.id";
const NAMED_ORDER: &str = "t0.name, t0.id";

impl SqlEntity for Employee {
    const TABLE: &'static str = "employees";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "ci",
        "name",
        "last_name",
        "email",
        "address",
        "gender",
        "age",
        "active",
        "district_id",
        "sub_district_id",
        "registry_number",
        "start_date",
        "is_important",
        "category_id",
        "scientific_degree_id",
        "work_place_id",
    ];
    const ORDER_BY: &'static str = PEOPLE_ORDER;

    fn to_params(&self) -> Vec<SqlParam> {
        let mut params = vec![self.id.to_sql_param()];
        params.extend(person_params(&self.person));
        params.extend([
            SqlParam::optional(self.registry_number.as_ref()),
            SqlParam::optional(self.start_date.as_ref()),
            self.is_important.to_sql_param(),
            relation_param(&self.category),
            relation_param(&self.scientific_degree),
            relation_param(&self.work_place),
        ]);
        params
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Employee {
            id: row.get("id")?,
            person: person_from_row(row)?,
            registry_number: row.get("registry_number")?,
            start_date: date_column(row, "start_date")?,
            is_important: row.get("is_important")?,
            category: stub_column(row, "category_id")?,
            scientific_degree: stub_column(row, "scientific_degree_id")?,
            work_place: stub_column(row, "work_place_id")?,
        })
    }
}

impl SqlEntity for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "ci",
        "name",
        "last_name",
        "email",
        "address",
        "gender",
        "age",
        "active",
        "district_id",
        "sub_district_id",
        "class_room",
        "university_year",
        "residence",
        "kind_id",
        "specialty_id",
        "study_center_id",
    ];
    const ORDER_BY: &'static str = PEOPLE_ORDER;

    fn to_params(&self) -> Vec<SqlParam> {
        let mut params = vec![self.id.to_sql_param()];
        params.extend(person_params(&self.person));
        params.extend([
            SqlParam::optional(self.class_room.as_ref()),
            SqlParam::optional(self.university_year.as_ref()),
            SqlParam::optional(self.residence.as_ref()),
            relation_param(&self.kind),
            relation_param(&self.specialty),
            relation_param(&self.study_center),
        ]);
        params
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: row.get("id")?,
            person: person_from_row(row)?,
            class_room: row.get("class_room")?,
            university_year: row.get("university_year")?,
            residence: row.get("residence")?,
            kind: stub_column(row, "kind_id")?,
            specialty: stub_column(row, "specialty_id")?,
            study_center: stub_column(row, "study_center_id")?,
        })
    }
}

impl SqlEntity for WorkPlace {
    const TABLE: &'static str = "work_places";
    const COLUMNS: &'static [&'static str] = &["id", "name", "description", "email", "active"];
    const ORDER_BY: &'static str = NAMED_ORDER;

    fn to_params(&self) -> Vec<SqlParam> {
        vec![
            self.id.to_sql_param(),
            self.name.to_sql_param(),
            SqlParam::optional(self.description.as_ref()),
            SqlParam::optional(self.email.as_ref()),
            self.active.to_sql_param(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(WorkPlace {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            email: row.get("email")?,
            active: row.get("active")?,
            employees: Vec::new(),
            phones: Vec::new(),
        })
    }
}

impl SqlEntity for Phone {
    const TABLE: &'static str = "phones";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "number",
        "description",
        "active",
        "employee_id",
        "work_place_id",
    ];
    const ORDER_BY: &'static str = "t0.number, t0.id";

    fn to_params(&self) -> Vec<SqlParam> {
        vec![
            self.id.to_sql_param(),
            self.number.to_sql_param(),
            SqlParam::optional(self.description.as_ref()),
            self.active.to_sql_param(),
            relation_param(&self.employee),
            relation_param(&self.work_place),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Phone {
            id: row.get("id")?,
            number: row.get("number")?,
            description: row.get("description")?,
            active: row.get("active")?,
            employee: stub_column(row, "employee_id")?,
            work_place: stub_column(row, "work_place_id")?,
        })
    }
}

impl SqlEntity for Nomenclature {
    const TABLE: &'static str = "nomenclatures";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "kind",
        "active",
        "parent_id",
    ];
    const ORDER_BY: &'static str = NAMED_ORDER;

    fn to_params(&self) -> Vec<SqlParam> {
        vec![
            self.id.to_sql_param(),
            self.name.to_sql_param(),
            SqlParam::optional(self.description.as_ref()),
            self.kind.to_sql_param(),
            self.active.to_sql_param(),
            relation_param(&self.parent),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Nomenclature {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            kind: row.get("kind")?,
            active: row.get("active")?,
            parent: stub_column(row, "parent_id")?,
        })
    }
}

/// Columns holding nomenclature references, per table.
pub(crate) const NOMENCLATURE_REFERENCES: [(&str, &str); 10] = [
    ("employees", "district_id"),
    ("employees", "sub_district_id"),
    ("employees", "category_id"),
    ("employees", "scientific_degree_id"),
    ("students", "district_id"),
    ("students", "sub_district_id"),
    ("students", "kind_id"),
    ("students", "specialty_id"),
    ("students", "study_center_id"),
    ("nomenclatures", "parent_id"),
];
