//! Relational entities and their identities.
//!
//! Entities reference each other by [`EntityId`]. A reference that has not
//! been loaded yet is a [`Relation::Stub`]; the write path replaces every stub
//! with the full related entity ([`Relation::Loaded`]) before committing.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A stable, opaque entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The kinds of entity the system persists.
///
/// Every kind owns exactly one relational table and one index kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employee,
    Student,
    WorkPlace,
    Phone,
    Nomenclature,
}

impl EntityKind {
    /// All kinds, in dependency order (referenced kinds first).
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Nomenclature,
        EntityKind::WorkPlace,
        EntityKind::Employee,
        EntityKind::Student,
        EntityKind::Phone,
    ];

    /// Returns the snake_case name used for index names and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Employee => "employee",
            EntityKind::Student => "student",
            EntityKind::WorkPlace => "work_place",
            EntityKind::Phone => "phone",
            EntityKind::Nomenclature => "nomenclature",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "employee" => Ok(EntityKind::Employee),
            "student" => Ok(EntityKind::Student),
            "work_place" | "workplace" => Ok(EntityKind::WorkPlace),
            "phone" => Ok(EntityKind::Phone),
            "nomenclature" => Ok(EntityKind::Nomenclature),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Common behaviour of every persisted entity.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The kind of this entity.
    const KIND: EntityKind;

    /// Returns the entity's identifier.
    fn id(&self) -> EntityId;

    /// Returns the name copied into documents that reference this entity.
    fn display_name(&self) -> &str;
}

/// A reference to another entity, either a bare id or the loaded entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation<T> {
    /// Only the foreign key is known.
    Stub(EntityId),
    /// The related entity has been fetched.
    Loaded(Box<T>),
}

impl<T: Entity> Relation<T> {
    /// Wraps a loaded entity.
    pub fn loaded(entity: T) -> Self {
        Relation::Loaded(Box::new(entity))
    }

    /// Returns the referenced id regardless of load state.
    pub fn id(&self) -> EntityId {
        match self {
            Relation::Stub(id) => *id,
            Relation::Loaded(entity) => entity.id(),
        }
    }

    /// Returns the loaded entity, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Relation::Stub(_) => None,
            Relation::Loaded(entity) => Some(entity),
        }
    }

    /// Returns true if only the id is known.
    pub fn is_stub(&self) -> bool {
        matches!(self, Relation::Stub(_))
    }

    /// Returns the related display name when loaded.
    pub fn display_name(&self) -> Option<&str> {
        self.get().map(|entity| entity.display_name())
    }
}

/// Returns the id of an optional relation.
pub fn relation_id<T: Entity>(relation: &Option<Relation<T>>) -> Option<EntityId> {
    relation.as_ref().map(Relation::id)
}

/// The attributes shared by employees and students.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    /// National identity number.
    pub ci: String,
    pub name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub active: bool,
    pub district: Option<Relation<Nomenclature>>,
    pub sub_district: Option<Relation<Nomenclature>>,
}

impl Person {
    /// Creates an active person with only the required fields set.
    pub fn new(ci: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ci: ci.into(),
            name: name.into(),
            last_name: None,
            email: None,
            address: None,
            gender: None,
            age: None,
            active: true,
            district: None,
            sub_district: None,
        }
    }
}

/// An employee: a person bound to a workplace.
#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: EntityId,
    pub person: Person,
    pub registry_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub is_important: bool,
    pub category: Option<Relation<Nomenclature>>,
    pub scientific_degree: Option<Relation<Nomenclature>>,
    pub work_place: Option<Relation<WorkPlace>>,
}

impl Employee {
    pub fn new(person: Person) -> Self {
        Self {
            id: EntityId::new(),
            person,
            registry_number: None,
            start_date: None,
            is_important: false,
            category: None,
            scientific_degree: None,
            work_place: None,
        }
    }
}

impl Entity for Employee {
    const KIND: EntityKind = EntityKind::Employee;

    fn id(&self) -> EntityId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.person.name
    }
}

/// A student: a person enrolled at a study center.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: EntityId,
    pub person: Person,
    pub class_room: Option<String>,
    pub university_year: Option<i32>,
    pub residence: Option<String>,
    pub kind: Option<Relation<Nomenclature>>,
    pub specialty: Option<Relation<Nomenclature>>,
    pub study_center: Option<Relation<Nomenclature>>,
}

impl Student {
    pub fn new(person: Person) -> Self {
        Self {
            id: EntityId::new(),
            person,
            class_room: None,
            university_year: None,
            residence: None,
            kind: None,
            specialty: None,
            study_center: None,
        }
    }
}

impl Entity for Student {
    const KIND: EntityKind = EntityKind::Student;

    fn id(&self) -> EntityId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.person.name
    }
}

/// A workplace.
///
/// `employees` and `phones` are reverse relations. They are filled when the
/// full graph is loaded and are never written as columns. Employees in the
/// graph carry their workplace as a stub so the graph stays acyclic.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkPlace {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub employees: Vec<Employee>,
    pub phones: Vec<Phone>,
}

impl WorkPlace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            description: None,
            email: None,
            active: true,
            employees: Vec::new(),
            phones: Vec::new(),
        }
    }
}

impl Entity for WorkPlace {
    const KIND: EntityKind = EntityKind::WorkPlace;

    fn id(&self) -> EntityId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// A phone number owned by an employee, a workplace, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct Phone {
    pub id: EntityId,
    pub number: i64,
    pub description: Option<String>,
    pub active: bool,
    pub employee: Option<Relation<Employee>>,
    pub work_place: Option<Relation<WorkPlace>>,
}

impl Phone {
    pub fn new(number: i64) -> Self {
        Self {
            id: EntityId::new(),
            number,
            description: None,
            active: true,
            employee: None,
            work_place: None,
        }
    }

    /// Returns true if the phone has at least one owner.
    pub fn has_owner(&self) -> bool {
        self.employee.is_some() || self.work_place.is_some()
    }
}

impl Entity for Phone {
    const KIND: EntityKind = EntityKind::Phone;

    fn id(&self) -> EntityId {
        self.id
    }

    fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Discriminates the lookup lists held in the nomenclature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NomenclatureKind {
    District,
    SubDistrict,
    Category,
    ScientificDegree,
    Specialty,
    StudentKind,
    StudyCenter,
}

impl NomenclatureKind {
    pub const ALL: [NomenclatureKind; 7] = [
        NomenclatureKind::District,
        NomenclatureKind::SubDistrict,
        NomenclatureKind::Category,
        NomenclatureKind::ScientificDegree,
        NomenclatureKind::Specialty,
        NomenclatureKind::StudentKind,
        NomenclatureKind::StudyCenter,
    ];

    /// Returns the stored discriminator value.
    pub fn as_str(&self) -> &'static str {
        match self {
            NomenclatureKind::District => "district",
            NomenclatureKind::SubDistrict => "sub-district",
            NomenclatureKind::Category => "category",
            NomenclatureKind::ScientificDegree => "scientific-degree",
            NomenclatureKind::Specialty => "specialty",
            NomenclatureKind::StudentKind => "student-kind",
            NomenclatureKind::StudyCenter => "study-center",
        }
    }
}

impl fmt::Display for NomenclatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NomenclatureKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NomenclatureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidCriteria {
                field: "kind".to_string(),
                message: format!("unknown nomenclature kind '{s}'"),
            })
    }
}

/// An entry of a lookup list, optionally nested under a parent entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Nomenclature {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub kind: NomenclatureKind,
    pub active: bool,
    pub parent: Option<Relation<Nomenclature>>,
}

impl Nomenclature {
    pub fn new(name: impl Into<String>, kind: NomenclatureKind) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            description: None,
            kind,
            active: true,
            parent: None,
        }
    }
}

impl Entity for Nomenclature {
    const KIND: EntityKind = EntityKind::Nomenclature;

    fn id(&self) -> EntityId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
