//! Flat write payloads.
//!
//! A DTO names its relations by id only. Converting one into an entity yields
//! [`Relation::Stub`] references which the write path resolves before commit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{
    Employee, EntityId, Nomenclature, NomenclatureKind, Person, Phone, Relation, Student,
    WorkPlace,
};

fn default_active() -> bool {
    true
}

fn stub<T>(id: Option<EntityId>) -> Option<Relation<T>> {
    id.map(Relation::Stub)
}

/// Person attributes of an employee or student payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDto {
    #[serde(default)]
    pub ci: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub district_id: Option<EntityId>,
    #[serde(default)]
    pub sub_district_id: Option<EntityId>,
}

impl PersonDto {
    pub fn new(ci: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ci: ci.into(),
            name: name.into(),
            active: true,
            ..Self::default()
        }
    }

    fn into_person(self) -> Person {
        Person {
            ci: self.ci,
            name: self.name,
            last_name: self.last_name,
            email: self.email,
            address: self.address,
            gender: self.gender,
            age: self.age,
            active: self.active,
            district: stub(self.district_id),
            sub_district: stub(self.sub_district_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDto {
    /// Present when updating an existing employee.
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub person: PersonDto,
    #[serde(default)]
    pub registry_number: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub category_id: Option<EntityId>,
    #[serde(default)]
    pub scientific_degree_id: Option<EntityId>,
    #[serde(default)]
    pub work_place_id: Option<EntityId>,
}

impl EmployeeDto {
    pub fn new(ci: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            person: PersonDto::new(ci, name),
            ..Self::default()
        }
    }

    /// Builds the entity with stub references, keeping `id` if provided.
    pub fn into_entity(self) -> Employee {
        Employee {
            id: self.id.unwrap_or_default(),
            person: self.person.into_person(),
            registry_number: self.registry_number,
            start_date: self.start_date,
            is_important: self.is_important,
            category: stub(self.category_id),
            scientific_degree: stub(self.scientific_degree_id),
            work_place: stub(self.work_place_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDto {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub person: PersonDto,
    #[serde(default)]
    pub class_room: Option<String>,
    #[serde(default)]
    pub university_year: Option<i32>,
    #[serde(default)]
    pub residence: Option<String>,
    #[serde(default)]
    pub kind_id: Option<EntityId>,
    #[serde(default)]
    pub specialty_id: Option<EntityId>,
    #[serde(default)]
    pub study_center_id: Option<EntityId>,
}

impl StudentDto {
    pub fn new(ci: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            person: PersonDto::new(ci, name),
            ..Self::default()
        }
    }

    pub fn into_entity(self) -> Student {
        Student {
            id: self.id.unwrap_or_default(),
            person: self.person.into_person(),
            class_room: self.class_room,
            university_year: self.university_year,
            residence: self.residence,
            kind: stub(self.kind_id),
            specialty: stub(self.specialty_id),
            study_center: stub(self.study_center_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPlaceDto {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl WorkPlaceDto {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            ..Self::default()
        }
    }

    pub fn into_entity(self) -> WorkPlace {
        WorkPlace {
            id: self.id.unwrap_or_default(),
            name: self.name,
            description: self.description,
            email: self.email,
            active: self.active,
            employees: Vec::new(),
            phones: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneDto {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub employee_id: Option<EntityId>,
    #[serde(default)]
    pub work_place_id: Option<EntityId>,
}

impl PhoneDto {
    pub fn new(number: i64) -> Self {
        Self {
            number,
            active: true,
            ..Self::default()
        }
    }

    pub fn into_entity(self) -> Phone {
        Phone {
            id: self.id.unwrap_or_default(),
            number: self.number,
            description: self.description,
            active: self.active,
            employee: stub(self.employee_id),
            work_place: stub(self.work_place_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NomenclatureDto {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: NomenclatureKind,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
}

impl NomenclatureDto {
    pub fn new(name: impl Into<String>, kind: NomenclatureKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            kind,
            active: true,
            parent_id: None,
        }
    }

    pub fn into_entity(self) -> Nomenclature {
        Nomenclature {
            id: self.id.unwrap_or_default(),
            name: self.name,
            description: self.description,
            kind: self.kind,
            active: self.active,
            parent: stub(self.parent_id),
        }
    }
}
