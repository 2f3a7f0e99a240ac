//! Index document shapes and the entity → document mapping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::types::{
    Employee, Entity, EntityId, Nomenclature, NomenclatureKind, Person, Phone, Relation, Student,
    WorkPlace,
};

/// An entity that has a document in the index.
pub trait Projectable: Entity {
    type Document: Serialize;

    /// Flattens the entity into its document.
    fn to_document(&self) -> Self::Document;
}

/// Projects an entity into its JSON document.
pub fn to_document<E: Projectable>(entity: &E) -> SyncResult<Value> {
    to_json(E::KIND.as_str(), &entity.to_document())
}

pub(crate) fn to_json<T: Serialize>(kind: &str, value: &T) -> SyncResult<Value> {
    serde_json::to_value(value).map_err(|e| SyncError::InvalidMapping {
        message: format!("failed to serialize {kind} document: {e}"),
    })
}

/// Name and id of a referenced nomenclature.
///
/// A stub keeps its id with no name. An inactive nomenclature is treated
/// as absent.
fn nomenclature_ref(relation: &Option<Relation<Nomenclature>>) -> (Option<String>, Option<EntityId>) {
    match relation {
        None => (None, None),
        Some(Relation::Stub(id)) => (None, Some(*id)),
        Some(Relation::Loaded(n)) if n.active => (Some(n.name.clone()), Some(n.id)),
        Some(Relation::Loaded(_)) => (None, None),
    }
}

/// Person fields shared by employee and student documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFields {
    pub ci: String,
    pub name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub active: bool,
    pub district: Option<String>,
    pub district_id: Option<EntityId>,
    pub sub_district: Option<String>,
    pub sub_district_id: Option<EntityId>,
}

impl From<&Person> for PersonFields {
    fn from(person: &Person) -> Self {
        let (district, district_id) = nomenclature_ref(&person.district);
        let (sub_district, sub_district_id) = nomenclature_ref(&person.sub_district);
        Self {
            ci: person.ci.clone(),
            name: person.name.clone(),
            last_name: person.last_name.clone(),
            email: person.email.clone(),
            address: person.address.clone(),
            gender: person.gender.clone(),
            age: person.age,
            active: person.active,
            district,
            district_id,
            sub_district,
            sub_district_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDocument {
    pub id: EntityId,
    #[serde(flatten)]
    pub person: PersonFields,
    pub registry_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub is_important: bool,
    pub category: Option<String>,
    pub category_id: Option<EntityId>,
    pub scientific_degree: Option<String>,
    pub scientific_degree_id: Option<EntityId>,
    pub work_place: Option<String>,
    pub work_place_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDocument {
    pub id: EntityId,
    #[serde(flatten)]
    pub person: PersonFields,
    pub class_room: Option<String>,
    pub university_year: Option<i32>,
    pub residence: Option<String>,
    pub kind: Option<String>,
    pub kind_id: Option<EntityId>,
    pub specialty: Option<String>,
    pub specialty_id: Option<EntityId>,
    pub study_center: Option<String>,
    pub study_center_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPlaceDocument {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub employees: Vec<EmployeeSummary>,
    pub phones: Vec<PhoneSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneDocument {
    pub id: EntityId,
    pub number: i64,
    pub description: Option<String>,
    pub active: bool,
    pub employee: Option<EmployeeSummary>,
    pub work_place: Option<WorkPlaceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NomenclatureDocument {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub kind: NomenclatureKind,
    pub active: bool,
    pub parent: Option<String>,
    pub parent_id: Option<EntityId>,
}

/// Employee fields embedded in workplace and phone documents.
///
/// Carries no workplace data, which cuts the workplace ↔ employee cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub id: EntityId,
    pub ci: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<EntityId>,
}

impl EmployeeSummary {
    /// Field set copied into embedding documents.
    pub const FIELDS: &'static [&'static str] = &[
        "id",
        "ci",
        "name",
        "last_name",
        "email",
        "category",
        "category_id",
    ];

    fn stub(id: EntityId) -> Self {
        Self {
            id,
            ci: None,
            name: None,
            last_name: None,
            email: None,
            category: None,
            category_id: None,
        }
    }
}

impl From<&Employee> for EmployeeSummary {
    fn from(employee: &Employee) -> Self {
        let (category, category_id) = nomenclature_ref(&employee.category);
        Self {
            id: employee.id,
            ci: Some(employee.person.ci.clone()),
            name: Some(employee.person.name.clone()),
            last_name: employee.person.last_name.clone(),
            email: employee.person.email.clone(),
            category,
            category_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneSummary {
    pub id: EntityId,
    pub number: i64,
    pub description: Option<String>,
}

impl PhoneSummary {
    pub const FIELDS: &'static [&'static str] = &["id", "number", "description"];
}

impl From<&Phone> for PhoneSummary {
    fn from(phone: &Phone) -> Self {
        Self {
            id: phone.id,
            number: phone.number,
            description: phone.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPlaceSummary {
    pub id: EntityId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl WorkPlaceSummary {
    pub const FIELDS: &'static [&'static str] = &["id", "name", "email"];

    fn stub(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            email: None,
        }
    }
}

impl From<&WorkPlace> for WorkPlaceSummary {
    fn from(work_place: &WorkPlace) -> Self {
        Self {
            id: work_place.id,
            name: Some(work_place.name.clone()),
            email: work_place.email.clone(),
        }
    }
}

/// Fields of a nomenclature copied into referencing documents.
pub const NOMENCLATURE_SUMMARY_FIELDS: &[&str] = &["id", "name"];

impl Projectable for Employee {
    type Document = EmployeeDocument;

    fn to_document(&self) -> EmployeeDocument {
        let (category, category_id) = nomenclature_ref(&self.category);
        let (scientific_degree, scientific_degree_id) = nomenclature_ref(&self.scientific_degree);
        let (work_place, work_place_id) = match &self.work_place {
            None => (None, None),
            Some(Relation::Stub(id)) => (None, Some(*id)),
            Some(Relation::Loaded(w)) => (Some(w.name.clone()), Some(w.id)),
        };
        EmployeeDocument {
            id: self.id,
            person: PersonFields::from(&self.person),
            registry_number: self.registry_number.clone(),
            start_date: self.start_date,
            is_important: self.is_important,
            category,
            category_id,
            scientific_degree,
            scientific_degree_id,
            work_place,
            work_place_id,
        }
    }
}

impl Projectable for Student {
    type Document = StudentDocument;

    fn to_document(&self) -> StudentDocument {
        let (kind, kind_id) = nomenclature_ref(&self.kind);
        let (specialty, specialty_id) = nomenclature_ref(&self.specialty);
        let (study_center, study_center_id) = nomenclature_ref(&self.study_center);
        StudentDocument {
            id: self.id,
            person: PersonFields::from(&self.person),
            class_room: self.class_room.clone(),
            university_year: self.university_year,
            residence: self.residence.clone(),
            kind,
            kind_id,
            specialty,
            specialty_id,
            study_center,
            study_center_id,
        }
    }
}

impl Projectable for WorkPlace {
    type Document = WorkPlaceDocument;

    /// Inactive phones are left out; they have no document of their own
    /// either.
    fn to_document(&self) -> WorkPlaceDocument {
        WorkPlaceDocument {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            email: self.email.clone(),
            active: self.active,
            employees: self.employees.iter().map(EmployeeSummary::from).collect(),
            phones: self
                .phones
                .iter()
                .filter(|p| p.active)
                .map(PhoneSummary::from)
                .collect(),
        }
    }
}

impl Projectable for Phone {
    type Document = PhoneDocument;

    fn to_document(&self) -> PhoneDocument {
        PhoneDocument {
            id: self.id,
            number: self.number,
            description: self.description.clone(),
            active: self.active,
            employee: self.employee.as_ref().map(|r| match r {
                Relation::Stub(id) => EmployeeSummary::stub(*id),
                Relation::Loaded(e) => EmployeeSummary::from(e.as_ref()),
            }),
            work_place: self.work_place.as_ref().map(|r| match r {
                Relation::Stub(id) => WorkPlaceSummary::stub(*id),
                Relation::Loaded(w) => WorkPlaceSummary::from(w.as_ref()),
            }),
        }
    }
}

impl Projectable for Nomenclature {
    type Document = NomenclatureDocument;

    fn to_document(&self) -> NomenclatureDocument {
        let (parent, parent_id) = nomenclature_ref(&self.parent);
        NomenclatureDocument {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind,
            active: self.active,
            parent,
            parent_id,
        }
    }
}

/// Keeps only `fields` of a serialized summary.
pub(crate) fn select_fields(summary: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|f| summary.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> Nomenclature {
        Nomenclature::new(name, NomenclatureKind::Category)
    }

    #[test]
    fn test_employee_document_flattens_references() {
        let doctor = category("Doctor");
        let lab = WorkPlace::new("Lab");
        let mut employee = Employee::new(Person::new("850101", "Cesar"));
        employee.category = Some(Relation::loaded(doctor.clone()));
        employee.work_place = Some(Relation::loaded(lab.clone()));

        let doc = to_document(&employee).unwrap();
        assert_eq!(doc["name"], "Cesar");
        assert_eq!(doc["category"], "Doctor");
        assert_eq!(doc["category_id"], doctor.id.to_string());
        assert_eq!(doc["work_place"], "Lab");
        assert_eq!(doc["work_place_id"], lab.id.to_string());
        assert!(doc["district"].is_null());
        assert!(doc.get("person").is_none());
    }

    #[test]
    fn test_stub_keeps_id_without_name() {
        let id = EntityId::new();
        let mut employee = Employee::new(Person::new("1", "Ana"));
        employee.category = Some(Relation::Stub(id));

        let doc = to_document(&employee).unwrap();
        assert!(doc["category"].is_null());
        assert_eq!(doc["category_id"], id.to_string());
    }

    #[test]
    fn test_inactive_nomenclature_is_absent() {
        let mut retired = category("Retired");
        retired.active = false;
        let mut employee = Employee::new(Person::new("1", "Ana"));
        employee.category = Some(Relation::loaded(retired));

        let doc = to_document(&employee).unwrap();
        assert!(doc["category"].is_null());
        assert!(doc["category_id"].is_null());
    }

    #[test]
    fn test_work_place_document_embeds_summaries() {
        let mut lab = WorkPlace::new("Lab");
        let mut employee = Employee::new(Person::new("1", "Cesar"));
        employee.work_place = Some(Relation::Stub(lab.id));
        let mut inactive = Phone::new(999);
        inactive.active = false;
        lab.employees = vec![employee.clone()];
        lab.phones = vec![Phone::new(5551234), inactive];

        let doc = to_document(&lab).unwrap();
        assert_eq!(doc["employees"][0]["name"], "Cesar");
        assert!(doc["employees"][0].get("work_place").is_none());
        assert_eq!(doc["phones"].as_array().unwrap().len(), 1);
        assert_eq!(doc["phones"][0]["number"], 5551234);
    }

    #[test]
    fn test_phone_document_embeds_owners() {
        let employee = Employee::new(Person::new("1", "Cesar"));
        let mut phone = Phone::new(5551234);
        phone.employee = Some(Relation::loaded(employee.clone()));
        phone.work_place = Some(Relation::Stub(EntityId::new()));

        let doc = to_document(&phone).unwrap();
        assert_eq!(doc["employee"]["name"], "Cesar");
        assert_eq!(doc["employee"]["id"], employee.id.to_string());
        assert!(doc["work_place"]["name"].is_null());
    }

    #[test]
    fn test_summary_field_sets_match_serialization() {
        fn keys(value: Value) -> Vec<String> {
            let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
        fn sorted(fields: &[&str]) -> Vec<String> {
            let mut fields: Vec<_> = fields.iter().map(|f| f.to_string()).collect();
            fields.sort();
            fields
        }

        let employee = Employee::new(Person::new("1", "Ana"));
        let summary = serde_json::to_value(EmployeeSummary::from(&employee)).unwrap();
        assert_eq!(keys(summary), sorted(EmployeeSummary::FIELDS));

        let phone = serde_json::to_value(PhoneSummary::from(&Phone::new(1))).unwrap();
        assert_eq!(keys(phone), sorted(PhoneSummary::FIELDS));

        let lab = serde_json::to_value(WorkPlaceSummary::from(&WorkPlace::new("Lab"))).unwrap();
        assert_eq!(keys(lab), sorted(WorkPlaceSummary::FIELDS));
    }

    #[test]
    fn test_nomenclature_document() {
        let parent = Nomenclature::new("Centro", NomenclatureKind::District);
        let mut child = Nomenclature::new("Norte", NomenclatureKind::SubDistrict);
        child.parent = Some(Relation::loaded(parent.clone()));

        let doc = to_document(&child).unwrap();
        assert_eq!(doc["kind"], "sub-district");
        assert_eq!(doc["parent"], "Centro");
        assert_eq!(doc["parent_id"], parent.id.to_string());
    }
}
