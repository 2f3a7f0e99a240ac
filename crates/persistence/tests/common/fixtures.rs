//! A small seeded roster shared by the scenario tests.
//!
//! ```text
//! Centro (district)
//! └── Norte (sub-district)
//!     └── Norte-A (sub-district)
//! Profesor (category)
//!
//! Rectorado ── Cesar (Profesor, Centro / Norte)
//!     │           ├── exclusive phone 5550001
//!     └───────────┴── shared phone 5550002
//! ```

use roster_persistence::backends::sqlite::SqliteBackend;
use roster_persistence::service::PersonnelService;
use roster_persistence::types::{
    Employee, EmployeeDto, EntityId, Nomenclature, NomenclatureDto, NomenclatureKind, Phone,
    PhoneDto, StudentDto, WorkPlace, WorkPlaceDto,
};

pub const EXCLUSIVE_NUMBER: i64 = 5550001;
pub const SHARED_NUMBER: i64 = 5550002;

/// Ids of the seeded entities.
#[derive(Debug, Clone)]
pub struct Roster {
    pub centro: Nomenclature,
    pub norte: Nomenclature,
    pub norte_a: Nomenclature,
    pub profesor: Nomenclature,
    pub rectorado: WorkPlace,
    pub cesar: Employee,
    pub exclusive_phone: Phone,
    pub shared_phone: Phone,
}

pub async fn nomenclature(
    service: &PersonnelService<SqliteBackend>,
    name: &str,
    kind: NomenclatureKind,
    parent: Option<EntityId>,
) -> Nomenclature {
    let mut dto = NomenclatureDto::new(name, kind);
    dto.parent_id = parent;
    service
        .save_nomenclature(dto)
        .await
        .unwrap_or_else(|e| panic!("failed to seed nomenclature {name}: {e}"))
}

/// Builds the employee payload for Cesar, the seeded employee.
pub fn cesar_dto(roster: &Roster) -> EmployeeDto {
    let mut dto = EmployeeDto::new("85010112345", "Cesar");
    dto.id = Some(roster.cesar.id);
    dto.person.last_name = Some("Diaz".to_string());
    dto.person.district_id = Some(roster.centro.id);
    dto.person.sub_district_id = Some(roster.norte.id);
    dto.category_id = Some(roster.profesor.id);
    dto.work_place_id = Some(roster.rectorado.id);
    dto
}

pub async fn seed_roster(service: &PersonnelService<SqliteBackend>) -> Roster {
    let centro = nomenclature(service, "Centro", NomenclatureKind::District, None).await;
    let norte = nomenclature(service, "Norte", NomenclatureKind::SubDistrict, Some(centro.id)).await;
    let norte_a =
        nomenclature(service, "Norte-A", NomenclatureKind::SubDistrict, Some(norte.id)).await;
    let profesor = nomenclature(service, "Profesor", NomenclatureKind::Category, None).await;

    let rectorado = service
        .save_work_place(WorkPlaceDto {
            email: Some("rectorado@example.org".to_string()),
            ..WorkPlaceDto::new("Rectorado")
        })
        .await
        .expect("failed to seed workplace");

    let mut dto = EmployeeDto::new("85010112345", "Cesar");
    dto.person.last_name = Some("Diaz".to_string());
    dto.person.district_id = Some(centro.id);
    dto.person.sub_district_id = Some(norte.id);
    dto.category_id = Some(profesor.id);
    dto.work_place_id = Some(rectorado.id);
    let cesar = service
        .save_employee(dto)
        .await
        .expect("failed to seed employee");

    let exclusive_phone = service
        .save_phone(PhoneDto {
            description: Some("office".to_string()),
            employee_id: Some(cesar.id),
            ..PhoneDto::new(EXCLUSIVE_NUMBER)
        })
        .await
        .expect("failed to seed exclusive phone");

    let shared_phone = service
        .save_phone(PhoneDto {
            description: Some("front desk".to_string()),
            employee_id: Some(cesar.id),
            work_place_id: Some(rectorado.id),
            ..PhoneDto::new(SHARED_NUMBER)
        })
        .await
        .expect("failed to seed shared phone");

    Roster {
        centro,
        norte,
        norte_a,
        profesor,
        rectorado,
        cesar,
        exclusive_phone,
        shared_phone,
    }
}

/// Saves students with the given class rooms and university years.
pub async fn seed_students(
    service: &PersonnelService<SqliteBackend>,
    rows: &[(&str, &str, i32)],
) -> Vec<EntityId> {
    let mut ids = Vec::with_capacity(rows.len());
    for (i, (name, class_room, year)) in rows.iter().enumerate() {
        let mut dto = StudentDto::new(format!("9001{i:04}"), *name);
        dto.class_room = Some(class_room.to_string());
        dto.university_year = Some(*year);
        let student = service
            .save_student(dto)
            .await
            .unwrap_or_else(|e| panic!("failed to seed student {name}: {e}"));
        ids.push(student.id);
    }
    ids
}
