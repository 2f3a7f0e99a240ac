//! Compilation of each entity's criteria.

use crate::types::{
    Employee, EmployeeCriteria, Entity, Nomenclature, NomenclatureCriteria, PersonCriteria,
    Phone, PhoneCriteria, Student, StudentCriteria, WorkPlace, WorkPlaceCriteria,
};

use super::builder::{JoinHop, SpecificationBuilder};
use super::{JoinMode, Specification};

const DISTRICT: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "district_id")];
const SUB_DISTRICT: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "sub_district_id")];
const CATEGORY: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "category_id")];
const SCIENTIFIC_DEGREE: [JoinHop; 1] =
    [JoinHop::to_one("nomenclatures", "scientific_degree_id")];
const STUDENT_KIND: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "kind_id")];
const SPECIALTY: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "specialty_id")];
const STUDY_CENTER: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "study_center_id")];
const PARENT: [JoinHop; 1] = [JoinHop::to_one("nomenclatures", "parent_id")];

const EMPLOYEE_WORK_PLACE: [JoinHop; 1] = [JoinHop::to_one("work_places", "work_place_id")];
const EMPLOYEE_PHONES: [JoinHop; 1] = [JoinHop::to_many("phones", "employee_id")];

const WORK_PLACE_EMPLOYEES: [JoinHop; 1] = [JoinHop::to_many("employees", "work_place_id")];
const WORK_PLACE_EMPLOYEE_CATEGORY: [JoinHop; 2] = [
    JoinHop::to_many("employees", "work_place_id"),
    JoinHop::to_one("nomenclatures", "category_id"),
];
const WORK_PLACE_PHONES: [JoinHop; 1] = [JoinHop::to_many("phones", "work_place_id")];

const PHONE_EMPLOYEE: [JoinHop; 1] = [JoinHop::to_one("employees", "employee_id")];
const PHONE_WORK_PLACE: [JoinHop; 1] = [JoinHop::to_one("work_places", "work_place_id")];

/// A criteria object that compiles to a [`Specification`].
pub trait Criteria {
    /// Adds one predicate per active filter.
    fn apply(&self, builder: &mut SpecificationBuilder);

    /// Compiles the criteria, combining field predicates with `mode`.
    fn to_specification(&self, mode: JoinMode) -> Specification {
        let mut builder = SpecificationBuilder::new();
        self.apply(&mut builder);
        builder.build(mode)
    }
}

/// Criteria over the rows of one entity's table.
pub trait EntityCriteria: Criteria + Send + Sync {
    type Entity: Entity;
}

impl EntityCriteria for EmployeeCriteria {
    type Entity = Employee;
}

impl EntityCriteria for StudentCriteria {
    type Entity = Student;
}

impl EntityCriteria for WorkPlaceCriteria {
    type Entity = WorkPlace;
}

impl EntityCriteria for PhoneCriteria {
    type Entity = Phone;
}

impl EntityCriteria for NomenclatureCriteria {
    type Entity = Nomenclature;
}

impl Criteria for PersonCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.string("ci", self.ci.as_ref())
            .string("name", self.name.as_ref())
            .string("last_name", self.last_name.as_ref())
            .string("email", self.email.as_ref())
            .string("address", self.address.as_ref())
            .string("gender", self.gender.as_ref())
            .range("age", self.age.as_ref())
            .filter("active", self.active.as_ref())
            .filter("district_id", self.district_id.as_ref())
            .joined_string(&DISTRICT, "name", self.district_name.as_ref())
            .filter("sub_district_id", self.sub_district_id.as_ref())
            .joined_string(&SUB_DISTRICT, "name", self.sub_district_name.as_ref());
    }
}

impl Criteria for EmployeeCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.filter("id", self.id.as_ref());
        self.person.apply(b);
        b.string("registry_number", self.registry_number.as_ref())
            .range("start_date", self.start_date.as_ref())
            .filter("is_important", self.is_important.as_ref())
            .filter("category_id", self.category_id.as_ref())
            .joined_string(&CATEGORY, "name", self.category_name.as_ref())
            .filter("scientific_degree_id", self.scientific_degree_id.as_ref())
            .joined_string(
                &SCIENTIFIC_DEGREE,
                "name",
                self.scientific_degree_name.as_ref(),
            )
            .filter("work_place_id", self.work_place_id.as_ref())
            .joined_string(&EMPLOYEE_WORK_PLACE, "name", self.work_place_name.as_ref())
            .joined_range(&EMPLOYEE_PHONES, "number", self.phone_number.as_ref());
    }
}

impl Criteria for StudentCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.filter("id", self.id.as_ref());
        self.person.apply(b);
        b.string("class_room", self.class_room.as_ref())
            .range("university_year", self.university_year.as_ref())
            .string("residence", self.residence.as_ref())
            .filter("kind_id", self.kind_id.as_ref())
            .joined_string(&STUDENT_KIND, "name", self.kind_name.as_ref())
            .filter("specialty_id", self.specialty_id.as_ref())
            .joined_string(&SPECIALTY, "name", self.specialty_name.as_ref())
            .filter("study_center_id", self.study_center_id.as_ref())
            .joined_string(&STUDY_CENTER, "name", self.study_center_name.as_ref());
    }
}

impl Criteria for WorkPlaceCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.filter("id", self.id.as_ref())
            .string("name", self.name.as_ref())
            .string("description", self.description.as_ref())
            .string("email", self.email.as_ref())
            .filter("active", self.active.as_ref())
            .joined_string(&WORK_PLACE_EMPLOYEES, "name", self.employee_name.as_ref())
            .joined_string(&WORK_PLACE_EMPLOYEES, "ci", self.employee_ci.as_ref())
            .joined_string(
                &WORK_PLACE_EMPLOYEE_CATEGORY,
                "name",
                self.employee_category_name.as_ref(),
            )
            .joined_range(&WORK_PLACE_PHONES, "number", self.phone_number.as_ref());
    }
}

impl Criteria for PhoneCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.filter("id", self.id.as_ref())
            .range("number", self.number.as_ref())
            .string("description", self.description.as_ref())
            .filter("active", self.active.as_ref())
            .filter("employee_id", self.employee_id.as_ref())
            .joined_string(&PHONE_EMPLOYEE, "name", self.employee_name.as_ref())
            .filter("work_place_id", self.work_place_id.as_ref())
            .joined_string(&PHONE_WORK_PLACE, "name", self.work_place_name.as_ref());
    }
}

impl Criteria for NomenclatureCriteria {
    fn apply(&self, b: &mut SpecificationBuilder) {
        b.filter("id", self.id.as_ref())
            .string("name", self.name.as_ref())
            .string("description", self.description.as_ref())
            .filter("kind", self.kind.as_ref())
            .filter("active", self.active.as_ref())
            .filter("parent_id", self.parent_id.as_ref())
            .joined_string(&PARENT, "name", self.parent_name.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::SqlParam;
    use crate::types::{
        EntityId, Filter, IntegerFilter, NomenclatureKind, RangeFilter, StringFilter,
    };

    #[test]
    fn test_empty_criteria_is_unrestricted() {
        assert!(
            EmployeeCriteria::default()
                .to_specification(JoinMode::And)
                .is_unrestricted()
        );
        assert!(
            NomenclatureCriteria::default()
                .to_specification(JoinMode::Or)
                .is_unrestricted()
        );
    }

    #[test]
    fn test_student_contains_and_range() {
        let criteria = StudentCriteria {
            class_room: Some(StringFilter::contains("35")),
            university_year: Some(IntegerFilter::greater_than_or_equal(2)),
            ..StudentCriteria::default()
        };
        let spec = criteria.to_specification(JoinMode::And);
        assert_eq!(
            spec.params(),
            &[SqlParam::string("%35%"), SqlParam::integer(2)]
        );
        assert!(spec.where_clause().contains(") AND ("));
    }

    #[test]
    fn test_person_fields_apply_to_employee() {
        let mut criteria = EmployeeCriteria::default();
        criteria.person.district_name = Some(StringFilter::equals("Centro"));
        criteria.work_place_name = Some(StringFilter::contains("lab"));
        let spec = criteria.to_specification(JoinMode::Or);
        let sql = spec.where_clause();

        assert!(sql.contains("FROM nomenclatures j1_0 WHERE j1_0.id = t0.district_id"));
        assert!(sql.contains("FROM work_places j2_0 WHERE j2_0.id = t0.work_place_id"));
        assert!(sql.contains(") OR ("));
    }

    #[test]
    fn test_work_place_reverse_join() {
        let criteria = WorkPlaceCriteria {
            employee_name: Some(StringFilter::equals("Cesar")),
            ..WorkPlaceCriteria::default()
        };
        let sql = criteria.to_specification(JoinMode::And).where_clause();
        assert_eq!(
            sql,
            "WHERE EXISTS (SELECT 1 FROM employees j1_0 WHERE j1_0.work_place_id = t0.id AND (j1_0.name = ?))"
        );
    }

    #[test]
    fn test_range_bounds_stay_conjunctive_under_or() {
        let criteria = PhoneCriteria {
            number: Some(RangeFilter {
                greater_than: Some(100),
                less_than: Some(200),
                ..RangeFilter::default()
            }),
            active: Some(Filter::equals(true)),
            ..PhoneCriteria::default()
        };
        let sql = criteria.to_specification(JoinMode::Or).where_clause();
        assert_eq!(
            sql,
            "WHERE (t0.number > ? AND t0.number < ?) OR (t0.active = ?)"
        );
    }

    #[test]
    fn test_nomenclature_siblings() {
        let parent = EntityId::new();
        let criteria = NomenclatureCriteria {
            name: Some(StringFilter::equals("Centro")),
            kind: Some(Filter::equals(NomenclatureKind::SubDistrict)),
            parent_id: Some(Filter::equals(parent)),
            ..NomenclatureCriteria::default()
        };
        let spec = criteria.to_specification(JoinMode::And);
        assert_eq!(
            spec.where_clause(),
            "WHERE (t0.name = ?) AND (t0.kind = ?) AND (t0.parent_id = ?)"
        );
        assert_eq!(spec.params()[2], SqlParam::String(parent.to_string()));
    }
}
