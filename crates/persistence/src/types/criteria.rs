//! Per-entity criteria: one optional filter per queryable attribute.
//!
//! Criteria deserialize from camelCase JSON so callers can pass them through
//! any transport unchanged:
//!
//! ```
//! use roster_persistence::types::StudentCriteria;
//!
//! let criteria: StudentCriteria = serde_json::from_str(
//!     r#"{"classRoom": {"contains": "35"}, "universityYear": {"greaterThanOrEqual": 2}}"#,
//! ).unwrap();
//! assert_eq!(criteria.university_year.unwrap().greater_than_or_equal, Some(2));
//! ```
//!
//! Fields named `<relation>_id` filter on the foreign key; fields named
//! `<relation>_name` filter on the related entity's name through a join.

use serde::{Deserialize, Serialize};

use super::filter::{
    BooleanFilter, DateFilter, IdFilter, IntegerFilter, NomenclatureKindFilter, StringFilter,
};

/// Attributes shared by employees and students.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonCriteria {
    pub ci: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub last_name: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub address: Option<StringFilter>,
    pub gender: Option<StringFilter>,
    pub age: Option<IntegerFilter>,
    pub active: Option<BooleanFilter>,
    pub district_id: Option<IdFilter>,
    pub district_name: Option<StringFilter>,
    pub sub_district_id: Option<IdFilter>,
    pub sub_district_name: Option<StringFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmployeeCriteria {
    pub id: Option<IdFilter>,
    #[serde(flatten)]
    pub person: PersonCriteria,
    pub registry_number: Option<StringFilter>,
    pub start_date: Option<DateFilter>,
    pub is_important: Option<BooleanFilter>,
    pub category_id: Option<IdFilter>,
    pub category_name: Option<StringFilter>,
    pub scientific_degree_id: Option<IdFilter>,
    pub scientific_degree_name: Option<StringFilter>,
    pub work_place_id: Option<IdFilter>,
    pub work_place_name: Option<StringFilter>,
    /// Matches employees owning a phone with this number.
    pub phone_number: Option<IntegerFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentCriteria {
    pub id: Option<IdFilter>,
    #[serde(flatten)]
    pub person: PersonCriteria,
    pub class_room: Option<StringFilter>,
    pub university_year: Option<IntegerFilter>,
    pub residence: Option<StringFilter>,
    pub kind_id: Option<IdFilter>,
    pub kind_name: Option<StringFilter>,
    pub specialty_id: Option<IdFilter>,
    pub specialty_name: Option<StringFilter>,
    pub study_center_id: Option<IdFilter>,
    pub study_center_name: Option<StringFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkPlaceCriteria {
    pub id: Option<IdFilter>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub email: Option<StringFilter>,
    pub active: Option<BooleanFilter>,
    /// Matches workplaces with at least one employee of this name.
    pub employee_name: Option<StringFilter>,
    pub employee_ci: Option<StringFilter>,
    /// Matches workplaces with an employee in this category, two hops away.
    pub employee_category_name: Option<StringFilter>,
    pub phone_number: Option<IntegerFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhoneCriteria {
    pub id: Option<IdFilter>,
    pub number: Option<IntegerFilter>,
    pub description: Option<StringFilter>,
    pub active: Option<BooleanFilter>,
    pub employee_id: Option<IdFilter>,
    pub employee_name: Option<StringFilter>,
    pub work_place_id: Option<IdFilter>,
    pub work_place_name: Option<StringFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NomenclatureCriteria {
    pub id: Option<IdFilter>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub kind: Option<NomenclatureKindFilter>,
    pub active: Option<BooleanFilter>,
    pub parent_id: Option<IdFilter>,
    pub parent_name: Option<StringFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NomenclatureKind;
    use serde_json::json;

    #[test]
    fn test_person_fields_flatten() {
        let criteria: EmployeeCriteria = serde_json::from_value(json!({
            "name": {"contains": "ces"},
            "districtName": {"equals": "Centro"},
            "workPlaceName": {"specified": true}
        }))
        .unwrap();

        assert_eq!(
            criteria.person.name.as_ref().and_then(|f| f.contains.as_deref()),
            Some("ces")
        );
        assert!(criteria.person.district_name.is_some());
        assert_eq!(
            criteria.work_place_name.unwrap().filter.specified,
            Some(true)
        );
    }

    #[test]
    fn test_clone_is_deep() {
        let original = StudentCriteria {
            class_room: Some(StringFilter::contains("35")),
            ..StudentCriteria::default()
        };
        let mut copy = original.clone();
        copy.class_room = Some(StringFilter::contains("12"));
        assert_eq!(
            original.class_room.unwrap().contains.as_deref(),
            Some("35")
        );
    }

    #[test]
    fn test_nomenclature_kind_filter() {
        let criteria: NomenclatureCriteria =
            serde_json::from_value(json!({"kind": {"in": ["district", "sub-district"]}}))
                .unwrap();
        assert_eq!(
            criteria.kind.unwrap().in_list,
            Some(vec![NomenclatureKind::District, NomenclatureKind::SubDistrict])
        );
    }
}
