//! Core types for the persistence layer.
//!
//! - [`Employee`], [`Student`], [`WorkPlace`], [`Phone`], [`Nomenclature`] - relational entities
//! - [`Filter`], [`StringFilter`], [`RangeFilter`] - typed predicate descriptors
//! - [`EmployeeCriteria`] and friends - per-entity bags of filters
//! - [`EmployeeDto`] and friends - flat write payloads
//! - [`PageRequest`] - offset paging
//!
//! # Examples
//!
//! ```
//! use roster_persistence::types::{EmployeeCriteria, IntegerFilter, StringFilter};
//!
//! let mut criteria = EmployeeCriteria::default();
//! criteria.person.name = Some(StringFilter::contains("cesar"));
//! criteria.person.age = Some(IntegerFilter::between(30, 40));
//! assert!(criteria.work_place_name.is_none());
//! ```

mod criteria;
mod dto;
mod entity;
mod filter;
mod pagination;

pub use criteria::{
    EmployeeCriteria, NomenclatureCriteria, PersonCriteria, PhoneCriteria, StudentCriteria,
    WorkPlaceCriteria,
};
pub use dto::{EmployeeDto, NomenclatureDto, PersonDto, PhoneDto, StudentDto, WorkPlaceDto};
pub use entity::{
    Employee, Entity, EntityId, EntityKind, Nomenclature, NomenclatureKind, Person, Phone,
    Relation, Student, WorkPlace, relation_id,
};
pub use filter::{
    BooleanFilter, Bound, Clause, DateFilter, Filter, IdFilter, IntegerFilter,
    NomenclatureKindFilter, RangeClause, RangeFilter, StringFilter,
};
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest};
