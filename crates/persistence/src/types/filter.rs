//! Typed predicate descriptors for criteria fields.
//!
//! A filter describes the predicates a caller wants on one attribute. Only one
//! predicate kind is honoured per field; [`Filter::clause`],
//! [`StringFilter::clause`] and [`RangeFilter::clause`] resolve which one.
//!
//! # Precedence
//!
//! | Filter        | Order                                                                  |
//! |---------------|------------------------------------------------------------------------|
//! | `Filter`      | equals, in, notIn, notEquals, specified                                |
//! | `StringFilter`| equals, in, notIn, contains, doesNotContain, notEquals, specified      |
//! | `RangeFilter` | equals, in, then the conjunction of notIn, notEquals, specified, bounds |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, NomenclatureKind};

/// Equality, membership and presence predicates on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Filter<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified: Option<bool>,
    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub in_list: Option<Vec<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_in: Option<Vec<T>>,
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Self {
            equals: None,
            not_equals: None,
            specified: None,
            in_list: None,
            not_in: None,
        }
    }
}

/// The single predicate a filter resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clause<'a, T> {
    Equals(&'a T),
    In(&'a [T]),
    NotIn(&'a [T]),
    Contains(&'a str),
    DoesNotContain(&'a str),
    NotEquals(&'a T),
    Specified(bool),
}

impl<T> Filter<T> {
    /// A filter matching one value.
    pub fn equals(value: T) -> Self {
        Self {
            equals: Some(value),
            ..Self::default()
        }
    }

    /// A filter excluding one value.
    pub fn not_equals(value: T) -> Self {
        Self {
            not_equals: Some(value),
            ..Self::default()
        }
    }

    /// A filter matching any of the given values.
    pub fn in_values(values: Vec<T>) -> Self {
        Self {
            in_list: Some(values),
            ..Self::default()
        }
    }

    /// A filter excluding all of the given values.
    pub fn not_in(values: Vec<T>) -> Self {
        Self {
            not_in: Some(values),
            ..Self::default()
        }
    }

    /// A presence filter.
    pub fn specified(present: bool) -> Self {
        Self {
            specified: Some(present),
            ..Self::default()
        }
    }

    /// Returns true if no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.equals.is_none()
            && self.not_equals.is_none()
            && self.specified.is_none()
            && self.in_list.is_none()
            && self.not_in.is_none()
    }

    /// Resolves the highest-precedence predicate.
    pub fn clause(&self) -> Option<Clause<'_, T>> {
        if let Some(value) = &self.equals {
            return Some(Clause::Equals(value));
        }
        if let Some(values) = &self.in_list {
            return Some(Clause::In(values));
        }
        if let Some(values) = &self.not_in {
            return Some(Clause::NotIn(values));
        }
        if let Some(value) = &self.not_equals {
            return Some(Clause::NotEquals(value));
        }
        self.specified.map(Clause::Specified)
    }
}

/// A filter on text fields, adding token matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    #[serde(flatten)]
    pub filter: Filter<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub does_not_contain: Option<String>,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            filter: Filter::equals(value.into()),
            ..Self::default()
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            contains: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn does_not_contain(value: impl Into<String>) -> Self {
        Self {
            does_not_contain: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn specified(present: bool) -> Self {
        Self {
            filter: Filter::specified(present),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty() && self.contains.is_none() && self.does_not_contain.is_none()
    }

    /// Resolves the highest-precedence predicate.
    pub fn clause(&self) -> Option<Clause<'_, String>> {
        let f = &self.filter;
        if let Some(value) = &f.equals {
            return Some(Clause::Equals(value));
        }
        if let Some(values) = &f.in_list {
            return Some(Clause::In(values));
        }
        if let Some(values) = &f.not_in {
            return Some(Clause::NotIn(values));
        }
        if let Some(value) = &self.contains {
            return Some(Clause::Contains(value));
        }
        if let Some(value) = &self.does_not_contain {
            return Some(Clause::DoesNotContain(value));
        }
        if let Some(value) = &f.not_equals {
            return Some(Clause::NotEquals(value));
        }
        f.specified.map(Clause::Specified)
    }
}

/// Inclusive and exclusive bounds on an orderable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound<'a, T> {
    GreaterThan(&'a T),
    GreaterThanOrEqual(&'a T),
    LessThan(&'a T),
    LessThanOrEqual(&'a T),
}

/// What a range filter resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeClause<'a, T> {
    Equals(&'a T),
    In(&'a [T]),
    /// Every listed predicate applies; combined with AND.
    Conjunction {
        not_in: Option<&'a [T]>,
        not_equals: Option<&'a T>,
        specified: Option<bool>,
        bounds: Vec<Bound<'a, T>>,
    },
}

/// A filter on orderable fields (numbers, dates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeFilter<T> {
    #[serde(flatten)]
    pub filter: Filter<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_or_equal: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_or_equal: Option<T>,
}

impl<T> Default for RangeFilter<T> {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            greater_than: None,
            less_than: None,
            greater_than_or_equal: None,
            less_than_or_equal: None,
        }
    }
}

impl<T> RangeFilter<T> {
    pub fn equals(value: T) -> Self {
        Self {
            filter: Filter::equals(value),
            ..Self::default()
        }
    }

    pub fn greater_than_or_equal(value: T) -> Self {
        Self {
            greater_than_or_equal: Some(value),
            ..Self::default()
        }
    }

    pub fn less_than_or_equal(value: T) -> Self {
        Self {
            less_than_or_equal: Some(value),
            ..Self::default()
        }
    }

    /// An inclusive range `[low, high]`.
    pub fn between(low: T, high: T) -> Self {
        Self {
            greater_than_or_equal: Some(low),
            less_than_or_equal: Some(high),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
            && self.greater_than.is_none()
            && self.less_than.is_none()
            && self.greater_than_or_equal.is_none()
            && self.less_than_or_equal.is_none()
    }

    /// Resolves the predicates this filter contributes.
    pub fn clause(&self) -> Option<RangeClause<'_, T>> {
        if let Some(value) = &self.filter.equals {
            return Some(RangeClause::Equals(value));
        }
        if let Some(values) = &self.filter.in_list {
            return Some(RangeClause::In(values));
        }

        let mut bounds = Vec::new();
        if let Some(v) = &self.greater_than {
            bounds.push(Bound::GreaterThan(v));
        }
        if let Some(v) = &self.greater_than_or_equal {
            bounds.push(Bound::GreaterThanOrEqual(v));
        }
        if let Some(v) = &self.less_than {
            bounds.push(Bound::LessThan(v));
        }
        if let Some(v) = &self.less_than_or_equal {
            bounds.push(Bound::LessThanOrEqual(v));
        }

        let not_in = self.filter.not_in.as_deref();
        let not_equals = self.filter.not_equals.as_ref();
        let specified = self.filter.specified;
        if not_in.is_none() && not_equals.is_none() && specified.is_none() && bounds.is_empty() {
            return None;
        }
        Some(RangeClause::Conjunction {
            not_in,
            not_equals,
            specified,
            bounds,
        })
    }
}

impl<'a, T> RangeClause<'a, T> {
    /// Returns the presence test if it is the only predicate.
    pub fn only_specified(&self) -> Option<bool> {
        match self {
            RangeClause::Conjunction {
                not_in: None,
                not_equals: None,
                specified: Some(present),
                bounds,
            } if bounds.is_empty() => Some(*present),
            _ => None,
        }
    }
}

pub type IdFilter = Filter<EntityId>;
pub type BooleanFilter = Filter<bool>;
pub type IntegerFilter = RangeFilter<i64>;
pub type DateFilter = RangeFilter<NaiveDate>;
pub type NomenclatureKindFilter = Filter<NomenclatureKind>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_precedence() {
        let filter = Filter {
            equals: Some(1),
            not_equals: Some(2),
            specified: Some(true),
            in_list: Some(vec![3]),
            not_in: Some(vec![4]),
        };
        assert_eq!(filter.clause(), Some(Clause::Equals(&1)));

        let filter = Filter {
            not_equals: Some(2),
            not_in: Some(vec![4]),
            ..Filter::default()
        };
        assert_eq!(filter.clause(), Some(Clause::NotIn(&[4][..])));

        assert_eq!(Filter::<i32>::default().clause(), None);
    }

    #[test]
    fn test_string_filter_precedence() {
        let filter = StringFilter {
            filter: Filter {
                not_equals: Some("a".to_string()),
                specified: Some(false),
                ..Filter::default()
            },
            contains: None,
            does_not_contain: Some("b".to_string()),
        };
        assert_eq!(filter.clause(), Some(Clause::DoesNotContain("b")));

        let filter = StringFilter {
            filter: Filter::not_in(vec!["x".to_string()]),
            contains: Some("y".to_string()),
            does_not_contain: None,
        };
        assert!(matches!(filter.clause(), Some(Clause::NotIn(_))));
    }

    #[test]
    fn test_range_conjunction() {
        let filter = RangeFilter {
            filter: Filter::not_equals(5),
            greater_than_or_equal: Some(2),
            less_than: Some(9),
            ..RangeFilter::default()
        };
        match filter.clause() {
            Some(RangeClause::Conjunction {
                not_equals, bounds, ..
            }) => {
                assert_eq!(not_equals, Some(&5));
                assert_eq!(
                    bounds,
                    vec![Bound::GreaterThanOrEqual(&2), Bound::LessThan(&9)]
                );
            }
            other => panic!("unexpected clause: {other:?}"),
        }
    }

    #[test]
    fn test_range_equals_wins() {
        let filter = RangeFilter {
            filter: Filter::equals(3),
            greater_than: Some(10),
            ..RangeFilter::default()
        };
        assert_eq!(filter.clause(), Some(RangeClause::Equals(&3)));
    }

    #[test]
    fn test_range_only_specified() {
        let filter = RangeFilter::<i64> {
            filter: Filter::specified(false),
            ..RangeFilter::default()
        };
        assert_eq!(filter.clause().and_then(|c| c.only_specified()), Some(false));
        let filter = RangeFilter::<i64>::greater_than_or_equal(1);
        assert_eq!(filter.clause().and_then(|c| c.only_specified()), None);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let filter: IntegerFilter = serde_json::from_value(json!({
            "greaterThanOrEqual": 2,
            "in": [1, 2],
            "notEquals": 7
        }))
        .unwrap();
        assert_eq!(filter.greater_than_or_equal, Some(2));
        assert_eq!(filter.filter.in_list, Some(vec![1, 2]));
        assert_eq!(filter.filter.not_equals, Some(7));

        let filter: StringFilter =
            serde_json::from_value(json!({"contains": "35", "specified": true})).unwrap();
        assert_eq!(filter.contains.as_deref(), Some("35"));
        assert_eq!(filter.filter.specified, Some(true));
    }
}
