//! Criteria-to-SQL compilation.
//!
//! A criteria object compiles into a [`Specification`]: a parameterized SQL
//! predicate over the entity's table, aliased [`ROOT_ALIAS`]. Each active
//! filter contributes one sub-predicate; the [`JoinMode`] combines them.
//! Filters on related entities compile to `EXISTS` subqueries so the root
//! rows never fan out.
//!
//! ```
//! use roster_persistence::specification::{Criteria, JoinMode};
//! use roster_persistence::types::{IntegerFilter, StringFilter, StudentCriteria};
//!
//! let criteria = StudentCriteria {
//!     class_room: Some(StringFilter::contains("35")),
//!     university_year: Some(IntegerFilter::greater_than_or_equal(2)),
//!     ..Default::default()
//! };
//! let spec = criteria.to_specification(JoinMode::And);
//! assert_eq!(
//!     spec.where_clause(),
//!     "WHERE (UPPER(t0.class_room) LIKE ? ESCAPE '\\') AND (t0.university_year >= ?)"
//! );
//! ```

mod builder;
mod criteria;
mod fragment;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use builder::{JoinHop, SpecificationBuilder};
pub use criteria::{Criteria, EntityCriteria};
pub use fragment::{SqlFragment, SqlParam, ToSqlParam};

/// Alias of the queried table in every compiled predicate.
pub const ROOT_ALIAS: &str = "t0";

/// How per-field predicates combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Every predicate must hold.
    #[default]
    And,
    /// Any predicate may hold.
    Or,
}

impl JoinMode {
    /// The SQL connective.
    pub fn connective(&self) -> &'static str {
        match self {
            JoinMode::And => "AND",
            JoinMode::Or => "OR",
        }
    }
}

impl FromStr for JoinMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(JoinMode::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(JoinMode::Or)
        } else {
            Err(ValidationError::InvalidJoinMode {
                value: s.to_string(),
            })
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.connective())
    }
}

/// A compiled predicate over one entity table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specification {
    predicate: Option<SqlFragment>,
}

impl Specification {
    /// Matches every row.
    pub fn all() -> Self {
        Self { predicate: None }
    }

    /// Wraps a predicate written against [`ROOT_ALIAS`].
    pub fn from_fragment(fragment: SqlFragment) -> Self {
        if fragment.is_empty() {
            Self::all()
        } else {
            Self {
                predicate: Some(fragment),
            }
        }
    }

    /// Returns the predicate, if any.
    pub fn predicate(&self) -> Option<&SqlFragment> {
        self.predicate.as_ref()
    }

    /// Returns true if the specification matches every row.
    pub fn is_unrestricted(&self) -> bool {
        self.predicate.is_none()
    }

    /// Renders `WHERE …`, or an empty string when unrestricted.
    pub fn where_clause(&self) -> String {
        match &self.predicate {
            Some(fragment) => format!("WHERE {}", fragment.sql),
            None => String::new(),
        }
    }

    /// The bound parameters, in placeholder order.
    pub fn params(&self) -> &[SqlParam] {
        self.predicate
            .as_ref()
            .map(|f| f.params.as_slice())
            .unwrap_or_default()
    }

    /// Narrows this specification with another one.
    pub fn and(self, other: Specification) -> Self {
        match (self.predicate, other.predicate) {
            (Some(a), Some(b)) => Self::from_fragment(a.and(b)),
            (a, b) => Self { predicate: a.or(b) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_mode_parse() {
        assert_eq!("and".parse::<JoinMode>().unwrap(), JoinMode::And);
        assert_eq!("OR".parse::<JoinMode>().unwrap(), JoinMode::Or);
        assert_eq!("And".parse::<JoinMode>().unwrap(), JoinMode::And);

        let err = "xor".parse::<JoinMode>().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidJoinMode { value } if value == "xor"));
    }

    #[test]
    fn test_unrestricted_specification() {
        let spec = Specification::all();
        assert!(spec.is_unrestricted());
        assert_eq!(spec.where_clause(), "");
        assert!(spec.params().is_empty());
    }

    #[test]
    fn test_specification_and() {
        let a = Specification::from_fragment(SqlFragment::with_params(
            "t0.a = ?",
            vec![SqlParam::integer(1)],
        ));
        let b = Specification::from_fragment(SqlFragment::new("t0.b IS NULL"));
        let both = a.clone().and(b);
        assert_eq!(both.where_clause(), "WHERE (t0.a = ?) AND (t0.b IS NULL)");
        assert_eq!(both.params().len(), 1);

        let same = a.clone().and(Specification::all());
        assert_eq!(same, a);
    }
}
