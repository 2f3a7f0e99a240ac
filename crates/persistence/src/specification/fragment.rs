//! SQL fragments with bound parameters.

use chrono::NaiveDate;

use crate::types::{EntityId, NomenclatureKind};

/// A fragment of SQL with bound parameters.
///
/// Placeholders are positional `?` markers; `params` lists the values in the
/// order their placeholders appear in `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a parameter from an optional value, binding NULL when absent.
    pub fn optional<T: ToSqlParam + ?Sized>(value: Option<&T>) -> Self {
        value.map(ToSqlParam::to_sql_param).unwrap_or(SqlParam::Null)
    }
}

/// Values that can be bound into a [`SqlFragment`].
pub trait ToSqlParam {
    fn to_sql_param(&self) -> SqlParam;
}

impl ToSqlParam for String {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::String(self.clone())
    }
}

impl ToSqlParam for str {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::String(self.to_string())
    }
}

impl ToSqlParam for i64 {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::Integer(*self)
    }
}

impl ToSqlParam for i32 {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::Integer(i64::from(*self))
    }
}

impl ToSqlParam for bool {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::Integer(i64::from(*self))
    }
}

impl ToSqlParam for f64 {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::Float(*self)
    }
}

impl ToSqlParam for EntityId {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::String(self.to_string())
    }
}

impl ToSqlParam for NaiveDate {
    fn to_sql_param(&self) -> SqlParam {
        // ISO dates compare correctly as text.
        SqlParam::String(self.format("%Y-%m-%d").to_string())
    }
}

impl ToSqlParam for NomenclatureKind {
    fn to_sql_param(&self) -> SqlParam {
        SqlParam::String(self.as_str().to_string())
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A predicate no row satisfies.
    pub fn always_false() -> Self {
        Self::new("1 = 0")
    }

    /// Returns true if the fragment carries no SQL.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Combines with another fragment using AND.
    pub fn and(self, other: SqlFragment) -> Self {
        Self::combine(self, other, "AND")
    }

    /// Combines with another fragment using OR.
    pub fn or(self, other: SqlFragment) -> Self {
        Self::combine(self, other, "OR")
    }

    /// Negates the fragment.
    pub fn not(self) -> Self {
        if self.sql.is_empty() {
            return self;
        }
        Self {
            sql: format!("NOT ({})", self.sql),
            params: self.params,
        }
    }

    /// Joins every fragment with the given connective, skipping empty ones.
    pub fn join_all(fragments: impl IntoIterator<Item = SqlFragment>, connective: &str) -> Self {
        let mut sql = Vec::new();
        let mut params = Vec::new();
        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
            sql.push(format!("({})", fragment.sql));
            params.extend(fragment.params);
        }
        match sql.len() {
            0 => Self::new(""),
            1 => {
                let single = sql.remove(0);
                Self {
                    sql: single[1..single.len() - 1].to_string(),
                    params,
                }
            }
            _ => Self {
                sql: sql.join(&format!(" {connective} ")),
                params,
            },
        }
    }

    fn combine(mut self, other: SqlFragment, connective: &str) -> Self {
        if self.sql.is_empty() {
            return other;
        }
        if other.sql.is_empty() {
            return self;
        }
        self.sql = format!("({}) {connective} ({})", self.sql, other.sql);
        self.params.extend(other.params);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_fragment_and() {
        let f1 = SqlFragment::with_params("a = ?", vec![SqlParam::integer(1)]);
        let f2 = SqlFragment::with_params("b = ?", vec![SqlParam::string("x")]);
        let combined = f1.and(f2);

        assert_eq!(combined.sql, "(a = ?) AND (b = ?)");
        assert_eq!(
            combined.params,
            vec![SqlParam::Integer(1), SqlParam::String("x".to_string())]
        );
    }

    #[test]
    fn test_sql_fragment_or_with_empty() {
        let f1 = SqlFragment::new("a = 1");
        let combined = f1.or(SqlFragment::new(""));
        assert_eq!(combined.sql, "a = 1");
    }

    #[test]
    fn test_join_all() {
        let joined = SqlFragment::join_all(
            vec![
                SqlFragment::new("a"),
                SqlFragment::new(""),
                SqlFragment::with_params("b = ?", vec![SqlParam::integer(2)]),
            ],
            "OR",
        );
        assert_eq!(joined.sql, "(a) OR (b = ?)");
        assert_eq!(joined.params.len(), 1);

        let single = SqlFragment::join_all(vec![SqlFragment::new("x > 1")], "AND");
        assert_eq!(single.sql, "x > 1");

        assert!(SqlFragment::join_all(Vec::new(), "AND").is_empty());
    }

    #[test]
    fn test_not() {
        assert_eq!(SqlFragment::new("a = 1").not().sql, "NOT (a = 1)");
        assert!(SqlFragment::new("").not().is_empty());
    }

    #[test]
    fn test_param_conversions() {
        assert_eq!(true.to_sql_param(), SqlParam::Integer(1));
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date.to_sql_param(), SqlParam::string("2024-03-09"));
        assert_eq!(
            NomenclatureKind::SubDistrict.to_sql_param(),
            SqlParam::string("sub-district")
        );
        assert_eq!(SqlParam::optional::<i64>(None), SqlParam::Null);
    }
}
