//! Per-field predicate compilation.

use crate::types::{Bound, Clause, Filter, RangeClause, RangeFilter, StringFilter};

use super::fragment::{SqlFragment, SqlParam, ToSqlParam};
use super::{JoinMode, ROOT_ALIAS, Specification};

/// One step from a table to a related table.
///
/// The related table is joined on `related.remote_column = current.local_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinHop {
    pub table: &'static str,
    pub local_column: &'static str,
    pub remote_column: &'static str,
}

impl JoinHop {
    /// Follows a foreign key held by the current table.
    pub const fn to_one(table: &'static str, foreign_key: &'static str) -> Self {
        Self {
            table,
            local_column: foreign_key,
            remote_column: "id",
        }
    }

    /// Follows a foreign key held by the related table back to the current one.
    pub const fn to_many(table: &'static str, foreign_key: &'static str) -> Self {
        Self {
            table,
            local_column: "id",
            remote_column: foreign_key,
        }
    }
}

/// Collects the predicates of one criteria object.
#[derive(Debug, Default)]
pub struct SpecificationBuilder {
    predicates: Vec<SqlFragment>,
    joins: usize,
}

impl SpecificationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the predicate of a plain filter on a root column.
    pub fn filter<T: ToSqlParam>(&mut self, column: &str, filter: Option<&Filter<T>>) -> &mut Self {
        if let Some(clause) = filter.and_then(Filter::clause) {
            let fragment = clause_fragment(&qualify(ROOT_ALIAS, column), clause);
            self.push(fragment);
        }
        self
    }

    /// Adds the predicate of a string filter on a root column.
    pub fn string(&mut self, column: &str, filter: Option<&StringFilter>) -> &mut Self {
        if let Some(clause) = filter.and_then(StringFilter::clause) {
            let fragment = clause_fragment(&qualify(ROOT_ALIAS, column), clause);
            self.push(fragment);
        }
        self
    }

    /// Adds the predicates of a range filter on a root column.
    pub fn range<T: ToSqlParam>(
        &mut self,
        column: &str,
        filter: Option<&RangeFilter<T>>,
    ) -> &mut Self {
        if let Some(clause) = filter.and_then(RangeFilter::clause) {
            let fragment = range_fragment(&qualify(ROOT_ALIAS, column), clause);
            self.push(fragment);
        }
        self
    }

    /// Adds a plain filter on a column of a related table.
    pub fn joined_filter<T: ToSqlParam>(
        &mut self,
        path: &[JoinHop],
        column: &str,
        filter: Option<&Filter<T>>,
    ) -> &mut Self {
        match filter.and_then(Filter::clause) {
            Some(Clause::Specified(present)) => self.push_exists(path, present, None),
            Some(clause) => {
                let inner = clause_fragment(&qualify(&self.leaf_alias(path), column), clause);
                if inner.is_some() {
                    self.push_exists(path, true, inner);
                }
            }
            None => {}
        }
        self
    }

    /// Adds a string filter on a column of a related table.
    pub fn joined_string(
        &mut self,
        path: &[JoinHop],
        column: &str,
        filter: Option<&StringFilter>,
    ) -> &mut Self {
        match filter.and_then(StringFilter::clause) {
            Some(Clause::Specified(present)) => self.push_exists(path, present, None),
            Some(clause) => {
                let inner = clause_fragment(&qualify(&self.leaf_alias(path), column), clause);
                if inner.is_some() {
                    self.push_exists(path, true, inner);
                }
            }
            None => {}
        }
        self
    }

    /// Adds a range filter on a column of a related table.
    pub fn joined_range<T: ToSqlParam>(
        &mut self,
        path: &[JoinHop],
        column: &str,
        filter: Option<&RangeFilter<T>>,
    ) -> &mut Self {
        if let Some(clause) = filter.and_then(RangeFilter::clause) {
            match clause.only_specified() {
                Some(present) => self.push_exists(path, present, None),
                None => {
                    let inner = range_fragment(&qualify(&self.leaf_alias(path), column), clause);
                    if inner.is_some() {
                        self.push_exists(path, true, inner);
                    }
                }
            }
        }
        self
    }

    /// Combines the collected predicates.
    pub fn build(self, mode: JoinMode) -> Specification {
        Specification::from_fragment(SqlFragment::join_all(self.predicates, mode.connective()))
    }

    fn push(&mut self, fragment: Option<SqlFragment>) {
        if let Some(fragment) = fragment {
            self.predicates.push(fragment);
        }
    }

    /// Alias the last hop of `path` receives in the next pushed subquery.
    fn leaf_alias(&self, path: &[JoinHop]) -> String {
        format!("j{}_{}", self.joins + 1, path.len().saturating_sub(1))
    }

    /// Pushes `[NOT] EXISTS (SELECT 1 FROM <path> WHERE <join> [AND inner])`.
    fn push_exists(&mut self, path: &[JoinHop], exists: bool, inner: Option<SqlFragment>) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };

        self.joins += 1;
        let first_alias = format!("j{}_0", self.joins);
        let mut from = format!("{} {first_alias}", first.table);
        let mut previous = first_alias.clone();
        for (depth, hop) in rest.iter().enumerate() {
            let alias = format!("j{}_{}", self.joins, depth + 1);
            from.push_str(&format!(
                " JOIN {} {alias} ON {alias}.{} = {previous}.{}",
                hop.table, hop.remote_column, hop.local_column
            ));
            previous = alias;
        }

        let mut condition = format!(
            "{first_alias}.{} = {ROOT_ALIAS}.{}",
            first.remote_column, first.local_column
        );
        let mut params = Vec::new();
        if let Some(fragment) = inner {
            condition = format!("{condition} AND ({})", fragment.sql);
            params = fragment.params;
        }

        let keyword = if exists { "EXISTS" } else { "NOT EXISTS" };
        self.predicates.push(SqlFragment::with_params(
            format!("{keyword} (SELECT 1 FROM {from} WHERE {condition})"),
            params,
        ));
    }
}

fn qualify(alias: &str, column: &str) -> String {
    format!("{alias}.{column}")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn params_of<T: ToSqlParam>(values: &[T]) -> Vec<SqlParam> {
    values.iter().map(ToSqlParam::to_sql_param).collect()
}

/// Escapes LIKE wildcards so tokens match literally.
fn escape_like(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Splits on whitespace, upper-cases, and ORs a `LIKE %TOKEN%` per token.
fn contains_fragment(column: &str, value: &str) -> Option<SqlFragment> {
    let tokens: Vec<SqlFragment> = value
        .split_whitespace()
        .map(|token| {
            SqlFragment::with_params(
                format!("UPPER({column}) LIKE ? ESCAPE '\\'"),
                vec![SqlParam::String(format!(
                    "%{}%",
                    escape_like(&token.to_uppercase())
                ))],
            )
        })
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(SqlFragment::join_all(tokens, "OR"))
    }
}

fn clause_fragment<T: ToSqlParam>(column: &str, clause: Clause<'_, T>) -> Option<SqlFragment> {
    match clause {
        Clause::Equals(value) => Some(SqlFragment::with_params(
            format!("{column} = ?"),
            vec![value.to_sql_param()],
        )),
        Clause::In([]) => Some(SqlFragment::always_false()),
        Clause::In(values) => Some(SqlFragment::with_params(
            format!("{column} IN ({})", placeholders(values.len())),
            params_of(values),
        )),
        Clause::NotIn([]) => None,
        Clause::NotIn(values) => Some(SqlFragment::with_params(
            format!("{column} NOT IN ({})", placeholders(values.len())),
            params_of(values),
        )),
        Clause::Contains(value) => contains_fragment(column, value),
        Clause::DoesNotContain(value) => contains_fragment(column, value).map(SqlFragment::not),
        Clause::NotEquals(value) => Some(SqlFragment::with_params(
            format!("{column} <> ?"),
            vec![value.to_sql_param()],
        )),
        Clause::Specified(true) => Some(SqlFragment::new(format!("{column} IS NOT NULL"))),
        Clause::Specified(false) => Some(SqlFragment::new(format!("{column} IS NULL"))),
    }
}

fn range_fragment<T: ToSqlParam>(column: &str, clause: RangeClause<'_, T>) -> Option<SqlFragment> {
    match clause {
        RangeClause::Equals(value) => clause_fragment(column, Clause::Equals(value)),
        RangeClause::In(values) => clause_fragment(column, Clause::In(values)),
        RangeClause::Conjunction {
            not_in,
            not_equals,
            specified,
            bounds,
        } => {
            let mut parts = Vec::new();
            if let Some(values) = not_in {
                parts.extend(clause_fragment(column, Clause::NotIn(values)));
            }
            if let Some(value) = not_equals {
                parts.extend(clause_fragment(column, Clause::NotEquals(value)));
            }
            if let Some(present) = specified {
                parts.extend(clause_fragment::<T>(column, Clause::Specified(present)));
            }
            for bound in bounds {
                let (op, value) = match bound {
                    Bound::GreaterThan(v) => (">", v),
                    Bound::GreaterThanOrEqual(v) => (">=", v),
                    Bound::LessThan(v) => ("<", v),
                    Bound::LessThanOrEqual(v) => ("<=", v),
                };
                parts.push(SqlFragment::with_params(
                    format!("{column} {op} ?"),
                    vec![value.to_sql_param()],
                ));
            }
            // Bounds on one field always combine with AND.
            let fragment = SqlFragment::join_all(parts, "AND");
            (!fragment.is_empty()).then_some(fragment)
        }
    }
}
