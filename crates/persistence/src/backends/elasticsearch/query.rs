//! Translation of [`DocumentMatch`] into Elasticsearch query DSL.

use serde_json::{Value, json};

use crate::core::DocumentMatch;

/// Builds the `query` clause for a match.
///
/// Paths through embedded arrays need no special handling: object arrays
/// are flattened by Elasticsearch, so a term on `employees.id` matches if
/// any element matches, the same as [`DocumentMatch::matches`].
pub fn to_query(matcher: &DocumentMatch) -> Value {
    match matcher {
        DocumentMatch::All => json!({ "match_all": {} }),
        DocumentMatch::Equals { path, value } => json!({ "term": { path: value } }),
        DocumentMatch::Missing { path } => json!({
            "bool": { "must_not": [{ "exists": { "field": path } }] }
        }),
        DocumentMatch::And(inner) => json!({
            "bool": { "filter": inner.iter().map(to_query).collect::<Vec<_>>() }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term() {
        assert_eq!(
            to_query(&DocumentMatch::id("e1")),
            json!({"term": {"id": "e1"}})
        );
    }

    #[test]
    fn test_orphan_match() {
        let matcher = DocumentMatch::equals("employee.id", "e1").and(DocumentMatch::missing("work_place"));
        assert_eq!(
            to_query(&matcher),
            json!({"bool": {"filter": [
                {"term": {"employee.id": "e1"}},
                {"bool": {"must_not": [{"exists": {"field": "work_place"}}]}}
            ]}})
        );
    }

    #[test]
    fn test_match_all() {
        assert_eq!(to_query(&DocumentMatch::All), json!({"match_all": {}}));
    }
}
