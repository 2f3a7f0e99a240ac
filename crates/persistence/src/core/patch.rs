//! Structured document matches and field patches.
//!
//! A [`FieldPatch`] is translated into RFC 6902 operations against the
//! document it targets and applied with `json-patch`. Every patch is an
//! overwrite, a keyed upsert or a keyed removal, so applying it twice leaves
//! the document as applying it once.
//!
//! Paths are dotted (`employee.name`). A [`DocumentMatch`] path that crosses
//! an array matches if any element matches.

use serde_json::{Map, Value, json};

use crate::error::{SyncError, SyncResult};

/// Selects documents within one index kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentMatch {
    /// Every document.
    All,
    /// Documents with a value at `path` equal to `value`.
    Equals { path: String, value: Value },
    /// Documents with no non-null value at `path`.
    Missing { path: String },
    /// Documents matching every inner match.
    And(Vec<DocumentMatch>),
}

impl DocumentMatch {
    /// Matches the document with the given id.
    pub fn id(id: impl ToString) -> Self {
        Self::equals("id", id.to_string())
    }

    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        DocumentMatch::Equals {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        DocumentMatch::Missing { path: path.into() }
    }

    /// Narrows this match with another.
    pub fn and(self, other: DocumentMatch) -> Self {
        match self {
            DocumentMatch::And(mut inner) => {
                inner.push(other);
                DocumentMatch::And(inner)
            }
            first => DocumentMatch::And(vec![first, other]),
        }
    }

    /// Evaluates the match against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            DocumentMatch::All => true,
            DocumentMatch::Equals { path, value } => {
                values_at(doc, path).into_iter().any(|v| v == value)
            }
            DocumentMatch::Missing { path } => values_at(doc, path).iter().all(|v| v.is_null()),
            DocumentMatch::And(inner) => inner.iter().all(|m| m.matches(doc)),
        }
    }
}

/// Collects the values at a dotted path, flattening arrays along the way.
pub fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            let Some(field) = value.get(segment) else {
                continue;
            };
            match field {
                Value::Array(items) => next.extend(items.iter()),
                other => next.push(other),
            }
        }
        current = next;
    }
    current
}

/// A structured update to the denormalized fields of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    /// Overwrites fields by dotted path.
    ///
    /// A field whose parent is not an object (e.g. a null embedded reference)
    /// is left alone.
    Set(Map<String, Value>),

    /// Overwrites fields of every element of `collection` whose `key` equals
    /// `key_value`.
    SetInCollection {
        collection: String,
        key: String,
        key_value: Value,
        fields: Map<String, Value>,
    },

    /// Replaces the element of `collection` with the same `key` as `element`,
    /// or appends it.
    UpsertInCollection {
        collection: String,
        key: String,
        element: Value,
    },

    /// Removes every element of `collection` whose `key` equals `key_value`.
    RemoveFromCollection {
        collection: String,
        key: String,
        key_value: Value,
    },
}

impl FieldPatch {
    /// A patch setting a single field.
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(path.into(), value.into());
        FieldPatch::Set(fields)
    }

    /// Adds another field to a [`FieldPatch::Set`]. Other variants are
    /// returned unchanged.
    pub fn and_set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        if let FieldPatch::Set(fields) = &mut self {
            fields.insert(path.into(), value.into());
        }
        self
    }

    /// Builds the RFC 6902 operations that apply this patch to `doc`.
    pub fn operations(&self, doc: &Value) -> Vec<Value> {
        match self {
            FieldPatch::Set(fields) => fields
                .iter()
                .filter_map(|(path, value)| {
                    let segments: Vec<&str> = path.split('.').collect();
                    let (_, parent) = segments.split_last()?;
                    let parent_pointer = to_pointer(parent);
                    doc.pointer(&parent_pointer)
                        .filter(|p| p.is_object())
                        .map(|_| json!({"op": "add", "path": to_pointer(&segments), "value": value}))
                })
                .collect(),

            FieldPatch::SetInCollection {
                collection,
                key,
                key_value,
                fields,
            } => {
                let pointer = collection_pointer(collection);
                let mut operations = Vec::new();
                for index in element_positions(doc, &pointer, key, key_value) {
                    for (field, value) in fields {
                        operations.push(json!({
                            "op": "add",
                            "path": format!("{pointer}/{index}/{}", escape(field)),
                            "value": value,
                        }));
                    }
                }
                operations
            }

            FieldPatch::UpsertInCollection {
                collection,
                key,
                element,
            } => {
                let pointer = collection_pointer(collection);
                let key_value = element.get(key).cloned().unwrap_or(Value::Null);
                match doc.pointer(&pointer) {
                    Some(Value::Array(_)) => {
                        let positions = element_positions(doc, &pointer, key, &key_value);
                        match positions.first() {
                            Some(index) => vec![json!({
                                "op": "replace",
                                "path": format!("{pointer}/{index}"),
                                "value": element,
                            })],
                            None => vec![json!({
                                "op": "add",
                                "path": format!("{pointer}/-"),
                                "value": element,
                            })],
                        }
                    }
                    _ => vec![json!({"op": "add", "path": pointer, "value": [element]})],
                }
            }

            FieldPatch::RemoveFromCollection {
                collection,
                key,
                key_value,
            } => {
                let pointer = collection_pointer(collection);
                // Highest index first so earlier removals do not shift later ones.
                element_positions(doc, &pointer, key, key_value)
                    .into_iter()
                    .rev()
                    .map(|index| json!({"op": "remove", "path": format!("{pointer}/{index}")}))
                    .collect()
            }
        }
    }

    /// Applies the patch in place. Returns true if the document changed.
    ///
    /// `index` and `id` only label the error.
    pub fn apply(&self, index: &str, id: &str, doc: &mut Value) -> SyncResult<bool> {
        let operations = self.operations(doc);
        if operations.is_empty() {
            return Ok(false);
        }

        let failed = |message: String| SyncError::PatchFailed {
            index: index.to_string(),
            id: id.to_string(),
            message,
        };
        let patch: json_patch::Patch =
            serde_json::from_value(Value::Array(operations)).map_err(|e| failed(e.to_string()))?;

        let before = doc.clone();
        json_patch::patch(doc, &patch).map_err(|e| failed(e.to_string()))?;
        Ok(*doc != before)
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn to_pointer(segments: &[&str]) -> String {
    segments.iter().map(|s| format!("/{}", escape(s))).collect()
}

fn collection_pointer(collection: &str) -> String {
    to_pointer(&collection.split('.').collect::<Vec<_>>())
}

fn element_positions(doc: &Value, pointer: &str, key: &str, key_value: &Value) -> Vec<usize> {
    match doc.pointer(pointer) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.get(key) == Some(key_value))
            .map(|(index, _)| index)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_place_doc() -> Value {
        json!({
            "id": "w1",
            "name": "Lab",
            "employees": [
                {"id": "e1", "name": "Cesar", "category": "Senior", "category_id": "c1"},
                {"id": "e2", "name": "Ana", "category": "Senior", "category_id": "c1"}
            ],
            "phones": []
        })
    }

    #[test]
    fn test_match_through_arrays() {
        let doc = work_place_doc();
        assert!(DocumentMatch::equals("employees.id", "e2").matches(&doc));
        assert!(!DocumentMatch::equals("employees.id", "e3").matches(&doc));
        assert!(DocumentMatch::id("w1").matches(&doc));
        assert!(DocumentMatch::equals("employees.category_id", "c1").matches(&doc));
    }

    #[test]
    fn test_missing() {
        let doc = json!({"id": "p1", "employee": null, "work_place": {"id": "w1"}});
        assert!(DocumentMatch::missing("employee").matches(&doc));
        assert!(DocumentMatch::missing("employee.id").matches(&doc));
        assert!(DocumentMatch::missing("description").matches(&doc));
        assert!(!DocumentMatch::missing("work_place").matches(&doc));

        let both = DocumentMatch::equals("work_place.id", "w1").and(DocumentMatch::missing("employee"));
        assert!(both.matches(&doc));
    }

    #[test]
    fn test_set_skips_null_parent() {
        let mut doc = json!({"id": "p1", "employee": null, "number": 5});
        let patch = FieldPatch::set("employee.name", "Cesar");
        assert!(!patch.apply("phone", "p1", &mut doc).unwrap());
        assert_eq!(doc["employee"], Value::Null);
    }

    #[test]
    fn test_set_nested_field() {
        let mut doc = json!({"id": "p1", "employee": {"id": "e1", "name": "Cesar"}, "number": 5});
        let patch = FieldPatch::set("employee.name", "Cesar Jr");
        assert!(patch.apply("phone", "p1", &mut doc).unwrap());
        assert_eq!(doc["employee"]["name"], "Cesar Jr");
        assert_eq!(doc["number"], 5);
    }

    #[test]
    fn test_set_in_collection() {
        let mut doc = work_place_doc();
        let mut fields = Map::new();
        fields.insert("category".to_string(), json!("Principal"));
        let patch = FieldPatch::SetInCollection {
            collection: "employees".to_string(),
            key: "category_id".to_string(),
            key_value: json!("c1"),
            fields,
        };
        assert!(patch.apply("work_place", "w1", &mut doc).unwrap());
        assert_eq!(doc["employees"][0]["category"], "Principal");
        assert_eq!(doc["employees"][1]["category"], "Principal");
    }

    #[test]
    fn test_upsert_in_collection() {
        let mut doc = work_place_doc();
        let patch = FieldPatch::UpsertInCollection {
            collection: "employees".to_string(),
            key: "id".to_string(),
            element: json!({"id": "e1", "name": "Cesar Jr"}),
        };
        patch.apply("work_place", "w1", &mut doc).unwrap();
        assert_eq!(doc["employees"][0], json!({"id": "e1", "name": "Cesar Jr"}));
        assert_eq!(doc["employees"].as_array().unwrap().len(), 2);

        let add = FieldPatch::UpsertInCollection {
            collection: "phones".to_string(),
            key: "id".to_string(),
            element: json!({"id": "p1", "number": 5}),
        };
        add.apply("work_place", "w1", &mut doc).unwrap();
        assert_eq!(doc["phones"], json!([{"id": "p1", "number": 5}]));
    }

    #[test]
    fn test_upsert_into_missing_collection() {
        let mut doc = json!({"id": "w1"});
        let patch = FieldPatch::UpsertInCollection {
            collection: "phones".to_string(),
            key: "id".to_string(),
            element: json!({"id": "p1"}),
        };
        patch.apply("work_place", "w1", &mut doc).unwrap();
        assert_eq!(doc["phones"], json!([{"id": "p1"}]));
    }

    #[test]
    fn test_remove_from_collection() {
        let mut doc = work_place_doc();
        let patch = FieldPatch::RemoveFromCollection {
            collection: "employees".to_string(),
            key: "category_id".to_string(),
            key_value: json!("c1"),
        };
        assert!(patch.apply("work_place", "w1", &mut doc).unwrap());
        assert_eq!(doc["employees"], json!([]));
    }

    #[test]
    fn test_patches_are_idempotent() {
        let patches = vec![
            FieldPatch::set("name", "Annex").and_set("email", Value::Null),
            FieldPatch::UpsertInCollection {
                collection: "employees".to_string(),
                key: "id".to_string(),
                element: json!({"id": "e3", "name": "Luis"}),
            },
            FieldPatch::RemoveFromCollection {
                collection: "employees".to_string(),
                key: "id".to_string(),
                key_value: json!("e1"),
            },
        ];
        for patch in patches {
            let mut once = work_place_doc();
            patch.apply("work_place", "w1", &mut once).unwrap();
            let mut twice = once.clone();
            patch.apply("work_place", "w1", &mut twice).unwrap();
            assert_eq!(once, twice, "patch {patch:?} is not idempotent");
        }
    }
}
