//! The embedding table: which documents carry copies of which entities.
//!
//! Every denormalized copy in the index is declared here once. The sync
//! layer drives all propagation from this table, so a copy that is not
//! declared is never kept up to date. [`EmbeddingTable::validate`] runs at
//! engine startup.

use std::collections::HashSet;

use crate::core::IndexKind;
use crate::error::{SyncError, SyncResult};
use crate::types::EntityKind;

use super::document::{EmployeeSummary, NOMENCLATURE_SUMMARY_FIELDS, PhoneSummary, WorkPlaceSummary};

/// Where a copy of the source lives inside a target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingShape {
    /// A flat `name_field` holding the source's display name, matched on
    /// `id_field`. Paths may be dotted (`employee.category`).
    Flat {
        id_field: &'static str,
        name_field: &'static str,
    },
    /// A singular summary object at `path`, matched on `{path}.id`.
    Object { path: &'static str },
    /// An array of summaries at `path`, keyed by `id`. The containing
    /// document is the one whose id sits at `owner_path` in the source's
    /// own document.
    Collection {
        path: &'static str,
        owner_path: &'static str,
    },
    /// A flat name/id pair inside each element of `collection`.
    CollectionFlat {
        collection: &'static str,
        id_field: &'static str,
        name_field: &'static str,
    },
}

/// What happens to the target document when the source is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Null the reference (or drop the collection element).
    Detach,
    /// Delete the target document if `other_owner` is also empty, detach
    /// otherwise.
    DeleteIfOrphaned { other_owner: &'static str },
}

/// One declared copy of a source kind inside a target index kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    pub source: EntityKind,
    pub target: IndexKind,
    pub shape: EmbeddingShape,
    /// Summary fields copied from the source.
    pub fields: &'static [&'static str],
    pub removal: RemovalPolicy,
}

impl Embedding {
    const fn flat(target: IndexKind, id_field: &'static str, name_field: &'static str) -> Self {
        Self {
            source: EntityKind::Nomenclature,
            target,
            shape: EmbeddingShape::Flat {
                id_field,
                name_field,
            },
            fields: NOMENCLATURE_SUMMARY_FIELDS,
            removal: RemovalPolicy::Detach,
        }
    }

    /// The path holding the source id, as seen by a [`DocumentMatch`].
    ///
    /// [`DocumentMatch`]: crate::core::DocumentMatch
    pub fn match_path(&self) -> String {
        match self.shape {
            EmbeddingShape::Flat { id_field, .. } => id_field.to_string(),
            EmbeddingShape::Object { path } | EmbeddingShape::Collection { path, .. } => {
                format!("{path}.id")
            }
            EmbeddingShape::CollectionFlat {
                collection,
                id_field,
                ..
            } => format!("{collection}.{id_field}"),
        }
    }
}

/// Summary fields a source kind exposes to embedding documents.
pub fn summary_fields(kind: EntityKind) -> Option<&'static [&'static str]> {
    match kind {
        EntityKind::Employee => Some(EmployeeSummary::FIELDS),
        EntityKind::Phone => Some(PhoneSummary::FIELDS),
        EntityKind::WorkPlace => Some(WorkPlaceSummary::FIELDS),
        EntityKind::Nomenclature => Some(NOMENCLATURE_SUMMARY_FIELDS),
        EntityKind::Student => None,
    }
}

/// The full set of declared embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    embeddings: Vec<Embedding>,
}

impl EmbeddingTable {
    pub fn new(embeddings: Vec<Embedding>) -> Self {
        Self { embeddings }
    }

    /// The embeddings of the personnel index.
    pub fn standard() -> Self {
        Self::new(vec![
            Embedding {
                source: EntityKind::Employee,
                target: IndexKind::WorkPlace,
                shape: EmbeddingShape::Collection {
                    path: "employees",
                    owner_path: "work_place_id",
                },
                fields: EmployeeSummary::FIELDS,
                removal: RemovalPolicy::Detach,
            },
            Embedding {
                source: EntityKind::Employee,
                target: IndexKind::Phone,
                shape: EmbeddingShape::Object { path: "employee" },
                fields: EmployeeSummary::FIELDS,
                removal: RemovalPolicy::DeleteIfOrphaned {
                    other_owner: "work_place",
                },
            },
            Embedding {
                source: EntityKind::WorkPlace,
                target: IndexKind::Employee,
                shape: EmbeddingShape::Flat {
                    id_field: "work_place_id",
                    name_field: "work_place",
                },
                fields: &["id", "name"],
                removal: RemovalPolicy::Detach,
            },
            Embedding {
                source: EntityKind::WorkPlace,
                target: IndexKind::Phone,
                shape: EmbeddingShape::Object { path: "work_place" },
                fields: WorkPlaceSummary::FIELDS,
                removal: RemovalPolicy::DeleteIfOrphaned {
                    other_owner: "employee",
                },
            },
            Embedding {
                source: EntityKind::Phone,
                target: IndexKind::WorkPlace,
                shape: EmbeddingShape::Collection {
                    path: "phones",
                    owner_path: "work_place.id",
                },
                fields: PhoneSummary::FIELDS,
                removal: RemovalPolicy::Detach,
            },
            Embedding::flat(IndexKind::Employee, "category_id", "category"),
            Embedding::flat(IndexKind::Employee, "scientific_degree_id", "scientific_degree"),
            Embedding::flat(IndexKind::Employee, "district_id", "district"),
            Embedding::flat(IndexKind::Employee, "sub_district_id", "sub_district"),
            Embedding::flat(IndexKind::Student, "kind_id", "kind"),
            Embedding::flat(IndexKind::Student, "specialty_id", "specialty"),
            Embedding::flat(IndexKind::Student, "study_center_id", "study_center"),
            Embedding::flat(IndexKind::Student, "district_id", "district"),
            Embedding::flat(IndexKind::Student, "sub_district_id", "sub_district"),
            Embedding::flat(IndexKind::Phone, "employee.category_id", "employee.category"),
            Embedding::flat(IndexKind::Nomenclature, "parent_id", "parent"),
            Embedding {
                source: EntityKind::Nomenclature,
                target: IndexKind::WorkPlace,
                shape: EmbeddingShape::CollectionFlat {
                    collection: "employees",
                    id_field: "category_id",
                    name_field: "category",
                },
                fields: NOMENCLATURE_SUMMARY_FIELDS,
                removal: RemovalPolicy::Detach,
            },
        ])
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Embeddings that copy data out of `source`.
    pub fn embeddings_of(&self, source: EntityKind) -> impl Iterator<Item = &Embedding> {
        self.embeddings.iter().filter(move |e| e.source == source)
    }

    /// Checks the table for declarations the sync layer cannot honor.
    pub fn validate(&self) -> SyncResult<()> {
        let mut nomenclature_paths = HashSet::new();

        for embedding in &self.embeddings {
            let label = format!("{} -> {}", embedding.source, embedding.target);
            let invalid = |reason: &str| SyncError::InvalidMapping {
                message: format!("{label}: {reason}"),
            };

            let Some(exposed) = summary_fields(embedding.source) else {
                return Err(invalid("source kind has no summary"));
            };
            if !EntityKind::ALL.contains(&embedding.target) {
                return Err(invalid("unknown target kind"));
            }
            if embedding.fields.is_empty() {
                return Err(invalid("empty field set"));
            }
            if let Some(field) = embedding.fields.iter().find(|f| !exposed.contains(f)) {
                return Err(invalid(&format!("field '{field}' is not part of the summary")));
            }

            let paths: Vec<&str> = match embedding.shape {
                EmbeddingShape::Flat {
                    id_field,
                    name_field,
                } => vec![id_field, name_field],
                EmbeddingShape::Object { path } => vec![path],
                EmbeddingShape::Collection { path, owner_path } => vec![path, owner_path],
                EmbeddingShape::CollectionFlat {
                    collection,
                    id_field,
                    name_field,
                } => vec![collection, id_field, name_field],
            };
            if paths.iter().any(|p| p.is_empty()) {
                return Err(invalid("empty path"));
            }

            if matches!(embedding.removal, RemovalPolicy::DeleteIfOrphaned { .. })
                && !matches!(embedding.shape, EmbeddingShape::Object { .. })
            {
                return Err(invalid("only singular references can delete orphans"));
            }

            if embedding.source == EntityKind::Nomenclature
                && !nomenclature_paths.insert((embedding.target, embedding.match_path()))
            {
                return Err(invalid(&format!(
                    "duplicate nomenclature field '{}'",
                    embedding.match_path()
                )));
            }
        }

        Ok(())
    }
}

impl Default for EmbeddingTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        EmbeddingTable::standard().validate().unwrap();
    }

    #[test]
    fn test_match_path() {
        let table = EmbeddingTable::standard();
        let paths: Vec<String> = table
            .embeddings_of(EntityKind::Employee)
            .map(Embedding::match_path)
            .collect();
        assert_eq!(paths, vec!["employees.id", "employee.id"]);
    }

    #[test]
    fn test_rejects_duplicate_nomenclature_path() {
        let table = EmbeddingTable::new(vec![
            Embedding::flat(IndexKind::Employee, "category_id", "category"),
            Embedding::flat(IndexKind::Employee, "category_id", "category_name"),
        ]);
        assert!(matches!(
            table.validate(),
            Err(SyncError::InvalidMapping { .. })
        ));
    }

    #[test]
    fn test_rejects_source_without_summary() {
        let table = EmbeddingTable::new(vec![Embedding {
            source: EntityKind::Student,
            target: IndexKind::WorkPlace,
            shape: EmbeddingShape::Collection {
                path: "students",
                owner_path: "work_place_id",
            },
            fields: &["id"],
            removal: RemovalPolicy::Detach,
        }]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_summary_field() {
        let table = EmbeddingTable::new(vec![Embedding {
            source: EntityKind::Phone,
            target: IndexKind::WorkPlace,
            shape: EmbeddingShape::Collection {
                path: "phones",
                owner_path: "work_place.id",
            },
            fields: &["id", "serial"],
            removal: RemovalPolicy::Detach,
        }]);
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("serial"));
    }

    #[test]
    fn test_rejects_empty_fields_and_orphan_collections() {
        let empty = EmbeddingTable::new(vec![Embedding {
            fields: &[],
            ..Embedding::flat(IndexKind::Employee, "category_id", "category")
        }]);
        assert!(empty.validate().is_err());

        let orphaning = EmbeddingTable::new(vec![Embedding {
            source: EntityKind::Phone,
            target: IndexKind::WorkPlace,
            shape: EmbeddingShape::Collection {
                path: "phones",
                owner_path: "work_place.id",
            },
            fields: PhoneSummary::FIELDS,
            removal: RemovalPolicy::DeleteIfOrphaned {
                other_owner: "employee",
            },
        }]);
        assert!(orphaning.validate().is_err());
    }
}
