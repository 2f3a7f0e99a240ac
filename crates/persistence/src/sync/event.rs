//! Change events published after every committed write.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::SyncResult;
use crate::projection::{
    EmployeeSummary, PhoneSummary, WorkPlaceSummary, to_document, to_json,
};
use crate::types::{Employee, Entity, EntityId, EntityKind, Nomenclature, Phone, Student, WorkPlace};

/// The committed state of one entity, references resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum EntitySnapshot {
    Employee(Employee),
    Student(Student),
    WorkPlace(WorkPlace),
    Phone(Phone),
    Nomenclature(Nomenclature),
}

macro_rules! snapshot_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for EntitySnapshot {
                fn from(entity: $variant) -> Self {
                    EntitySnapshot::$variant(entity)
                }
            }
        )*
    };
}

snapshot_from!(Employee, Student, WorkPlace, Phone, Nomenclature);

impl EntitySnapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySnapshot::Employee(_) => EntityKind::Employee,
            EntitySnapshot::Student(_) => EntityKind::Student,
            EntitySnapshot::WorkPlace(_) => EntityKind::WorkPlace,
            EntitySnapshot::Phone(_) => EntityKind::Phone,
            EntitySnapshot::Nomenclature(_) => EntityKind::Nomenclature,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            EntitySnapshot::Employee(e) => e.id(),
            EntitySnapshot::Student(s) => s.id(),
            EntitySnapshot::WorkPlace(w) => w.id(),
            EntitySnapshot::Phone(p) => p.id(),
            EntitySnapshot::Nomenclature(n) => n.id(),
        }
    }

    /// Whether the entity has a document in the index.
    ///
    /// Inactive phones and nomenclature are kept relationally only.
    pub fn is_indexed(&self) -> bool {
        match self {
            EntitySnapshot::Phone(p) => p.active,
            EntitySnapshot::Nomenclature(n) => n.active,
            _ => true,
        }
    }

    /// The entity's own index document.
    pub fn document(&self) -> SyncResult<Value> {
        match self {
            EntitySnapshot::Employee(e) => to_document(e),
            EntitySnapshot::Student(s) => to_document(s),
            EntitySnapshot::WorkPlace(w) => to_document(w),
            EntitySnapshot::Phone(p) => to_document(p),
            EntitySnapshot::Nomenclature(n) => to_document(n),
        }
    }

    /// The summary copied into documents that embed this entity.
    pub fn summary(&self) -> SyncResult<Value> {
        let kind = self.kind().as_str();
        match self {
            EntitySnapshot::Employee(e) => to_json(kind, &EmployeeSummary::from(e)),
            EntitySnapshot::WorkPlace(w) => to_json(kind, &WorkPlaceSummary::from(w)),
            EntitySnapshot::Phone(p) => to_json(kind, &PhoneSummary::from(p)),
            EntitySnapshot::Nomenclature(n) => Ok(serde_json::json!({
                "id": n.id,
                "name": n.name,
            })),
            EntitySnapshot::Student(s) => Ok(serde_json::json!({ "id": s.id })),
        }
    }
}

/// One top-level document field that differs between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub previous: Value,
    pub current: Value,
}

/// Diffs the top-level fields of two documents.
pub fn diff_documents(previous: &Value, current: &Value) -> Vec<FieldChange> {
    let empty = serde_json::Map::new();
    let before = previous.as_object().unwrap_or(&empty);
    let after = current.as_object().unwrap_or(&empty);

    before
        .keys()
        .chain(after.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|field| {
            let old = before.get(field).cloned().unwrap_or(Value::Null);
            let new = after.get(field).cloned().unwrap_or(Value::Null);
            (old != new).then(|| FieldChange {
                field: field.clone(),
                previous: old,
                current: new,
            })
        })
        .collect()
}

/// A committed change to one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A new entity was persisted.
    Created { entity: EntitySnapshot },

    /// An existing entity was overwritten.
    Updated {
        previous: EntitySnapshot,
        current: EntitySnapshot,
        changes: Vec<FieldChange>,
    },

    /// An entity was deleted. `dependents` are nomenclature descendants
    /// deleted with it.
    Deleted {
        entity: EntitySnapshot,
        dependents: Vec<EntitySnapshot>,
    },

    /// An entity was enabled or disabled without being deleted.
    /// `dependents` are nomenclature descendants toggled with it.
    StatusChanged {
        entity: EntitySnapshot,
        enabled: bool,
        dependents: Vec<EntitySnapshot>,
    },
}

impl ChangeEvent {
    pub fn created(entity: impl Into<EntitySnapshot>) -> Self {
        ChangeEvent::Created {
            entity: entity.into(),
        }
    }

    /// An update event, diffing the projected documents of both snapshots.
    pub fn updated(previous: impl Into<EntitySnapshot>, current: impl Into<EntitySnapshot>) -> Self {
        let previous = previous.into();
        let current = current.into();
        let changes = match (previous.document(), current.document()) {
            (Ok(before), Ok(after)) => diff_documents(&before, &after),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(kind = %current.kind(), id = %current.id(), error = %e, "Could not diff snapshots");
                Vec::new()
            }
        };
        ChangeEvent::Updated {
            previous,
            current,
            changes,
        }
    }

    pub fn deleted(entity: impl Into<EntitySnapshot>, dependents: Vec<EntitySnapshot>) -> Self {
        ChangeEvent::Deleted {
            entity: entity.into(),
            dependents,
        }
    }

    pub fn status_changed(
        entity: impl Into<EntitySnapshot>,
        enabled: bool,
        dependents: Vec<EntitySnapshot>,
    ) -> Self {
        ChangeEvent::StatusChanged {
            entity: entity.into(),
            enabled,
            dependents,
        }
    }

    /// The snapshot the event is about (the current one for updates).
    pub fn entity(&self) -> &EntitySnapshot {
        match self {
            ChangeEvent::Created { entity } => entity,
            ChangeEvent::Updated { current, .. } => current,
            ChangeEvent::Deleted { entity, .. } => entity,
            ChangeEvent::StatusChanged { entity, .. } => entity,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.entity().kind()
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity().id()
    }

    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::Created { .. } => "created",
            ChangeEvent::Updated { .. } => "updated",
            ChangeEvent::Deleted { .. } => "deleted",
            ChangeEvent::StatusChanged { enabled: true, .. } => "enabled",
            ChangeEvent::StatusChanged { enabled: false, .. } => "disabled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Person;
    use serde_json::json;

    #[test]
    fn test_diff_documents() {
        let before = json!({"id": "1", "name": "Cesar", "email": null, "age": 30});
        let after = json!({"id": "1", "name": "Cesar Jr", "email": null, "gender": "M"});

        let changes = diff_documents(&before, &after);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["age", "gender", "name"]);
        assert_eq!(changes[2].previous, json!("Cesar"));
        assert_eq!(changes[2].current, json!("Cesar Jr"));
    }

    #[test]
    fn test_updated_event_carries_diff() {
        let before = Employee::new(Person::new("1", "Cesar"));
        let mut after = before.clone();
        after.person.name = "Cesar Jr".to_string();

        let event = ChangeEvent::updated(before, after.clone());
        assert_eq!(event.kind(), EntityKind::Employee);
        assert_eq!(event.entity_id(), after.id);
        assert_eq!(event.name(), "updated");
        let ChangeEvent::Updated { changes, .. } = event else {
            panic!("expected an update");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "name");
    }

    #[test]
    fn test_snapshot_indexing_rules() {
        let mut phone = Phone::new(5551234);
        assert!(EntitySnapshot::from(phone.clone()).is_indexed());
        phone.active = false;
        assert!(!EntitySnapshot::from(phone).is_indexed());
        assert!(EntitySnapshot::from(WorkPlace::new("Lab")).is_indexed());
    }

    #[test]
    fn test_summary_shapes() {
        let employee = Employee::new(Person::new("1", "Cesar"));
        let summary = EntitySnapshot::from(employee).summary().unwrap();
        assert_eq!(summary["name"], "Cesar");
        assert!(summary.get("work_place").is_none());

        let nomenclature = Nomenclature::new("Doctor", crate::types::NomenclatureKind::Category);
        let summary = EntitySnapshot::from(nomenclature).summary().unwrap();
        assert_eq!(summary["name"], "Doctor");
    }
}
