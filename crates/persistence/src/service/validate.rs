//! Input checks run before anything is written.

use crate::core::{NomenclatureTree, Repository};
use crate::error::{StorageResult, ValidationError};
use crate::specification::{Criteria, JoinMode};
use crate::types::{
    Filter, Nomenclature, NomenclatureCriteria, Person, Phone, StringFilter, WorkPlace,
    relation_id,
};

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn person(person: &Person) -> Result<(), ValidationError> {
    require("ci", &person.ci)?;
    require("name", &person.name)
}

pub(crate) fn work_place(work_place: &WorkPlace) -> Result<(), ValidationError> {
    require("name", &work_place.name)
}

pub(crate) fn phone(phone: &Phone) -> Result<(), ValidationError> {
    if !phone.has_owner() {
        return Err(ValidationError::InvalidReference {
            field: "owner".to_string(),
            message: "a phone needs an employee or a workplace".to_string(),
        });
    }
    Ok(())
}

/// Checks the name, rejects parent cycles and duplicate siblings.
pub(crate) async fn nomenclature<S>(store: &S, nomenclature: &Nomenclature) -> StorageResult<()>
where
    S: Repository<Nomenclature> + NomenclatureTree,
{
    require("name", &nomenclature.name)?;

    let parent_id = relation_id(&nomenclature.parent);
    if let Some(parent_id) = parent_id {
        // The subtree of a node not saved yet is empty.
        let subtree = store.subtree_ids(nomenclature.id).await?;
        if subtree.contains(&parent_id) {
            return Err(ValidationError::InvalidReference {
                field: "parent".to_string(),
                message: format!("{parent_id} is {} or one of its descendants", nomenclature.id),
            }
            .into());
        }
    }

    let siblings = NomenclatureCriteria {
        id: Some(Filter::not_equals(nomenclature.id)),
        name: Some(StringFilter::equals(nomenclature.name.clone())),
        kind: Some(Filter::equals(nomenclature.kind)),
        parent_id: Some(match parent_id {
            Some(parent_id) => Filter::equals(parent_id),
            None => Filter::specified(false),
        }),
        ..NomenclatureCriteria::default()
    };
    let duplicates = store
        .count(&siblings.to_specification(JoinMode::And))
        .await?;
    if duplicates > 0 {
        return Err(ValidationError::DuplicateNomenclature {
            name: nomenclature.name.clone(),
            kind: nomenclature.kind.to_string(),
        }
        .into());
    }
    Ok(())
}
