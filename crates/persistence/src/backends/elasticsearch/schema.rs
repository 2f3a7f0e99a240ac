//! Elasticsearch index settings and mappings.
//!
//! Every index kind shares one mapping. Documents are stored as projected:
//! scalar strings are keywords (exact match, as the sync layer's term
//! queries need) with a `text` sub-field for full-text search. Embedded
//! summaries are mapped dynamically as plain objects, so `employees.id`
//! matches any element of the collection.

use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts, IndicesPutTemplateParts};
use serde_json::{Value, json};

use crate::core::IndexKind;
use crate::error::BackendError;

use super::backend::{ElasticsearchConfig, ElasticsearchIndex};

fn internal(message: String) -> BackendError {
    BackendError::Internal {
        backend_name: "elasticsearch".to_string(),
        message,
        source: None,
    }
}

/// Creates the settings and mappings applied to every index kind.
pub fn create_index_mapping(config: &ElasticsearchConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas,
            "index.max_result_window": config.max_result_window,
            "refresh_interval": config.refresh_interval,
            "analysis": {
                "normalizer": {
                    "lowercase_normalizer": {
                        "type": "custom",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": {
            "date_detection": false,
            "dynamic_templates": [
                {
                    "references": {
                        "match": "*_id",
                        "mapping": { "type": "keyword" }
                    }
                },
                {
                    "strings": {
                        "match_mapping_type": "string",
                        "mapping": {
                            "type": "keyword",
                            "fields": {
                                "text": { "type": "text", "analyzer": "standard" },
                                "lowercase": {
                                    "type": "keyword",
                                    "normalizer": "lowercase_normalizer"
                                }
                            }
                        }
                    }
                }
            ],
            "properties": {
                "id": { "type": "keyword" },
                "active": { "type": "boolean" },
                "start_date": { "type": "date", "format": "strict_date" }
            }
        }
    })
}

/// Creates an index template so new indices automatically get the mapping.
pub async fn create_index_template(index: &ElasticsearchIndex) -> Result<(), BackendError> {
    let template_name = format!("{}_template", index.config().index_prefix);
    let pattern = format!("{}_*", index.config().index_prefix);
    let mapping = create_index_mapping(index.config());

    let template_body = json!({
        "index_patterns": [pattern],
        "settings": mapping["settings"],
        "mappings": mapping["mappings"]
    });

    let response = index
        .client()
        .indices()
        .put_template(IndicesPutTemplateParts::Name(&template_name))
        .body(template_body)
        .send()
        .await
        .map_err(|e| internal(format!("Failed to create index template: {}", e)))?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(internal(format!(
            "Failed to create index template (status {}): {}",
            status, body
        )));
    }

    tracing::info!(
        template = %template_name,
        pattern = %pattern,
        "Created Elasticsearch index template"
    );
    Ok(())
}

/// Ensures the index for one kind exists, creating it if necessary.
pub async fn ensure_index(index: &ElasticsearchIndex, kind: IndexKind) -> Result<(), BackendError> {
    let name = index.index_name(kind);

    let exists_response = index
        .client()
        .indices()
        .exists(IndicesExistsParts::Index(&[&name]))
        .send()
        .await
        .map_err(|e| internal(format!("Failed to check index existence: {}", e)))?;

    if exists_response.status_code().is_success() {
        return Ok(());
    }

    let response = index
        .client()
        .indices()
        .create(IndicesCreateParts::Index(&name))
        .body(create_index_mapping(index.config()))
        .send()
        .await
        .map_err(|e| internal(format!("Failed to create index {}: {}", name, e)))?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        // Another writer created it first.
        if body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        return Err(internal(format!(
            "Failed to create index {} (status {}): {}",
            name, status, body
        )));
    }

    tracing::debug!(index = %name, "Created Elasticsearch index");
    Ok(())
}
