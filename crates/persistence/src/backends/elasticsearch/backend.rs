//! Elasticsearch client, configuration and health.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::Elasticsearch;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::IndicesRefreshParts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Backend, BackendKind, IndexKind};
use crate::error::{BackendError, StorageError, StorageResult, SyncError, SyncResult};
use crate::types::EntityKind;

use super::schema;

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    pub nodes: Vec<String>,

    /// Index name prefix (default: `"roster"`).
    /// Indices are named `{prefix}_{kind}`, e.g. `roster_work_place`.
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Number of primary shards per index (default: 1).
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,

    /// Number of replica shards per index (default: 1).
    #[serde(default = "default_replicas")]
    pub number_of_replicas: u32,

    /// Refresh interval (default: "1s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Maximum result window size (default: 10000). Also the most documents
    /// one update or search by query will touch.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u32,

    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// Wait for a refresh after every write (default: true).
    ///
    /// Patches are applied by query, so a write that is not yet searchable
    /// would be missed by the next patch.
    #[serde(default = "default_refresh_after_write")]
    pub refresh_after_write: bool,
}

fn default_index_prefix() -> String {
    "roster".to_string()
}

fn default_shards() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_max_result_window() -> u32 {
    10000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_refresh_after_write() -> bool {
    true
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            index_prefix: default_index_prefix(),
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
            refresh_interval: default_refresh_interval(),
            max_result_window: default_max_result_window(),
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
            refresh_after_write: default_refresh_after_write(),
        }
    }
}

/// Elasticsearch implementation of [`DocumentIndex`](crate::core::DocumentIndex).
///
/// Each index kind gets its own index. Documents are stored as projected,
/// with `_id` equal to the entity id.
pub struct ElasticsearchIndex {
    client: Elasticsearch,
    config: ElasticsearchConfig,
}

impl Debug for ElasticsearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchIndex")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchIndex {
    /// Creates a new index client with the given configuration.
    ///
    /// No request is sent until the first operation.
    pub fn new(config: ElasticsearchConfig) -> StorageResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Builds the Elasticsearch client from configuration.
    fn build_client(config: &ElasticsearchConfig) -> StorageResult<Elasticsearch> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url = url.parse().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "elasticsearch".to_string(),
                message: format!("Invalid URL: {}", e),
            })
        })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder.build().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "elasticsearch".to_string(),
                message: format!("Failed to build transport: {}", e),
            })
        })?;

        Ok(Elasticsearch::new(transport))
    }

    pub(crate) fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Returns the index configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Returns the Elasticsearch index name for an index kind.
    pub fn index_name(&self, kind: IndexKind) -> String {
        format!("{}_{}", self.config.index_prefix, kind.as_str())
    }

    /// Makes recently written documents of one kind searchable.
    pub async fn refresh(&self, kind: IndexKind) -> SyncResult<()> {
        let index = self.index_name(kind);
        self.client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[&index]))
            .send()
            .await
            .map_err(|e| SyncError::IndexUnavailable {
                message: format!("Failed to refresh index {}: {}", index, e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl Backend for ElasticsearchIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Elasticsearch
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .cluster()
            .health(elasticsearch::cluster::ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable {
                backend_name: "elasticsearch".to_string(),
                message: format!("Health check failed: {}", e),
            })?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(BackendError::Unavailable {
                backend_name: "elasticsearch".to_string(),
                message: format!("Cluster health returned status {}", status),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Internal {
                backend_name: "elasticsearch".to_string(),
                message: format!("Failed to parse health response: {}", e),
                source: None,
            })?;

        let cluster_status = body
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        if cluster_status == "red" {
            return Err(BackendError::Unavailable {
                backend_name: "elasticsearch".to_string(),
                message: format!("Cluster status is red: {:?}", body),
            });
        }

        Ok(())
    }

    /// Installs the index template and creates one index per kind.
    async fn initialize(&self) -> Result<(), BackendError> {
        schema::create_index_template(self).await?;
        for kind in EntityKind::ALL {
            schema::ensure_index(self, kind).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ElasticsearchConfig::default();
        assert_eq!(config.index_prefix, "roster");
        assert_eq!(config.number_of_shards, 1);
        assert_eq!(config.number_of_replicas, 1);
        assert!(config.refresh_after_write);
        assert_eq!(config.nodes, vec!["http://localhost:9200"]);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: ElasticsearchConfig = serde_json::from_str(
            r#"{"nodes": ["http://es:9200"], "index_prefix": "staff", "refresh_after_write": false}"#,
        )
        .unwrap();
        assert_eq!(config.index_prefix, "staff");
        assert!(!config.refresh_after_write);
        assert_eq!(config.max_result_window, 10000);
    }

    #[test]
    fn test_index_name() {
        let index = ElasticsearchIndex::new(ElasticsearchConfig::default()).unwrap();
        assert_eq!(index.index_name(EntityKind::Employee), "roster_employee");
        assert_eq!(index.index_name(EntityKind::WorkPlace), "roster_work_place");
    }

    #[test]
    fn test_backend_kind() {
        let index = ElasticsearchIndex::new(ElasticsearchConfig::default()).unwrap();
        assert_eq!(index.kind(), BackendKind::Elasticsearch);
        assert_eq!(index.name(), "elasticsearch");
    }
}
