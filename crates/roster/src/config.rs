//! Command line configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ROSTER_DATABASE` | roster.db | SQLite database path, or `:memory:` |
//! | `ROSTER_LOG_LEVEL` | info | Log level |
//! | `ROSTER_REFERENCE_RESOLUTION` | strict | `strict` or `lenient` |
//! | `ROSTER_INDEX` | memory | Document index: `memory` or `elasticsearch` |
//! | `ROSTER_ELASTICSEARCH_NODES` | http://localhost:9200 | Comma-separated node URLs |
//! | `ROSTER_ELASTICSEARCH_INDEX_PREFIX` | roster | Index name prefix |
//! | `ROSTER_ELASTICSEARCH_USERNAME` | | Basic auth username |
//! | `ROSTER_ELASTICSEARCH_PASSWORD` | | Basic auth password |

use std::fmt;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use roster_persistence::service::{ReferenceResolution, ServiceConfig};
use roster_persistence::specification::JoinMode;
use roster_persistence::types::{EntityKind, MAX_PAGE_SIZE};

/// Which document index the commands write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    /// A process-local index, discarded on exit.
    Memory,
    Elasticsearch,
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(IndexBackend::Memory),
            "elasticsearch" | "es" => Ok(IndexBackend::Elasticsearch),
            other => Err(format!(
                "unknown index backend '{other}': expected 'memory' or 'elasticsearch'"
            )),
        }
    }
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Memory => write!(f, "memory"),
            IndexBackend::Elasticsearch => write!(f, "elasticsearch"),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "roster")]
#[command(about = "Personnel store and search index maintenance")]
pub struct RosterConfig {
    /// SQLite database path, or `:memory:`.
    #[arg(long, env = "ROSTER_DATABASE", default_value = "roster.db")]
    pub database: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ROSTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Handling of references to missing entities.
    #[arg(long, env = "ROSTER_REFERENCE_RESOLUTION", default_value = "strict")]
    pub reference_resolution: ReferenceResolution,

    /// Document index backend.
    #[arg(long, env = "ROSTER_INDEX", default_value = "memory")]
    pub index: IndexBackend,

    /// Elasticsearch node URLs (comma-separated).
    #[arg(
        long,
        env = "ROSTER_ELASTICSEARCH_NODES",
        default_value = "http://localhost:9200"
    )]
    pub elasticsearch_nodes: String,

    /// Elasticsearch index name prefix.
    #[arg(long, env = "ROSTER_ELASTICSEARCH_INDEX_PREFIX", default_value = "roster")]
    pub elasticsearch_index_prefix: String,

    #[arg(long, env = "ROSTER_ELASTICSEARCH_USERNAME")]
    pub elasticsearch_username: Option<String>,

    #[arg(long, env = "ROSTER_ELASTICSEARCH_PASSWORD")]
    pub elasticsearch_password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Creates or migrates the database schema and the index mappings.
    Init,

    /// Checks that the database and the index are reachable.
    Health,

    /// Clears the document index and rebuilds it from the database.
    Rebuild {
        /// Entities loaded per batch.
        #[arg(long, default_value = "500")]
        batch_size: u32,
    },

    /// Runs a criteria query and prints the matching documents as JSON lines.
    Search {
        /// Entity kind (employee, student, work-place, phone, nomenclature).
        kind: EntityKind,

        /// Criteria as camelCase JSON, e.g. `{"name": {"contains": "ana"}}`.
        #[arg(long, default_value = "{}")]
        criteria: String,

        /// How the filters combine.
        #[arg(long, default_value = "and")]
        mode: JoinMode,

        #[arg(long, default_value = "0")]
        offset: u32,

        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

impl RosterConfig {
    /// Elasticsearch node URLs, blanks removed.
    pub fn elasticsearch_nodes(&self) -> Vec<String> {
        self.elasticsearch_nodes
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The service configuration for this invocation.
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig {
            reference_resolution: self.reference_resolution,
            ..ServiceConfig::default()
        };
        if let Command::Rebuild { batch_size } = self.command {
            config.rebuild_batch_size = batch_size;
        }
        config
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.trim().is_empty() {
            errors.push("Database path cannot be empty".to_string());
        }

        if self.index == IndexBackend::Elasticsearch && self.elasticsearch_nodes().is_empty() {
            errors.push("At least one Elasticsearch node is required".to_string());
        }

        if self.elasticsearch_username.is_some() != self.elasticsearch_password.is_some() {
            errors.push("Elasticsearch username and password must be set together".to_string());
        }

        match &self.command {
            Command::Rebuild { batch_size: 0 } => {
                errors.push("Batch size cannot be 0".to_string());
            }
            Command::Search { limit, .. } if *limit == 0 || *limit > MAX_PAGE_SIZE => {
                errors.push(format!("Limit must be between 1 and {MAX_PAGE_SIZE}"));
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
