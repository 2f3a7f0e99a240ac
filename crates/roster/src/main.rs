//! Roster
//!
//! Maintenance commands for the personnel store: schema setup, health
//! checks, index rebuilds and criteria searches.

mod config;

use std::sync::Arc;

use clap::Parser;
use roster_persistence::core::{Backend, DocumentIndex};
use roster_persistence::sync::SyncEngine;
use tracing::info;

use config::{Command, IndexBackend, RosterConfig};

#[cfg(feature = "sqlite")]
use roster_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};

/// Initializes the tracing subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("roster={level},roster_persistence={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Opens the SQLite store and brings its schema up to date.
#[cfg(feature = "sqlite")]
fn create_sqlite_backend(config: &RosterConfig) -> anyhow::Result<SqliteBackend> {
    info!(database = %config.database, "Opening SQLite store");
    let backend = SqliteBackend::with_config(&config.database, SqliteBackendConfig::default())?;
    backend.init_schema()?;
    Ok(backend)
}

/// A document index paired with its backend handle for health and setup.
struct Index {
    documents: Arc<dyn DocumentIndex>,
    backend: Arc<dyn Backend>,
}

fn create_index(config: &RosterConfig) -> anyhow::Result<Index> {
    match config.index {
        IndexBackend::Memory => {
            use roster_persistence::backends::memory::MemoryIndex;

            info!("Using in-memory document index");
            let index = Arc::new(MemoryIndex::new());
            Ok(Index {
                documents: index.clone(),
                backend: index,
            })
        }
        IndexBackend::Elasticsearch => create_elasticsearch_index(config),
    }
}

#[cfg(feature = "elasticsearch")]
fn create_elasticsearch_index(config: &RosterConfig) -> anyhow::Result<Index> {
    use roster_persistence::backends::elasticsearch::{
        ElasticsearchAuth, ElasticsearchConfig, ElasticsearchIndex,
    };

    let auth = match (&config.elasticsearch_username, &config.elasticsearch_password) {
        (Some(username), Some(password)) => Some(ElasticsearchAuth::Basic {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    let nodes = config.elasticsearch_nodes();
    info!(
        nodes = ?nodes,
        index_prefix = %config.elasticsearch_index_prefix,
        "Using Elasticsearch document index"
    );

    let index = Arc::new(ElasticsearchIndex::new(ElasticsearchConfig {
        nodes,
        index_prefix: config.elasticsearch_index_prefix.clone(),
        auth,
        ..Default::default()
    })?);
    Ok(Index {
        documents: index.clone(),
        backend: index,
    })
}

/// Fallback when elasticsearch feature is not enabled.
#[cfg(not(feature = "elasticsearch"))]
fn create_elasticsearch_index(_config: &RosterConfig) -> anyhow::Result<Index> {
    anyhow::bail!(
        "The Elasticsearch index requires the 'elasticsearch' feature. \
         Build with: cargo build -p roster --features elasticsearch"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RosterConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        database = %config.database,
        index = %config.index,
        reference_resolution = %config.reference_resolution,
        "Starting roster"
    );

    run(config).await
}

#[cfg(feature = "sqlite")]
async fn run(config: RosterConfig) -> anyhow::Result<()> {
    use roster_persistence::service::PersonnelService;

    let store = Arc::new(create_sqlite_backend(&config)?);
    let index = create_index(&config)?;
    let sync = Arc::new(SyncEngine::new(index.documents.clone())?);
    let service = PersonnelService::new(store.clone(), sync, config.service_config());

    match config.command {
        Command::Init => {
            index.backend.initialize().await?;
            info!("Schema and index initialized");
        }
        Command::Health => {
            store.health_check().await?;
            index.backend.health_check().await?;
            println!("ok");
        }
        Command::Rebuild { .. } => {
            index.backend.initialize().await?;
            let report = service.rebuild_index().await?;
            for (kind, counts) in &report.kinds {
                println!(
                    "{kind}: indexed {}, skipped {}, failed {}",
                    counts.indexed, counts.skipped, counts.failed
                );
            }
            for error in &report.errors {
                eprintln!("{error}");
            }
            if !report.is_success() {
                anyhow::bail!("{} documents failed to index", report.total_failed());
            }
        }
        Command::Search {
            kind,
            criteria,
            mode,
            offset,
            limit,
        } => {
            let page = roster_persistence::PageRequest::new(offset, limit);
            for document in search::run(&service, kind, &criteria, mode, &page).await? {
                println!("{document}");
            }
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
mod search {
    use anyhow::Context;
    use roster_persistence::PageRequest;
    use roster_persistence::backends::sqlite::SqliteBackend;
    use roster_persistence::core::Repository;
    use roster_persistence::service::{PersonnelService, Resolve};
    use roster_persistence::specification::{EntityCriteria, JoinMode};
    use roster_persistence::sync::EntitySnapshot;
    use roster_persistence::types::{
        EmployeeCriteria, EntityKind, NomenclatureCriteria, PhoneCriteria, StudentCriteria,
        WorkPlaceCriteria,
    };
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    async fn documents<C>(
        service: &PersonnelService<SqliteBackend>,
        criteria: &str,
        mode: JoinMode,
        page: &PageRequest,
    ) -> anyhow::Result<Vec<Value>>
    where
        C: EntityCriteria + DeserializeOwned,
        C::Entity: Resolve + Into<EntitySnapshot>,
        SqliteBackend: Repository<C::Entity>,
    {
        let criteria: C = serde_json::from_str(criteria).context("Invalid criteria JSON")?;
        let entities = service.search(&criteria, mode, page).await?;
        entities
            .into_iter()
            .map(|entity| {
                let snapshot: EntitySnapshot = entity.into();
                Ok(snapshot.document()?)
            })
            .collect()
    }

    /// Runs a criteria search for one kind and projects the results.
    pub async fn run(
        service: &PersonnelService<SqliteBackend>,
        kind: EntityKind,
        criteria: &str,
        mode: JoinMode,
        page: &PageRequest,
    ) -> anyhow::Result<Vec<Value>> {
        match kind {
            EntityKind::Employee => documents::<EmployeeCriteria>(service, criteria, mode, page).await,
            EntityKind::Student => documents::<StudentCriteria>(service, criteria, mode, page).await,
            EntityKind::WorkPlace => {
                documents::<WorkPlaceCriteria>(service, criteria, mode, page).await
            }
            EntityKind::Phone => documents::<PhoneCriteria>(service, criteria, mode, page).await,
            EntityKind::Nomenclature => {
                documents::<NomenclatureCriteria>(service, criteria, mode, page).await
            }
        }
    }
}

#[cfg(not(feature = "sqlite"))]
compile_error!("The relational store requires the 'sqlite' feature");
