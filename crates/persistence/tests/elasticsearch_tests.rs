//! Elasticsearch document index integration tests.
//!
//! Tests that require a running Elasticsearch instance use testcontainers
//! to spin up a real ES instance in Docker.
//!
//! Run with: `cargo test -p roster-persistence --features elasticsearch -- elasticsearch`

#![cfg(feature = "elasticsearch")]

use serde_json::json;

use roster_persistence::backends::elasticsearch::{
    ElasticsearchAuth, ElasticsearchConfig, ElasticsearchIndex, to_query,
};
use roster_persistence::core::{Backend, BackendKind, DocumentMatch};
use roster_persistence::types::EntityKind;

// ============================================================================
// Configuration Tests (no ES instance required)
// ============================================================================

#[test]
fn test_elasticsearch_config_defaults() {
    let config = ElasticsearchConfig::default();
    assert_eq!(config.nodes, vec!["http://localhost:9200".to_string()]);
    assert_eq!(config.index_prefix, "roster");
    assert_eq!(config.max_result_window, 10000);
    assert!(config.auth.is_none());
    assert!(config.refresh_after_write);
}

#[test]
fn test_elasticsearch_config_serialization() {
    let config = ElasticsearchConfig {
        nodes: vec!["http://es1:9200".to_string()],
        index_prefix: "staff".to_string(),
        auth: Some(ElasticsearchAuth::Basic {
            username: "elastic".to_string(),
            password: "changeme".to_string(),
        }),
        ..Default::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    let deserialized: ElasticsearchConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.nodes, config.nodes);
    assert_eq!(deserialized.index_prefix, "staff");
    assert!(matches!(
        deserialized.auth,
        Some(ElasticsearchAuth::Basic { .. })
    ));
}

#[test]
fn test_index_creation_does_not_connect() {
    let index = ElasticsearchIndex::new(ElasticsearchConfig::default()).unwrap();
    assert_eq!(index.kind(), BackendKind::Elasticsearch);
    assert_eq!(index.index_name(EntityKind::Phone), "roster_phone");
    assert_eq!(index.index_name(EntityKind::Nomenclature), "roster_nomenclature");
}

#[test]
fn test_invalid_node_url() {
    let config = ElasticsearchConfig {
        nodes: vec!["not a url".to_string()],
        ..Default::default()
    };
    assert!(ElasticsearchIndex::new(config).is_err());
}

#[test]
fn test_embedded_reference_query() {
    let matcher = DocumentMatch::equals("employees.id", "e1");
    assert_eq!(to_query(&matcher), json!({"term": {"employees.id": "e1"}}));
}

// ============================================================================
// Integration Tests (require Docker)
// ============================================================================

mod es_integration {
    use std::sync::Arc;

    use serde_json::json;

    use roster_persistence::backends::elasticsearch::{ElasticsearchConfig, ElasticsearchIndex};
    use roster_persistence::core::{
        Backend, DocumentIndex, DocumentMatch, FieldPatch, IndexKind,
    };
    use roster_persistence::sync::{ChangeEvent, SyncEngine};
    use roster_persistence::types::{
        Employee, Nomenclature, NomenclatureKind, Person, Phone, Relation, WorkPlace,
    };

    use testcontainers::ImageExt;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::elastic_search::ElasticSearch;
    use tokio::sync::OnceCell;

    /// Shared Elasticsearch container reused across all tests in this module.
    struct SharedEs {
        host: String,
        port: u16,
        /// Kept alive for the duration of the test binary; dropped at process exit.
        _container: testcontainers::ContainerAsync<ElasticSearch>,
    }

    static SHARED_ES: OnceCell<SharedEs> = OnceCell::const_new();

    async fn shared_es() -> &'static SharedEs {
        SHARED_ES
            .get_or_init(|| async {
                let container = ElasticSearch::default()
                    .with_env_var("ES_JAVA_OPTS", "-Xms256m -Xmx256m")
                    .with_startup_timeout(std::time::Duration::from_secs(120))
                    .start()
                    .await
                    .expect("Failed to start Elasticsearch container");

                let port = container
                    .get_host_port_ipv4(9200)
                    .await
                    .expect("Failed to get host port");

                let host = container
                    .get_host()
                    .await
                    .expect("Failed to get host")
                    .to_string();

                SharedEs {
                    host,
                    port,
                    _container: container,
                }
            })
            .await
    }

    /// Creates an initialized index with a unique prefix per test.
    async fn create_index() -> Arc<ElasticsearchIndex> {
        let es = shared_es().await;
        let prefix = format!("test_{}", uuid::Uuid::new_v4().simple());
        let config = ElasticsearchConfig {
            nodes: vec![format!("http://{}:{}", es.host, es.port)],
            index_prefix: prefix,
            number_of_replicas: 0,
            refresh_interval: "1ms".to_string(),
            ..Default::default()
        };
        let index = ElasticsearchIndex::new(config).expect("Failed to create index client");
        index.initialize().await.expect("Failed to initialize indices");
        Arc::new(index)
    }

    #[tokio::test]
    async fn es_health_and_initialize_are_repeatable() {
        let index = create_index().await;
        index.health_check().await.expect("Cluster unhealthy");
        index.initialize().await.expect("Second initialize failed");
    }

    #[tokio::test]
    async fn es_document_round_trip() {
        let index = create_index().await;
        let doc = json!({"id": "p1", "number": 5551234, "active": true, "employee": null, "work_place": null});

        index.upsert(IndexKind::Phone, "p1", doc.clone()).await.unwrap();
        assert_eq!(index.get(IndexKind::Phone, "p1").await.unwrap(), Some(doc));
        assert_eq!(index.count(IndexKind::Phone).await.unwrap(), 1);

        assert!(index.delete_by_id(IndexKind::Phone, "p1").await.unwrap());
        assert!(!index.delete_by_id(IndexKind::Phone, "p1").await.unwrap());
        assert!(index.get(IndexKind::Phone, "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn es_update_and_delete_by_query() {
        let index = create_index().await;
        for (id, owner) in [("p1", Some("e1")), ("p2", Some("e1")), ("p3", None)] {
            let employee = owner.map(|o| json!({"id": o, "name": "Cesar"}));
            index
                .upsert(IndexKind::Phone, id, json!({"id": id, "employee": employee, "work_place": null}))
                .await
                .unwrap();
        }

        let owned = DocumentMatch::equals("employee.id", "e1");
        let patch = FieldPatch::set("employee.name", "Cesar Augusto");
        assert_eq!(index.update_by_query(IndexKind::Phone, &owned, &patch).await.unwrap(), 2);
        let p2 = index.get(IndexKind::Phone, "p2").await.unwrap().unwrap();
        assert_eq!(p2["employee"]["name"], "Cesar Augusto");

        // Reapplying the same patch changes nothing.
        assert_eq!(index.update_by_query(IndexKind::Phone, &owned, &patch).await.unwrap(), 0);

        let orphans = owned.and(DocumentMatch::missing("work_place"));
        assert_eq!(index.delete_by_query(IndexKind::Phone, &orphans).await.unwrap(), 2);
        assert_eq!(index.count(IndexKind::Phone).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn es_sync_engine_scenario() {
        let index = create_index().await;
        let engine = SyncEngine::new(index.clone()).unwrap();

        let category = Nomenclature::new("Profesor", NomenclatureKind::Category);
        let work_place = WorkPlace::new("Rectorado");
        let mut cesar = Employee::new(Person::new("85010112345", "Cesar"));
        cesar.category = Some(Relation::loaded(category.clone()));
        cesar.work_place = Some(Relation::loaded(work_place.clone()));
        let mut phone = Phone::new(5550001);
        phone.employee = Some(Relation::loaded(cesar.clone()));

        for event in [
            ChangeEvent::created(category.clone()),
            ChangeEvent::created(work_place.clone()),
            ChangeEvent::created(cesar.clone()),
            ChangeEvent::created(phone.clone()),
        ] {
            assert_eq!(engine.publish(&event).await.failed, 0);
        }

        let doc = index
            .get(IndexKind::WorkPlace, &work_place.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["employees"][0]["name"], "Cesar");
        assert_eq!(doc["employees"][0]["category"], "Profesor");

        let mut renamed = category.clone();
        renamed.name = "Profesor Titular".to_string();
        assert_eq!(
            engine.publish(&ChangeEvent::updated(category, renamed)).await.failed,
            0
        );
        let phone_doc = index
            .get(IndexKind::Phone, &phone.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(phone_doc["employee"]["category"], "Profesor Titular");

        assert_eq!(
            engine
                .publish(&ChangeEvent::deleted(cesar, Vec::new()))
                .await
                .failed,
            0
        );
        assert!(
            index
                .get(IndexKind::Phone, &phone.id.to_string())
                .await
                .unwrap()
                .is_none()
        );
        let doc = index
            .get(IndexKind::WorkPlace, &work_place.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["employees"], json!([]));
    }
}
