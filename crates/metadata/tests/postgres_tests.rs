//! PostgreSQL-specific integration tests using testcontainers.
//!
//! These tests require Docker to be running. Set SKIP_POSTGRES_TESTS=1 to skip.

mod common;

use common::postgres_or_skip;
use pinovara_core::AttachmentKind;
use pinovara_core::config::MetadataConfig;
use pinovara_metadata::models::NewAttachment;
use time::OffsetDateTime;

#[tokio::test]
async fn test_postgres_migrate_is_idempotent() {
    let Some(metadata) = postgres_or_skip().await else {
        return;
    };
    let store = metadata.store();
    let org = store
        .create_organization("Cooperativa", Some("uuid:pg"))
        .await
        .unwrap();

    store.migrate().await.expect("Second migration failed");

    let fetched = store.get_organization(org.id).await.unwrap().unwrap();
    assert_eq!(fetched.odk_uri.as_deref(), Some("uuid:pg"));
}

#[tokio::test]
async fn test_postgres_from_config_url() {
    let Some(metadata) = postgres_or_skip().await else {
        return;
    };
    let config = MetadataConfig::Postgres {
        url: Some(metadata.url.clone()),
        host: None,
        port: None,
        username: None,
        password: None,
        database: None,
        ssl_mode: None,
        max_connections: 2,
        statement_timeout_ms: Some(5_000),
    };

    let store = pinovara_metadata::from_config(&config).await.unwrap();
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_postgres_positions_stored_as_integers() {
    let Some(metadata) = postgres_or_skip().await else {
        return;
    };
    let store = metadata.store();
    let org = store.create_organization("A", None).await.unwrap();

    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        store
            .create_attachment(
                AttachmentKind::Document,
                &NewAttachment {
                    organization_id: org.id,
                    file_name: name.to_string(),
                    uploaded_by: "tecnico@pinovara.org".to_string(),
                    observation: None,
                    created_at: OffsetDateTime::now_utc(),
                },
            )
            .await
            .unwrap();
    }

    let positions: Vec<i32> = sqlx::query_scalar(
        "SELECT position FROM organization_documents WHERE organization_id = $1 ORDER BY id",
    )
    .bind(org.id)
    .fetch_all(metadata.pool())
    .await
    .unwrap();
    assert_eq!(positions, vec![1, 2, 3]);
}
