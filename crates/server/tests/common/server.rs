//! Server test utilities.

use super::remote::ScriptedRemote;
use pinovara_core::config::AppConfig;
use pinovara_metadata::models::NewDbConnection;
use pinovara_metadata::{MetadataStore, SqliteStore};
use pinovara_server::{AppState, create_router};
use pinovara_storage::AttachmentStores;
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub remote: Arc<ScriptedRemote>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and an ODK connection row.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path());
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"))
                .await
                .expect("Failed to create metadata store"),
        );
        metadata
            .create_connection(&NewDbConnection {
                name: config.odk.connection_name.clone(),
                host: "odk.example.org".to_string(),
                port: 5432,
                database: "odk_prod".to_string(),
                username: "odk".to_string(),
                password: "secret".to_string(),
                active: true,
            })
            .await
            .expect("Failed to create ODK connection");

        let stores = AttachmentStores::from_config(&config.uploads)
            .await
            .expect("Failed to create upload stores");

        let remote = ScriptedRemote::new();
        let state = AppState::new(config, metadata, stores, remote.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            remote,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Create an organization and return its ID.
    pub async fn create_organization(&self, odk_uri: Option<&str>) -> i64 {
        self.metadata()
            .create_organization("Cooperativa", odk_uri)
            .await
            .expect("Failed to create organization")
            .id
    }
}
