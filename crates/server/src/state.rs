//! Application state shared across handlers.

use pinovara_core::config::AppConfig;
use pinovara_metadata::MetadataStore;
use pinovara_odk::{OdkSync, RemoteSource};
use pinovara_storage::AttachmentStores;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Local metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Upload directories, one per attachment kind.
    pub stores: AttachmentStores,
    /// ODK sync service.
    pub sync: OdkSync,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        stores: AttachmentStores,
        remote: Arc<dyn RemoteSource>,
    ) -> Self {
        if config.odk.detect_content_mismatch {
            tracing::info!("ODK content mismatch detection enabled");
        }
        tracing::info!(
            connection = %config.odk.connection_name,
            prefixes = ?config.odk.table_prefixes,
            "ODK table prefixes are tried in order"
        );

        let sync = OdkSync::new(
            metadata.clone(),
            remote,
            stores.clone(),
            config.odk.clone(),
        );

        Self {
            config: Arc::new(config),
            metadata,
            stores,
            sync,
        }
    }
}
