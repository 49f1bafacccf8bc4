//! External database connection repository.

use crate::error::MetadataResult;
use crate::models::{DbConnectionRow, NewDbConnection};
use async_trait::async_trait;

/// Repository for the `db_connections` table.
#[async_trait]
pub trait ConnectionRepo: Send + Sync {
    /// Insert a connection row.
    async fn create_connection(&self, conn: &NewDbConnection) -> MetadataResult<DbConnectionRow>;

    /// Get the active connection with this name (newest wins).
    async fn get_active_connection(&self, name: &str) -> MetadataResult<Option<DbConnectionRow>>;
}
