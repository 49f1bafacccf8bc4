//! Remote connection resolution from `db_connections`.

use crate::error::{SyncError, SyncResult};
use pinovara_metadata::models::DbConnectionRow;
use pinovara_metadata::repos::ConnectionRepo;
use sqlx::postgres::PgConnectOptions;
use tracing::debug;

/// Connection parameters for the ODK database.
#[derive(Clone)]
pub struct RemoteConnection {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    password: String,
}

impl std::fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RemoteConnection {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build from a stored row, rejecting ports outside the u16 range.
    pub fn from_row(row: &DbConnectionRow) -> SyncResult<Self> {
        let port = u16::try_from(row.port).map_err(|_| {
            SyncError::Config(format!(
                "connection '{}' has invalid port {}",
                row.name, row.port
            ))
        })?;
        Ok(Self::new(
            &row.name,
            &row.host,
            port,
            &row.database,
            &row.username,
            &row.password,
        ))
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Postgres connect options for this connection.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }
}

/// Look up the active connection with the given name.
pub async fn resolve_connection<R>(repo: &R, name: &str) -> SyncResult<RemoteConnection>
where
    R: ConnectionRepo + ?Sized,
{
    let row = repo
        .get_active_connection(name)
        .await?
        .ok_or_else(|| SyncError::ConfigurationNotFound(name.to_string()))?;

    let conn = RemoteConnection::from_row(&row)?;
    debug!(connection = ?conn, "Resolved ODK connection");
    Ok(conn)
}
