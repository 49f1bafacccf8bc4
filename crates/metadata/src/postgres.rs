//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{AttachmentRepo, ConnectionRepo, OrganizationRepo};
use crate::store::{MetadataStore, schema_statements};
use async_trait::async_trait;
use pinovara_core::AttachmentKind;
use pinovara_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// Map the config SSL mode onto sqlx's.
pub fn sqlx_ssl_mode(mode: PgSslMode) -> SqlxPgSslMode {
    match mode {
        PgSslMode::Disable => SqlxPgSslMode::Disable,
        PgSslMode::Prefer => SqlxPgSslMode::Prefer,
        PgSslMode::Require => SqlxPgSslMode::Require,
    }
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }
        if let Some(pass) = password {
            opts = opts.password(pass);
        }
        if let Some(mode) = ssl_mode {
            opts = opts.ssl_mode(sqlx_ssl_mode(mode));
        }

        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements cannot hold several commands; run them one by one.
        for statement in schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl OrganizationRepo for PostgresStore {
    async fn create_organization(
        &self,
        name: &str,
        odk_uri: Option<&str>,
    ) -> MetadataResult<OrganizationRow> {
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, OrganizationRow>(
            r#"
            INSERT INTO organizations (name, odk_uri, removed, created_at, updated_at)
            VALUES ($1, $2, FALSE, $3, $3)
            RETURNING id, name, odk_uri, removed, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(odk_uri)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, format!("odk_uri {}", odk_uri.unwrap_or_default()))
        })
    }

    async fn get_organization(&self, id: i64) -> MetadataResult<Option<OrganizationRow>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT * FROM organizations WHERE id = $1 AND NOT removed",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_organization_uri(&self, id: i64, odk_uri: &str) -> MetadataResult<()> {
        let result = sqlx::query(
            "UPDATE organizations SET odk_uri = $1, updated_at = $2 WHERE id = $3 AND odk_uri IS NULL",
        )
        .bind(odk_uri)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| MetadataError::from_insert(e, format!("odk_uri {odk_uri}")))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<Option<String>> =
            sqlx::query_scalar("SELECT odk_uri FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match current {
            None => Err(MetadataError::NotFound(format!("organization {id}"))),
            Some(Some(existing)) if existing == odk_uri => Ok(()),
            Some(_) => Err(MetadataError::Constraint(format!(
                "organization {id} already has an ODK URI"
            ))),
        }
    }

    async fn soft_delete_organization(&self, id: i64) -> MetadataResult<()> {
        let result =
            sqlx::query("UPDATE organizations SET removed = TRUE, updated_at = $1 WHERE id = $2")
                .bind(OffsetDateTime::now_utc())
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("organization {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionRepo for PostgresStore {
    async fn create_connection(&self, conn: &NewDbConnection) -> MetadataResult<DbConnectionRow> {
        let row = sqlx::query_as::<_, DbConnectionRow>(
            r#"
            INSERT INTO db_connections (name, host, port, database, username, password, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&conn.name)
        .bind(&conn.host)
        .bind(conn.port)
        .bind(&conn.database)
        .bind(&conn.username)
        .bind(&conn.password)
        .bind(conn.active)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_active_connection(&self, name: &str) -> MetadataResult<Option<DbConnectionRow>> {
        let row = sqlx::query_as::<_, DbConnectionRow>(
            "SELECT * FROM db_connections WHERE name = $1 AND active ORDER BY id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl AttachmentRepo for PostgresStore {
    async fn create_attachment(
        &self,
        kind: AttachmentKind,
        attachment: &NewAttachment,
    ) -> MetadataResult<AttachmentRow> {
        let table = kind.local_table();
        let sql = format!(
            r#"
            INSERT INTO {table} (organization_id, file_name, uploaded_by, observation, position, created_at)
            SELECT $1, $2, $3, $4, COALESCE(MAX(position), 0) + 1, $5
            FROM {table} WHERE organization_id = $1
            RETURNING *
            "#
        );
        sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(attachment.organization_id)
            .bind(&attachment.file_name)
            .bind(&attachment.uploaded_by)
            .bind(&attachment.observation)
            .bind(attachment.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                MetadataError::from_insert(
                    e,
                    format!("{kind} {} for organization {}", attachment.file_name, attachment.organization_id),
                )
            })
    }

    async fn list_attachments(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
    ) -> MetadataResult<Vec<AttachmentRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE organization_id = $1 ORDER BY position, id",
            kind.local_table()
        );
        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_attachment_by_file_name(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
        file_name: &str,
    ) -> MetadataResult<Option<AttachmentRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE organization_id = $1 AND file_name = $2",
            kind.local_table()
        );
        let row = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(organization_id)
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
