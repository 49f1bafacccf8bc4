//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{AttachmentRepo, ConnectionRepo, OrganizationRepo};
use async_trait::async_trait;
use pinovara_core::AttachmentKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// SQLite schema (embedded).
const SQLITE_SCHEMA: &str = include_str!("sqlite_schema.sql");

/// Split an embedded schema into executable statements, skipping
/// comment-only fragments.
pub(crate) fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: OrganizationRepo + ConnectionRepo + AttachmentRepo + Send + Sync {
    /// Create tables and indexes if missing.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite database. `":memory:"` is accepted.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        let base = if path == Path::new(":memory:") {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };
        let opts = base
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection keeps in-memory databases alive and avoids
            // "database is locked" under concurrent requests.
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        for statement in schema_statements(SQLITE_SCHEMA) {
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
impl OrganizationRepo for SqliteStore {
    async fn create_organization(
        &self,
        name: &str,
        odk_uri: Option<&str>,
    ) -> MetadataResult<OrganizationRow> {
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, OrganizationRow>(
            r#"
            INSERT INTO organizations (name, odk_uri, removed, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            RETURNING id, name, odk_uri, removed, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(odk_uri)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, format!("odk_uri {}", odk_uri.unwrap_or_default()))
        })
    }

    async fn get_organization(&self, id: i64) -> MetadataResult<Option<OrganizationRow>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT * FROM organizations WHERE id = ? AND removed = 0",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_organization_uri(&self, id: i64, odk_uri: &str) -> MetadataResult<()> {
        let result = sqlx::query(
            "UPDATE organizations SET odk_uri = ?, updated_at = ? WHERE id = ? AND odk_uri IS NULL",
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
            sqlx::query_scalar("SELECT odk_uri FROM organizations WHERE id = ?")
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
            sqlx::query("UPDATE organizations SET removed = 1, updated_at = ? WHERE id = ?")
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
impl ConnectionRepo for SqliteStore {
    async fn create_connection(&self, conn: &NewDbConnection) -> MetadataResult<DbConnectionRow> {
        let row = sqlx::query_as::<_, DbConnectionRow>(
            r#"
            INSERT INTO db_connections (name, host, port, database, username, password, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
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
            "SELECT * FROM db_connections WHERE name = ? AND active = 1 ORDER BY id DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl AttachmentRepo for SqliteStore {
    async fn create_attachment(
        &self,
        kind: AttachmentKind,
        attachment: &NewAttachment,
    ) -> MetadataResult<AttachmentRow> {
        let table = kind.local_table();
        let sql = format!(
            r#"
            INSERT INTO {table} (organization_id, file_name, uploaded_by, observation, position, created_at)
            SELECT ?1, ?2, ?3, ?4, COALESCE(MAX(position), 0) + 1, ?5
            FROM {table} WHERE organization_id = ?1
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
            "SELECT * FROM {} WHERE organization_id = ? ORDER BY position, id",
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
            "SELECT * FROM {} WHERE organization_id = ? AND file_name = ?",
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
