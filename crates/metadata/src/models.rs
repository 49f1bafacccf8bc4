//! Database models mapping to the local schema.

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Organization record. Only the fields the sync needs are mapped; the
/// diagnostic questionnaire columns live in the same table upstream.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrganizationRow {
    pub id: i64,
    pub name: String,
    /// URI assigned by ODK; immutable once set.
    pub odk_uri: Option<String>,
    pub removed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Named external database connection.
#[derive(Clone, FromRow)]
pub struct DbConnectionRow {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub database: String,
    pub username: String,
    pub password: String,
    pub active: bool,
    pub created_at: OffsetDateTime,
}

impl std::fmt::Debug for DbConnectionRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnectionRow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("active", &self.active)
            .finish()
    }
}

/// Input for creating a connection row.
#[derive(Debug, Clone)]
pub struct NewDbConnection {
    pub name: String,
    pub host: String,
    pub port: i32,
    pub database: String,
    pub username: String,
    pub password: String,
    pub active: bool,
}

/// Local attachment record (document, photo or signature).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttachmentRow {
    pub id: i64,
    pub organization_id: i64,
    pub file_name: String,
    pub uploaded_by: String,
    pub observation: Option<String>,
    /// Display order within the organization, starting at 1.
    pub position: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for creating an attachment record.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub organization_id: i64,
    pub file_name: String,
    pub uploaded_by: String,
    pub observation: Option<String>,
    pub created_at: OffsetDateTime,
}
