//! Read-only access to the ODK attachment tables.

use crate::connection::RemoteConnection;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use bytes::Bytes;
use pinovara_core::AttachmentKind;
use pinovara_core::attachment::validate_identifier;
use pinovara_core::config::OdkConfig;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, FromRow};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument};

/// One remote blob with the fields needed to materialize it locally.
#[derive(Clone, Debug)]
pub struct RemoteAttachment {
    /// Remote unique identifier of the binary node.
    pub uri: String,
    pub created_at: OffsetDateTime,
    pub payload: Bytes,
    /// Byte length as reported by the remote side.
    pub size: u64,
    /// `UNROOTED_FILE_PATH`, when the form recorded one.
    pub remote_path: Option<String>,
    pub content_type: Option<String>,
}

/// Source of remote attachments.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Open a session. Failures here are `RemoteConnectionFailed`.
    async fn open(&self, conn: &RemoteConnection) -> SyncResult<Box<dyn RemoteSession>>;
}

/// An open connection to the ODK database.
#[async_trait]
pub trait RemoteSession: Send {
    /// Fetch every non-empty blob of `kind` owned by `organization_uri`
    /// from the tables named with `prefix`.
    ///
    /// Query failures are `RemoteQueryFailed` and leave the session usable.
    /// A dropped connection is `RemoteConnectionFailed`, which is fatal.
    async fn fetch_attachments(
        &mut self,
        kind: AttachmentKind,
        prefix: &str,
        organization_uri: &str,
    ) -> SyncResult<Vec<RemoteAttachment>>;
}

/// Build the attachment query for one kind and prefix.
///
/// Identifiers are validated and quoted; the organization URI is bound as `$1`.
pub fn attachment_query(schema: &str, kind: AttachmentKind, prefix: &str) -> SyncResult<String> {
    validate_identifier(schema).map_err(|e| SyncError::Config(e.to_string()))?;
    validate_identifier(prefix).map_err(|e| SyncError::Config(e.to_string()))?;

    let layout = kind.remote_layout();
    let [owner, node, value] = layout.tables(prefix);
    let owner_key = layout.owner_key;
    Ok(format!(
        r#"SELECT bn."_URI" AS uri,
       CAST(bn."_CREATION_DATE" AS timestamptz) AS created_at,
       blb."VALUE" AS payload,
       CAST(octet_length(blb."VALUE") AS BIGINT) AS size,
       bn."UNROOTED_FILE_PATH" AS remote_path,
       bn."CONTENT_TYPE" AS content_type
FROM "{schema}"."{owner}" o
JOIN "{schema}"."{node}" bn ON bn."_PARENT_AURI" = o."_URI"
JOIN "{schema}"."{value}" blb ON blb."_PARENT_AURI" = bn."_URI"
WHERE o."{owner_key}" = $1
  AND blb."VALUE" IS NOT NULL
  AND octet_length(blb."VALUE") > 0
ORDER BY bn."_CREATION_DATE", bn."_URI""#
    ))
}

#[derive(FromRow)]
struct AttachmentRecord {
    uri: String,
    created_at: OffsetDateTime,
    payload: Vec<u8>,
    size: i64,
    remote_path: Option<String>,
    content_type: Option<String>,
}

impl From<AttachmentRecord> for RemoteAttachment {
    fn from(row: AttachmentRecord) -> Self {
        Self {
            uri: row.uri,
            created_at: row.created_at,
            payload: Bytes::from(row.payload),
            size: u64::try_from(row.size).unwrap_or_default(),
            remote_path: row.remote_path,
            content_type: row.content_type,
        }
    }
}

/// PostgreSQL-backed remote source.
pub struct PgRemoteSource {
    schema: String,
    connect_timeout: Duration,
    statement_timeout_ms: Option<u64>,
}

impl PgRemoteSource {
    pub fn new(config: &OdkConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            connect_timeout: config.connect_timeout(),
            statement_timeout_ms: config.statement_timeout_ms,
        }
    }
}

#[async_trait]
impl RemoteSource for PgRemoteSource {
    #[instrument(skip(self, conn), fields(host = %conn.host, database = %conn.database))]
    async fn open(&self, conn: &RemoteConnection) -> SyncResult<Box<dyn RemoteSession>> {
        let mut options = vec![(
            "default_transaction_read_only".to_string(),
            "on".to_string(),
        )];
        if let Some(timeout_ms) = self.statement_timeout_ms {
            options.push(("statement_timeout".to_string(), format!("{timeout_ms}ms")));
        }
        let opts = conn.connect_options().options(options);

        let connection = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&opts))
            .await
            .map_err(|_| {
                SyncError::RemoteConnectionFailed(format!(
                    "timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| SyncError::RemoteConnectionFailed(e.to_string()))?;

        debug!("Connected to ODK database");
        Ok(Box::new(PgRemoteSession {
            connection,
            schema: self.schema.clone(),
        }))
    }
}

struct PgRemoteSession {
    connection: PgConnection,
    schema: String,
}

#[async_trait]
impl RemoteSession for PgRemoteSession {
    async fn fetch_attachments(
        &mut self,
        kind: AttachmentKind,
        prefix: &str,
        organization_uri: &str,
    ) -> SyncResult<Vec<RemoteAttachment>> {
        let sql = attachment_query(&self.schema, kind, prefix)?;
        let rows = sqlx::query_as::<_, AttachmentRecord>(&sql)
            .bind(organization_uri)
            .fetch_all(&mut self.connection)
            .await
            .map_err(|e| query_error(prefix, e))?;

        Ok(rows.into_iter().map(RemoteAttachment::from).collect())
    }
}

/// Classify a failed attachment query.
///
/// Errors raised for the statement itself (missing table, bad column,
/// statement timeout) leave the connection usable and let the next prefix
/// run. Anything that means the connection is gone is fatal.
fn query_error(prefix: &str, err: sqlx::Error) -> SyncError {
    let statement_error = match &err {
        sqlx::Error::Database(db) => !db.code().is_some_and(|code| is_connection_lost(&code)),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => true,
        _ => false,
    };

    if statement_error {
        SyncError::RemoteQueryFailed {
            prefix: prefix.to_string(),
            message: err.to_string(),
        }
    } else {
        SyncError::RemoteConnectionFailed(err.to_string())
    }
}

/// SQLSTATE codes sent when the server drops the session: class 08
/// (connection exception) and the 57P0x shutdown family.
fn is_connection_lost(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}
