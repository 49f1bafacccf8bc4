//! Configuration types shared across crates.

use crate::attachment::{AttachmentKind, validate_identifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Local metadata database configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (development and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database (production).
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// Prefer PINOVARA_METADATA__PASSWORD over storing it in the file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default)]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/pinovara.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Upload directories, one per attachment kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_documents_dir")]
    pub documents: PathBuf,
    #[serde(default = "default_photos_dir")]
    pub photos: PathBuf,
    #[serde(default = "default_signatures_dir")]
    pub signatures: PathBuf,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./uploads/arquivos")
}

fn default_photos_dir() -> PathBuf {
    PathBuf::from("./uploads/fotos")
}

fn default_signatures_dir() -> PathBuf {
    PathBuf::from("./uploads/assinaturas")
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            documents: default_documents_dir(),
            photos: default_photos_dir(),
            signatures: default_signatures_dir(),
        }
    }
}

impl UploadConfig {
    /// Lay out the three directories under a common root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            documents: root.join("arquivos"),
            photos: root.join("fotos"),
            signatures: root.join("assinaturas"),
        }
    }

    /// Directory for a given kind.
    pub fn dir(&self, kind: AttachmentKind) -> &Path {
        match kind {
            AttachmentKind::Document => &self.documents,
            AttachmentKind::Photo => &self.photos,
            AttachmentKind::Signature => &self.signatures,
        }
    }
}

/// Legacy ODK database access.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OdkConfig {
    /// Name of the `db_connections` row describing the ODK database.
    #[serde(default = "default_connection_name")]
    pub connection_name: String,
    /// Remote schema holding the ODK tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table-name prefixes tried in order. The legacy database used
    /// `ORGANIZACAO_*` for early forms and `PINOVARA_*` later; the first
    /// prefix that returns rows wins.
    #[serde(default = "default_table_prefixes")]
    pub table_prefixes: Vec<String>,
    /// Timeout for establishing the remote connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Remote statement timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
    /// Compare SHA-256 of existing files against remote blobs (default: false).
    /// Mismatches are reported, never overwritten.
    #[serde(default)]
    pub detect_content_mismatch: bool,
}

fn default_connection_name() -> String {
    "odk_prod".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table_prefixes() -> Vec<String> {
    vec!["ORGANIZACAO".to_string(), "PINOVARA".to_string()]
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for OdkConfig {
    fn default() -> Self {
        Self {
            connection_name: default_connection_name(),
            schema: default_schema(),
            table_prefixes: default_table_prefixes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_ms: None,
            detect_content_mismatch: false,
        }
    }
}

impl OdkConfig {
    /// Validate identifiers that end up in remote SQL text.
    pub fn validate(&self) -> Result<(), String> {
        if self.connection_name.trim().is_empty() {
            return Err("odk.connection_name cannot be empty".to_string());
        }
        validate_identifier(&self.schema).map_err(|e| format!("odk.schema: {e}"))?;
        if self.table_prefixes.is_empty() {
            return Err("odk.table_prefixes must list at least one prefix".to_string());
        }
        for prefix in &self.table_prefixes {
            validate_identifier(prefix).map_err(|e| format!("odk.table_prefixes: {e}"))?;
        }
        if self.connect_timeout_secs == 0 {
            return Err("odk.connect_timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }

    /// Connect timeout as a std Duration.
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub odk: OdkConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.odk.validate()?;
        Ok(())
    }

    /// Create a test configuration rooted at a scratch directory.
    ///
    /// **For testing only.** Uses SQLite metadata and upload directories
    /// beneath `root`.
    pub fn for_testing(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::Sqlite {
                path: root.join("pinovara.db"),
            },
            uploads: UploadConfig::under(root.join("uploads")),
            odk: OdkConfig::default(),
        }
    }
}
