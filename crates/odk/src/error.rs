//! Sync error types.

use pinovara_metadata::MetadataError;
use pinovara_storage::StorageError;
use thiserror::Error;

/// Errors raised while synchronizing attachments from ODK.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No active `db_connections` row with the configured name.
    #[error("connection configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("organization not found: {0}")]
    OrganizationNotFound(i64),

    #[error("remote connection failed: {0}")]
    RemoteConnectionFailed(String),

    /// A single prefix query failed; the next prefix is tried.
    #[error("remote query failed for prefix {prefix}: {message}")]
    RemoteQueryFailed { prefix: String, message: String },

    /// Every configured prefix failed with a query error.
    #[error("remote query failed for every prefix: {0}")]
    AllPrefixesFailed(String),

    #[error("failed to write {file_name}: {source}")]
    WriteFailed {
        file_name: String,
        #[source]
        source: StorageError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether the error aborts the whole sync for the organization.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::RemoteQueryFailed { .. } | Self::WriteFailed { .. }
        )
    }

    /// Message shown to PINOVARA users in reports.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfigurationNotFound(name) => {
                format!("Configuração de conexão ODK '{name}' não encontrada")
            }
            Self::OrganizationNotFound(id) => format!("Organização {id} não encontrada"),
            Self::RemoteConnectionFailed(msg) => {
                format!("Falha ao conectar ao banco do ODK: {msg}")
            }
            Self::RemoteQueryFailed { prefix, message } => {
                format!("Falha na consulta ao ODK (prefixo {prefix}): {message}")
            }
            Self::AllPrefixesFailed(msg) => {
                format!("Nenhuma consulta ao ODK foi bem-sucedida: {msg}")
            }
            Self::WriteFailed { source, .. } => format!("Falha ao gravar arquivo: {source}"),
            Self::Config(msg) => format!("Configuração inválida: {msg}"),
            Self::Metadata(err) => format!("Erro no banco local: {err}"),
            Self::Storage(err) => format!("Erro de armazenamento: {err}"),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_and_per_prefix_errors_are_not_fatal() {
        let query = SyncError::RemoteQueryFailed {
            prefix: "ORGANIZACAO".to_string(),
            message: "relation does not exist".to_string(),
        };
        let write = SyncError::WriteFailed {
            file_name: "a.jpg".to_string(),
            source: StorageError::InvalidKey("a.jpg".to_string()),
        };
        assert!(!query.is_fatal());
        assert!(!write.is_fatal());
        assert!(SyncError::OrganizationNotFound(1).is_fatal());
        assert!(SyncError::ConfigurationNotFound("odk_prod".to_string()).is_fatal());
        assert!(SyncError::RemoteConnectionFailed("refused".to_string()).is_fatal());
    }

    #[test]
    fn user_message_names_missing_organization() {
        let msg = SyncError::OrganizationNotFound(42).user_message();
        assert!(msg.contains("42"));
        assert!(msg.contains("não encontrada"));
    }
}
