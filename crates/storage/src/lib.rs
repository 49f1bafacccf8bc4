//! Upload-directory storage for synchronized attachments.
//!
//! This crate provides:
//! - A flat object-store abstraction keyed by file name
//! - A local filesystem backend with atomic writes
//! - One store per attachment kind, built from configuration

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{ObjectMeta, ObjectStore};

use pinovara_core::AttachmentKind;
use pinovara_core::config::UploadConfig;
use std::path::Path;
use std::sync::Arc;

/// Create an object store rooted at an upload directory.
pub async fn from_path(path: impl AsRef<Path>) -> StorageResult<Arc<dyn ObjectStore>> {
    let backend = FilesystemBackend::new(path).await?;
    Ok(Arc::new(backend))
}

/// One object store per attachment kind.
#[derive(Clone)]
pub struct AttachmentStores {
    documents: Arc<dyn ObjectStore>,
    photos: Arc<dyn ObjectStore>,
    signatures: Arc<dyn ObjectStore>,
}

impl AttachmentStores {
    /// Assemble from explicit stores (tests substitute doubles here).
    pub fn new(
        documents: Arc<dyn ObjectStore>,
        photos: Arc<dyn ObjectStore>,
        signatures: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            documents,
            photos,
            signatures,
        }
    }

    /// Create filesystem stores for every configured upload directory.
    pub async fn from_config(config: &UploadConfig) -> StorageResult<Self> {
        let dirs: Vec<&Path> = AttachmentKind::ALL
            .iter()
            .map(|kind| config.dir(*kind))
            .collect();
        for (i, dir) in dirs.iter().enumerate() {
            if dirs[i + 1..].contains(dir) {
                return Err(StorageError::Config(format!(
                    "upload directories must be distinct, {} is shared",
                    dir.display()
                )));
            }
        }

        Ok(Self {
            documents: from_path(&config.documents).await?,
            photos: from_path(&config.photos).await?,
            signatures: from_path(&config.signatures).await?,
        })
    }

    /// Store for a given kind.
    pub fn get(&self, kind: AttachmentKind) -> &Arc<dyn ObjectStore> {
        match kind {
            AttachmentKind::Document => &self.documents,
            AttachmentKind::Photo => &self.photos,
            AttachmentKind::Signature => &self.signatures,
        }
    }

    /// Check every store.
    pub async fn health_check(&self) -> StorageResult<()> {
        for kind in AttachmentKind::ALL {
            self.get(kind).health_check().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn from_config_creates_each_directory() {
        let temp = tempdir().unwrap();
        let config = UploadConfig::under(temp.path());

        let stores = AttachmentStores::from_config(&config).await.unwrap();
        stores
            .get(AttachmentKind::Photo)
            .put("hello.jpg", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        assert!(config.photos.join("hello.jpg").exists());
        assert!(config.documents.is_dir());
        assert!(config.signatures.is_dir());
        assert!(
            !stores
                .get(AttachmentKind::Document)
                .exists("hello.jpg")
                .await
                .unwrap()
        );
        stores.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn from_config_rejects_shared_directory() {
        let temp = tempdir().unwrap();
        let mut config = UploadConfig::under(temp.path());
        config.signatures = config.photos.clone();

        match AttachmentStores::from_config(&config).await {
            Err(StorageError::Config(msg)) => assert!(msg.contains("distinct")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected error"),
        }
    }
}
