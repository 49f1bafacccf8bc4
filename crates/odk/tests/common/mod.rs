//! Common test utilities for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use pinovara_core::AttachmentKind;
use pinovara_core::config::{OdkConfig, UploadConfig};
use pinovara_metadata::models::NewDbConnection;
use pinovara_metadata::{MetadataStore, SqliteStore};
use pinovara_odk::{
    OdkSync, RemoteAttachment, RemoteConnection, RemoteSession, RemoteSource, SyncError,
    SyncResult,
};
use pinovara_storage::{
    AttachmentStores, FilesystemBackend, ObjectMeta, ObjectStore, StorageError, StorageResult,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use time::OffsetDateTime;

/// Scripted answer for one (kind, prefix) query.
#[derive(Clone)]
pub enum Answer {
    Rows(Vec<RemoteAttachment>),
    Fail(String),
    /// The connection drops while the query runs.
    Disconnect(String),
}

/// In-memory `RemoteSource` recording every call.
#[derive(Default)]
pub struct MockRemote {
    answers: Mutex<HashMap<(AttachmentKind, String), Answer>>,
    refuse_connections: Mutex<bool>,
    opens: AtomicUsize,
    queries: Arc<Mutex<Vec<(AttachmentKind, String, String)>>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, kind: AttachmentKind, prefix: &str, answer: Answer) {
        self.answers
            .lock()
            .unwrap()
            .insert((kind, prefix.to_string()), answer);
    }

    pub fn refuse_connections(&self) {
        *self.refuse_connections.lock().unwrap() = true;
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Queries issued so far as (kind, prefix, organization URI).
    pub fn queries(&self) -> Vec<(AttachmentKind, String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn open(&self, _conn: &RemoteConnection) -> SyncResult<Box<dyn RemoteSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if *self.refuse_connections.lock().unwrap() {
            return Err(SyncError::RemoteConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        Ok(Box::new(MockSession {
            answers: self.answers.lock().unwrap().clone(),
            queries: self.queries.clone(),
        }))
    }
}

struct MockSession {
    answers: HashMap<(AttachmentKind, String), Answer>,
    queries: Arc<Mutex<Vec<(AttachmentKind, String, String)>>>,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn fetch_attachments(
        &mut self,
        kind: AttachmentKind,
        prefix: &str,
        organization_uri: &str,
    ) -> SyncResult<Vec<RemoteAttachment>> {
        self.queries.lock().unwrap().push((
            kind,
            prefix.to_string(),
            organization_uri.to_string(),
        ));
        match self.answers.get(&(kind, prefix.to_string())) {
            Some(Answer::Rows(rows)) => Ok(rows.clone()),
            Some(Answer::Fail(message)) => Err(SyncError::RemoteQueryFailed {
                prefix: prefix.to_string(),
                message: message.clone(),
            }),
            Some(Answer::Disconnect(message)) => {
                Err(SyncError::RemoteConnectionFailed(message.clone()))
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Filesystem store that fails writes for selected keys.
pub struct FailingStore {
    inner: FilesystemBackend,
    fail_puts: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            inner: FilesystemBackend::new(root).await?,
            fail_puts: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_put(&self, key: &str) {
        self.fail_puts.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        if self.fail_puts.lock().unwrap().contains(key) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.put_if_not_exists(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Build a remote attachment carrying a file path.
pub fn attachment(uri: &str, remote_path: &str, payload: &[u8]) -> RemoteAttachment {
    RemoteAttachment {
        uri: uri.to_string(),
        created_at: OffsetDateTime::now_utc(),
        payload: Bytes::copy_from_slice(payload),
        size: payload.len() as u64,
        remote_path: Some(remote_path.to_string()),
        content_type: Some("image/jpeg".to_string()),
    }
}

/// A sync service over SQLite metadata, temp upload dirs and a mock remote.
pub struct TestSync {
    pub sync: OdkSync,
    pub metadata: Arc<dyn MetadataStore>,
    pub sqlite: Arc<SqliteStore>,
    pub remote: Arc<MockRemote>,
    pub photos: Arc<FailingStore>,
    pub uploads: UploadConfig,
    _temp_dir: TempDir,
}

impl TestSync {
    /// Default ODK config with a registered `odk_prod` connection.
    pub async fn new() -> Self {
        Self::with_config(OdkConfig::default(), true).await
    }

    pub async fn with_config(config: OdkConfig, register_connection: bool) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let uploads = UploadConfig::under(temp_dir.path().join("uploads"));

        let sqlite = Arc::new(
            SqliteStore::new(temp_dir.path().join("pinovara.db"))
                .await
                .expect("Failed to create metadata store"),
        );
        let metadata: Arc<dyn MetadataStore> = sqlite.clone();
        if register_connection {
            metadata
                .create_connection(&NewDbConnection {
                    name: config.connection_name.clone(),
                    host: "odk.example.org".to_string(),
                    port: 5432,
                    database: "odk_prod".to_string(),
                    username: "odk".to_string(),
                    password: "secret".to_string(),
                    active: true,
                })
                .await
                .expect("Failed to create connection");
        }

        let photos = Arc::new(
            FailingStore::new(&uploads.photos)
                .await
                .expect("Failed to create photo store"),
        );
        let stores = AttachmentStores::new(
            pinovara_storage::from_path(&uploads.documents)
                .await
                .expect("Failed to create document store"),
            photos.clone(),
            pinovara_storage::from_path(&uploads.signatures)
                .await
                .expect("Failed to create signature store"),
        );

        let remote = MockRemote::new();
        let sync = OdkSync::new(metadata.clone(), remote.clone(), stores, config);

        Self {
            sync,
            metadata,
            sqlite,
            remote,
            photos,
            uploads,
            _temp_dir: temp_dir,
        }
    }

    /// Create an organization and return its ID.
    pub async fn organization(&self, odk_uri: Option<&str>) -> i64 {
        self.metadata
            .create_organization("Cooperativa Teste", odk_uri)
            .await
            .expect("Failed to create organization")
            .id
    }

    pub fn photo_path(&self, name: &str) -> PathBuf {
        self.uploads.photos.join(name)
    }

    /// Make inserts of the given photo record fail with a non-unique error.
    pub async fn reject_photo_record(&self, file_name: &str) {
        let sql = format!(
            "CREATE TRIGGER reject_photo BEFORE INSERT ON organization_photos \
             WHEN NEW.file_name = '{file_name}' \
             BEGIN SELECT RAISE(ABORT, 'photo record rejected'); END"
        );
        sqlx::query(&sql)
            .execute(self.sqlite.pool())
            .await
            .expect("Failed to create trigger");
    }
}
