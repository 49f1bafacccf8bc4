//! Scripted ODK remote for server tests.

use async_trait::async_trait;
use bytes::Bytes;
use pinovara_core::AttachmentKind;
use pinovara_odk::{RemoteAttachment, RemoteConnection, RemoteSession, RemoteSource, SyncResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// Remote that serves fixed rows per kind under the primary prefix.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedRemote {
    rows: Mutex<HashMap<AttachmentKind, Vec<RemoteAttachment>>>,
    opens: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, kind: AttachmentKind, rows: Vec<RemoteAttachment>) {
        self.rows.lock().unwrap().insert(kind, rows);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for ScriptedRemote {
    async fn open(&self, _conn: &RemoteConnection) -> SyncResult<Box<dyn RemoteSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            rows: self.rows.lock().unwrap().clone(),
        }))
    }
}

struct ScriptedSession {
    rows: HashMap<AttachmentKind, Vec<RemoteAttachment>>,
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn fetch_attachments(
        &mut self,
        kind: AttachmentKind,
        prefix: &str,
        _organization_uri: &str,
    ) -> SyncResult<Vec<RemoteAttachment>> {
        if prefix != "ORGANIZACAO" {
            return Ok(Vec::new());
        }
        Ok(self.rows.get(&kind).cloned().unwrap_or_default())
    }
}

/// Build a remote attachment with a file path.
#[allow(dead_code)]
pub fn remote_file(uri: &str, name: &str, payload: &'static [u8]) -> RemoteAttachment {
    RemoteAttachment {
        uri: uri.to_string(),
        created_at: OffsetDateTime::now_utc(),
        payload: Bytes::from_static(payload),
        size: payload.len() as u64,
        remote_path: Some(name.to_string()),
        content_type: None,
    }
}
