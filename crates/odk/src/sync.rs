//! Attachment sync orchestration.

use crate::connection::resolve_connection;
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteAttachment, RemoteSession, RemoteSource};
use pinovara_core::config::OdkConfig;
use pinovara_core::file_name::derive_file_name;
use pinovara_core::{AttachmentKind, ContentHash, ItemStatus, SyncItem, SyncReport};
use pinovara_metadata::models::{AttachmentRow, NewAttachment, OrganizationRow};
use pinovara_metadata::{MetadataError, MetadataStore};
use pinovara_storage::{AttachmentStores, ObjectStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

/// Observation stored on records created by a sync.
pub const SYNC_OBSERVATION: &str = "Sincronizado do ODK";

/// Pulls ODK attachments into the local upload directories and records them.
#[derive(Clone)]
pub struct OdkSync {
    metadata: Arc<dyn MetadataStore>,
    remote: Arc<dyn RemoteSource>,
    stores: AttachmentStores,
    config: OdkConfig,
}

impl OdkSync {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        remote: Arc<dyn RemoteSource>,
        stores: AttachmentStores,
        config: OdkConfig,
    ) -> Self {
        Self {
            metadata,
            remote,
            stores,
            config,
        }
    }

    /// Synchronize one attachment kind for an organization.
    ///
    /// Always returns a report. Fatal errors yield `success: false`.
    #[instrument(skip(self, user_email), fields(kind = %kind))]
    pub async fn sync_organization(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
        user_email: &str,
    ) -> SyncReport {
        match self.run(kind, organization_id, user_email).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "ODK sync aborted");
                let mut report = SyncReport::failure(kind, err.user_message());
                if matches!(err, SyncError::OrganizationNotFound(_)) {
                    report.erros = 1;
                }
                report
            }
        }
    }

    /// Synchronize documents, photos and signatures in that order.
    ///
    /// A fatal error in one kind does not stop the others.
    pub async fn sync_all_kinds(&self, organization_id: i64, user_email: &str) -> Vec<SyncReport> {
        self.sync_all_kinds_observed(organization_id, user_email, |_, _| {})
            .await
    }

    /// Like [`sync_all_kinds`](Self::sync_all_kinds), calling `observe` with
    /// each report and the time its kind took.
    #[instrument(skip(self, user_email, observe))]
    pub async fn sync_all_kinds_observed<F>(
        &self,
        organization_id: i64,
        user_email: &str,
        mut observe: F,
    ) -> Vec<SyncReport>
    where
        F: FnMut(&SyncReport, Duration) + Send,
    {
        let mut reports = Vec::with_capacity(AttachmentKind::ALL.len());
        for kind in AttachmentKind::ALL {
            let started = Instant::now();
            let report = self.sync_organization(kind, organization_id, user_email).await;
            observe(&report, started.elapsed());
            reports.push(report);
        }
        reports
    }

    /// List local records of `kind` whose file is missing from the upload directory.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn audit_attachments(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
    ) -> SyncResult<Vec<AttachmentRow>> {
        self.require_organization(organization_id).await?;

        let store = self.stores.get(kind);
        let mut missing = Vec::new();
        for record in self.metadata.list_attachments(kind, organization_id).await? {
            if !store.exists(&record.file_name).await? {
                missing.push(record);
            }
        }

        if !missing.is_empty() {
            warn!(missing = missing.len(), "Attachment records without files");
        }
        Ok(missing)
    }

    async fn require_organization(&self, organization_id: i64) -> SyncResult<OrganizationRow> {
        self.metadata
            .get_organization(organization_id)
            .await?
            .ok_or(SyncError::OrganizationNotFound(organization_id))
    }

    async fn run(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
        user_email: &str,
    ) -> SyncResult<SyncReport> {
        let organization = self.require_organization(organization_id).await?;
        let mut report = SyncReport::new(kind);

        let Some(uri) = organization
            .odk_uri
            .filter(|uri| !uri.trim().is_empty())
        else {
            info!("Organization has no ODK URI, nothing to sync");
            report.mensagem = "Organização sem URI do ODK; nada a sincronizar".to_string();
            return Ok(report);
        };

        let conn = resolve_connection(self.metadata.as_ref(), &self.config.connection_name).await?;
        let mut session = self.remote.open(&conn).await?;
        let attachments = self.fetch_with_fallback(session.as_mut(), kind, &uri).await?;
        drop(session);

        report.total_odk = u32::try_from(attachments.len()).unwrap_or(u32::MAX);
        for attachment in attachments {
            self.sync_item(kind, organization_id, user_email, attachment, &mut report)
                .await;
        }

        report.summarize();
        info!(
            total = report.total_odk,
            existing = report.ja_existentes,
            downloaded = report.baixadas,
            errors = report.erros,
            "ODK sync finished"
        );
        Ok(report)
    }

    /// Try each configured prefix in order; the first one with rows wins.
    async fn fetch_with_fallback(
        &self,
        session: &mut dyn RemoteSession,
        kind: AttachmentKind,
        uri: &str,
    ) -> SyncResult<Vec<RemoteAttachment>> {
        let mut failures = Vec::new();
        let mut answered = false;

        for prefix in &self.config.table_prefixes {
            match session.fetch_attachments(kind, prefix, uri).await {
                Ok(rows) if !rows.is_empty() => {
                    info!(prefix = %prefix, count = rows.len(), "Using ODK table prefix");
                    return Ok(rows);
                }
                Ok(_) => {
                    debug!(prefix = %prefix, "No attachments under prefix");
                    answered = true;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(prefix = %prefix, error = %err, "ODK prefix query failed, trying next");
                    failures.push(err.to_string());
                }
            }
        }

        if !answered && !failures.is_empty() {
            return Err(SyncError::AllPrefixesFailed(failures.join("; ")));
        }
        Ok(Vec::new())
    }

    async fn sync_item(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
        user_email: &str,
        attachment: RemoteAttachment,
        report: &mut SyncReport,
    ) {
        let file_name = derive_file_name(
            kind,
            organization_id,
            &attachment.uri,
            attachment.remote_path.as_deref(),
            attachment.content_type.as_deref(),
            attachment.created_at,
        );
        if attachment.size != attachment.payload.len() as u64 {
            warn!(
                uri = %attachment.uri,
                reported = attachment.size,
                received = attachment.payload.len(),
                "ODK blob size differs from payload length"
            );
        }
        let store = self.stores.get(kind);
        let item = |status, mensagem: String| SyncItem {
            uri: attachment.uri.clone(),
            status,
            nome_arquivo: file_name.clone(),
            mensagem,
        };

        let exists = match store.exists(&file_name).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(file_name = %file_name, error = %err, "Existence check failed");
                report.push(item(ItemStatus::Erro, format!("Falha ao verificar arquivo: {err}")));
                return;
            }
        };
        if exists {
            let divergent = self
                .content_differs(store.as_ref(), &file_name, &attachment)
                .await;
            if divergent {
                report.divergentes += 1;
                report.push(item(
                    ItemStatus::Existente,
                    "Arquivo já existe localmente com conteúdo divergente".to_string(),
                ));
            } else {
                report.push(item(
                    ItemStatus::Existente,
                    "Arquivo já existe localmente".to_string(),
                ));
            }
            return;
        }

        let written = match store
            .put_if_not_exists(&file_name, attachment.payload.clone())
            .await
        {
            Ok(written) => written,
            Err(source) => {
                let err = SyncError::WriteFailed {
                    file_name: file_name.clone(),
                    source,
                };
                warn!(file_name = %file_name, error = %err, "Attachment write failed");
                report.push(item(ItemStatus::Erro, err.user_message()));
                return;
            }
        };
        if !written {
            // Another sync wrote it between the check and the put.
            report.push(item(
                ItemStatus::Existente,
                "Arquivo já existe localmente".to_string(),
            ));
            return;
        }

        let record = NewAttachment {
            organization_id,
            file_name: file_name.clone(),
            uploaded_by: user_email.to_string(),
            observation: Some(SYNC_OBSERVATION.to_string()),
            created_at: OffsetDateTime::now_utc(),
        };
        match self.metadata.create_attachment(kind, &record).await {
            Ok(_) => {
                debug!(file_name = %file_name, size = attachment.payload.len(), "Attachment downloaded");
                report.push(item(
                    ItemStatus::Baixada,
                    format!("Baixado com sucesso ({} bytes)", attachment.payload.len()),
                ));
            }
            Err(MetadataError::AlreadyExists(_)) => {
                // The record outlived its file; the write restored it.
                info!(file_name = %file_name, "Restored file for existing record");
                report.push(item(
                    ItemStatus::Baixada,
                    "Baixado com sucesso (registro já existente)".to_string(),
                ));
            }
            Err(err) => {
                warn!(file_name = %file_name, error = %err, "Record insert failed, removing file");
                if let Err(cleanup) = store.delete(&file_name).await {
                    warn!(file_name = %file_name, error = %cleanup, "Failed to remove orphan file");
                }
                report.push(item(
                    ItemStatus::Erro,
                    SyncError::Metadata(err).user_message(),
                ));
            }
        }
    }

    async fn content_differs(
        &self,
        store: &dyn ObjectStore,
        file_name: &str,
        attachment: &RemoteAttachment,
    ) -> bool {
        if !self.config.detect_content_mismatch {
            return false;
        }
        match store.get(file_name).await {
            Ok(local) => {
                let differs =
                    ContentHash::compute(&local) != ContentHash::compute(&attachment.payload);
                if differs {
                    warn!(file_name = %file_name, uri = %attachment.uri, "Local file differs from ODK blob");
                }
                differs
            }
            Err(err) => {
                warn!(file_name = %file_name, error = %err, "Could not read file for comparison");
                false
            }
        }
    }
}
