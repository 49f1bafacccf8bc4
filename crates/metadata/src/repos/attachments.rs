//! Attachment record repository, shared by all attachment kinds.

use crate::error::MetadataResult;
use crate::models::{AttachmentRow, NewAttachment};
use async_trait::async_trait;
use pinovara_core::AttachmentKind;

/// Repository for document, photo and signature records.
#[async_trait]
pub trait AttachmentRepo: Send + Sync {
    /// Insert a record at the next position for its organization.
    ///
    /// Returns `AlreadyExists` if the organization already has a record
    /// with this file name.
    async fn create_attachment(
        &self,
        kind: AttachmentKind,
        attachment: &NewAttachment,
    ) -> MetadataResult<AttachmentRow>;

    /// List an organization's records in position order.
    async fn list_attachments(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
    ) -> MetadataResult<Vec<AttachmentRow>>;

    /// Get a record by organization and file name.
    async fn get_attachment_by_file_name(
        &self,
        kind: AttachmentKind,
        organization_id: i64,
        file_name: &str,
    ) -> MetadataResult<Option<AttachmentRow>>;
}
