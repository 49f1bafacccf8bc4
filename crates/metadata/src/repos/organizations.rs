//! Organization repository trait.

use crate::error::MetadataResult;
use crate::models::OrganizationRow;
use async_trait::async_trait;

/// Repository for organization records.
#[async_trait]
pub trait OrganizationRepo: Send + Sync {
    /// Create an organization, optionally with its ODK URI.
    async fn create_organization(
        &self,
        name: &str,
        odk_uri: Option<&str>,
    ) -> MetadataResult<OrganizationRow>;

    /// Get a live (not soft-deleted) organization by ID.
    async fn get_organization(&self, id: i64) -> MetadataResult<Option<OrganizationRow>>;

    /// Assign the ODK URI.
    ///
    /// Succeeds when the URI is unset or already equal; any other value is a
    /// `Constraint` error since the URI never changes once assigned.
    async fn set_organization_uri(&self, id: i64, odk_uri: &str) -> MetadataResult<()>;

    /// Mark an organization as removed. Rows are never deleted.
    async fn soft_delete_organization(&self, id: i64) -> MetadataResult<()>;
}
