//! Local attachment record endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use pinovara_core::AttachmentKind;
use pinovara_metadata::models::AttachmentRow;

/// GET /v1/organizations/{organization_id}/attachments/{kind}
pub async fn list_attachments(
    State(state): State<AppState>,
    Path((organization_id, kind)): Path<(i64, String)>,
) -> ApiResult<Json<Vec<AttachmentRow>>> {
    let kind: AttachmentKind = kind.parse()?;

    state
        .metadata
        .get_organization(organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("organization {organization_id}")))?;

    let rows = state
        .metadata
        .list_attachments(kind, organization_id)
        .await?;
    Ok(Json(rows))
}

/// GET /v1/organizations/{organization_id}/attachments/{kind}/audit
///
/// Records whose file is missing from the upload directory.
pub async fn audit_attachments(
    State(state): State<AppState>,
    Path((organization_id, kind)): Path<(i64, String)>,
) -> ApiResult<Json<Vec<AttachmentRow>>> {
    let kind: AttachmentKind = kind.parse()?;
    let missing = state.sync.audit_attachments(kind, organization_id).await?;
    Ok(Json(missing))
}
