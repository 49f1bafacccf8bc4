//! ODK sync endpoints.

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_sync;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use pinovara_core::{AttachmentKind, SyncReport};
use serde::Deserialize;
use std::time::Instant;

/// Body of a sync request.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    /// Acting user, stored as the uploader of new records.
    pub user_email: String,
}

impl SyncRequest {
    fn user_email(&self) -> ApiResult<&str> {
        let email = self.user_email.trim();
        if email.is_empty() {
            return Err(ApiError::BadRequest("user_email is required".to_string()));
        }
        Ok(email)
    }
}

/// POST /v1/organizations/{organization_id}/odk/{kind}/sync
///
/// Responds 200 with the report even when `success` is false.
pub async fn sync_kind(
    State(state): State<AppState>,
    Path((organization_id, kind)): Path<(i64, String)>,
    Json(req): Json<SyncRequest>,
) -> ApiResult<Json<SyncReport>> {
    let kind: AttachmentKind = kind.parse()?;
    let user_email = req.user_email()?;

    let started = Instant::now();
    let report = state
        .sync
        .sync_organization(kind, organization_id, user_email)
        .await;
    if state.config.server.metrics_enabled {
        record_sync(&report, started.elapsed());
    }

    Ok(Json(report))
}

/// POST /v1/organizations/{organization_id}/odk/sync
pub async fn sync_all_kinds(
    State(state): State<AppState>,
    Path(organization_id): Path<i64>,
    Json(req): Json<SyncRequest>,
) -> ApiResult<Json<Vec<SyncReport>>> {
    let user_email = req.user_email()?;

    let metrics_enabled = state.config.server.metrics_enabled;
    let reports = state
        .sync
        .sync_all_kinds_observed(organization_id, user_email, |report, elapsed| {
            if metrics_enabled {
                record_sync(report, elapsed);
            }
        })
        .await;

    Ok(Json(reports))
}
