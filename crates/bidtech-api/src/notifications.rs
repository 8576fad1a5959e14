use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use bidtech_db::queries;
use bidtech_types::api::UnreadCountResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::run_blocking;

pub const PAGE_LIMIT: u32 = 50;

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::notifications::list_for_user(c, claims.sub, PAGE_LIMIT))?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = run_blocking(move || {
        Ok(state
            .db
            .with_conn_mut(|c| queries::notifications::mark_read(c, notification_id, claims.sub))?)
    })
    .await?;

    if !updated {
        return Err(ApiError::NotFound("Notification not found"));
    }
    Ok(Json(serde_json::json!({ "message": "Notification marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = run_blocking(move || {
        Ok(state
            .db
            .with_conn_mut(|c| queries::notifications::mark_all_read(c, claims.sub))?)
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "All notifications marked as read", "updated": updated })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let count = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::notifications::unread_count(c, claims.sub))?)
    })
    .await?;
    Ok(Json(UnreadCountResponse { count }))
}
