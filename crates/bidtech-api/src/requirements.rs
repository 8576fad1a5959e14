use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use bidtech_db::queries;
use bidtech_types::api::{CreateRequirementRequest, RequirementCreated, UpdateStatusRequest};
use bidtech_types::models::{Notification, NotificationKind, Requirement, RequirementStatus, Role};

use crate::auth::{AppState, AppStateInner, optional_text};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::matching::{find_matching_shops, normalize_tags};
use crate::middleware::{Claims, require_role};
use crate::notify::{push_all, record};
use crate::run_blocking;

pub const MAX_TITLE_LEN: usize = 255;

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateRequirementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let (created, notifications) =
        run_blocking(move || post_requirement(&worker, &claims, req, Utc::now())).await?;

    push_all(&state.dispatcher, notifications).await;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_active(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::requirements::list_active(c, Utc::now()))?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Customer)?;
    let rows = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::requirements::list_for_customer(c, claims.sub))?)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(requirement_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::requirements::listing(c, requirement_id))?)
    })
    .await?
    .ok_or(ApiError::NotFound("Requirement not found"))?;
    Ok(Json(row))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(requirement_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || set_requirement_status(&state, &claims, requirement_id, &req.status)).await?;
    Ok(Json(serde_json::json!({ "message": "Requirement status updated" })))
}

pub(crate) fn check_expiry(expiry: &DateTime<Utc>) -> Result<(), ApiError> {
    if !bidtech_db::is_storable_ts(expiry) {
        return Err(ApiError::validation("Expiry date must fall between years 0000 and 9999"));
    }
    Ok(())
}

/// Inserts an active requirement and, in the same transaction, one
/// `requirement_matched` row per matching verified shop. The returned rows
/// are pushed by the caller once the transaction has committed.
pub(crate) fn post_requirement(
    state: &AppStateInner,
    claims: &Claims,
    req: CreateRequirementRequest,
    now: DateTime<Utc>,
) -> Result<(RequirementCreated, Vec<Notification>), ApiError> {
    require_role(claims, Role::Customer)?;

    let title = req.title.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation("Title must be between 1 and 255 characters"));
    }
    if !req.budget.is_finite() || req.budget < 0.0 {
        return Err(ApiError::validation("Budget must be a non-negative number"));
    }
    check_expiry(&req.expiry_date)?;

    let requirement = Requirement {
        id: Uuid::new_v4(),
        customer_id: claims.sub,
        title,
        description: optional_text(req.description),
        budget: req.budget,
        tags: normalize_tags(&req.tags),
        expiry_date: req.expiry_date,
        status: RequirementStatus::Active,
        created_at: now,
    };

    let notifications = state.db.transaction(|tx| -> Result<_, ApiError> {
        queries::requirements::insert(tx, &requirement)?;

        let matched = find_matching_shops(tx, &requirement.tags)?;
        let mut rows = Vec::with_capacity(matched.len());
        for shop in &matched {
            rows.push(record(
                tx,
                shop.user_id,
                NotificationKind::RequirementMatched,
                "New Matching Requirement",
                format!("A new requirement \"{}\" matches your shop tags", requirement.title),
                Some(requirement.id),
                now,
            )?);
        }
        Ok(rows)
    })?;

    info!(
        "Requirement {} posted by {}; matched {} shop(s)",
        requirement.id,
        claims.sub,
        notifications.len()
    );

    Ok((
        RequirementCreated {
            requirement_id: requirement.id,
            matched_shops: notifications.len(),
        },
        notifications,
    ))
}

/// Direct overwrite by the owner. Any of the three statuses may be set.
pub(crate) fn set_requirement_status(
    state: &AppStateInner,
    claims: &Claims,
    requirement_id: Uuid,
    status: &str,
) -> Result<(), ApiError> {
    require_role(claims, Role::Customer)?;
    let status: RequirementStatus = status
        .parse()
        .map_err(|_| ApiError::validation("Status must be one of active, fulfilled, expired"))?;

    let updated = state.db.with_conn_mut(|c| {
        queries::requirements::set_status_owned(c, requirement_id, claims.sub, status)
    })?;
    if !updated {
        return Err(ApiError::NotFound("Requirement not found"));
    }

    info!("Requirement {} set to {}", requirement_id, status);
    Ok(())
}
