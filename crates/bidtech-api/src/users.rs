use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use bidtech_db::queries;
use bidtech_types::api::{ChangePasswordRequest, ProfileResponse, UpdateProfileRequest};
use bidtech_types::models::Role;

use crate::auth::{
    AppState, AppStateInner, MIN_PASSWORD_LEN, hash_password, optional_text, validate_phone, verify_password,
};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::Claims;
use crate::run_blocking;

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(move || load_profile(&state, &claims)).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(move || {
        save_profile(&state, &claims, req)?;
        load_profile(&state, &claims)
    })
    .await?;
    Ok(Json(profile))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || update_password(&state, &claims, req)).await?;
    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}

/// The caller's user record, with their shop for shop owners.
pub(crate) fn load_profile(state: &AppStateInner, claims: &Claims) -> Result<ProfileResponse, ApiError> {
    let (user, shop) = state.db.with_conn(|c| {
        let user = queries::users::by_id(c, claims.sub)?;
        let shop = match claims.role {
            Role::ShopOwner => queries::shops::by_owner(c, claims.sub)?,
            Role::Customer => None,
        };
        Ok((user, shop))
    })?;

    let user = user.ok_or(ApiError::NotFound("User not found"))?;
    Ok(ProfileResponse { user, shop })
}

pub(crate) fn save_profile(
    state: &AppStateInner,
    claims: &Claims,
    req: UpdateProfileRequest,
) -> Result<(), ApiError> {
    let phone = optional_text(req.phone);
    if let Some(phone) = &phone {
        validate_phone(phone)?;
    }
    let first_name = optional_text(req.first_name);
    let last_name = optional_text(req.last_name);

    let updated = state.db.with_conn_mut(|c| {
        queries::users::update_profile(
            c,
            claims.sub,
            first_name.as_deref(),
            last_name.as_deref(),
            phone.as_deref(),
        )
    })?;
    if !updated {
        return Err(ApiError::NotFound("User not found"));
    }
    Ok(())
}

pub(crate) fn update_password(
    state: &AppStateInner,
    claims: &Claims,
    req: ChangePasswordRequest,
) -> Result<(), ApiError> {
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    let stored = state
        .db
        .with_conn(|c| queries::users::password_hash(c, claims.sub))?
        .ok_or(ApiError::NotFound("User not found"))?;
    if !verify_password(&req.current_password, &stored)? {
        return Err(ApiError::Unauthorized("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    state
        .db
        .with_conn_mut(|c| queries::users::update_password(c, claims.sub, &hash))?;

    info!("Password changed for {}", claims.email);
    Ok(())
}
