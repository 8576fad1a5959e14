use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use bidtech_db::queries;
use bidtech_types::api::{UpdateShopRequest, UpdateStatusRequest};
use bidtech_types::models::{Role, Shop, VerificationStatus};

use crate::auth::{AppState, AppStateInner, optional_text};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::matching::normalize_tags;
use crate::middleware::{Claims, require_role};
use crate::run_blocking;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub async fn own_shop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::ShopOwner)?;
    let shop = run_blocking(move || {
        Ok(state
            .db
            .with_conn(|c| queries::shops::by_owner(c, claims.sub))?)
    })
    .await?
    .ok_or(ApiError::NotFound("Shop profile not found"))?;
    Ok(Json(shop))
}

pub async fn update_own_shop(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateShopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let shop = run_blocking(move || update_shop(&state, &claims, req)).await?;
    Ok(Json(shop))
}

pub async fn list_verified(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let shops = run_blocking(move || Ok(state.db.with_conn(queries::shops::list_verified)?)).await?;
    Ok(Json(shops))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let shop = run_blocking(move || Ok(state.db.with_conn(|c| queries::shops::listing(c, shop_id))?))
        .await?
        .ok_or(ApiError::NotFound("Shop not found"))?;
    Ok(Json(shop))
}

pub async fn set_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(shop_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    run_blocking(move || verify_shop(&state, presented.as_deref(), shop_id, &req.status)).await?;
    Ok(Json(serde_json::json!({ "message": "Verification status updated" })))
}

/// Owner-side edit. Name, address and tags are replaced wholesale; omitting
/// `tags` keeps the current set.
pub(crate) fn update_shop(
    state: &AppStateInner,
    claims: &Claims,
    req: UpdateShopRequest,
) -> Result<Shop, ApiError> {
    require_role(claims, Role::ShopOwner)?;
    let shop_name = req.shop_name.trim().to_string();
    if shop_name.is_empty() {
        return Err(ApiError::validation("Shop name is required"));
    }
    let address = optional_text(req.address);

    state.db.transaction(|tx| -> Result<_, ApiError> {
        let current = queries::shops::by_owner(tx, claims.sub)?
            .ok_or(ApiError::NotFound("Shop profile not found"))?;
        let tags = match &req.tags {
            Some(tags) => normalize_tags(tags),
            None => current.tags,
        };

        queries::shops::update_profile(tx, claims.sub, &shop_name, address.as_deref(), &tags)?;
        queries::shops::by_owner(tx, claims.sub)?.ok_or(ApiError::NotFound("Shop profile not found"))
    })
}

/// Operator action gated by the configured admin key. With no key
/// configured the action is unavailable.
pub(crate) fn verify_shop(
    state: &AppStateInner,
    presented_key: Option<&str>,
    shop_id: Uuid,
    status: &str,
) -> Result<(), ApiError> {
    match (state.admin_key.as_deref(), presented_key) {
        (Some(expected), Some(presented)) if expected == presented => {}
        _ => return Err(ApiError::Forbidden("Admin key required")),
    }

    let status: VerificationStatus = status
        .parse()
        .map_err(|_| ApiError::validation("Status must be one of pending, verified, rejected"))?;

    let updated = state
        .db
        .with_conn_mut(|c| queries::shops::set_verification(c, shop_id, status))?;
    if !updated {
        return Err(ApiError::NotFound("Shop not found"));
    }

    info!("Shop {} verification set to {}", shop_id, status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn owner_edits_name_and_tags() {
        let state = testing::state();
        let (owner, _) = testing::shop_owner(&state, "s@shop.lk", VerificationStatus::Verified, &["Mobile"]);
        let claims = testing::claims_for(&owner);

        let shop = update_shop(
            &state,
            &claims,
            UpdateShopRequest {
                shop_name: " Tech Hub ".into(),
                address: Some("Kandy".into()),
                tags: Some(vec!["Laptop".into(), " Laptop".into(), "".into(), "Printer".into()]),
            },
        )
        .unwrap();
        assert_eq!(shop.shop_name, "Tech Hub");
        assert_eq!(shop.tags, vec!["Laptop".to_string(), "Printer".to_string()]);

        let shop = update_shop(
            &state,
            &claims,
            UpdateShopRequest {
                shop_name: "Tech Hub".into(),
                address: None,
                tags: None,
            },
        )
        .unwrap();
        assert_eq!(shop.tags, vec!["Laptop".to_string(), "Printer".to_string()]);
        assert_eq!(shop.address, None);

        let err = update_shop(
            &state,
            &claims,
            UpdateShopRequest {
                shop_name: "  ".into(),
                address: None,
                tags: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn verification_needs_the_admin_key() {
        let state = testing::state();
        let (_, shop) = testing::shop_owner(&state, "s@shop.lk", VerificationStatus::Pending, &["Laptop"]);

        for key in [None, Some("wrong")] {
            let err = verify_shop(&state, key, shop.id, "verified").unwrap_err();
            assert!(matches!(err, ApiError::Forbidden(_)));
        }

        let err = verify_shop(&state, Some("admin-key"), shop.id, "approved").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = verify_shop(&state, Some("admin-key"), Uuid::new_v4(), "verified").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        verify_shop(&state, Some("admin-key"), shop.id, "verified").unwrap();
        let verified = state.db.with_conn(queries::shops::list_verified).unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].shop.id, shop.id);
    }

    #[test]
    fn verification_disabled_without_configured_key() {
        let state = std::sync::Arc::new(AppStateInner {
            db: bidtech_db::Database::open_in_memory().unwrap(),
            reviews: bidtech_reviews::ReviewStore::open_in_memory().unwrap(),
            dispatcher: bidtech_gateway::Dispatcher::new(),
            jwt_secret: testing::SECRET.to_string(),
            token_ttl: chrono::Duration::days(1),
            admin_key: None,
        });
        let (_, shop) = testing::shop_owner(&state, "s@shop.lk", VerificationStatus::Pending, &[]);
        let err = verify_shop(&state, Some(""), shop.id, "verified").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
