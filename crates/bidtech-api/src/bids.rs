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
use bidtech_types::api::{BidCreated, CreateBidRequest, UpdateStatusRequest};
use bidtech_types::models::{Bid, BidStatus, Notification, NotificationKind, RequirementStatus, Role};

use crate::auth::{AppState, AppStateInner, optional_text};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::{Claims, require_role};
use crate::notify::{format_lkr, push_all, record};
use crate::requirements::check_expiry;
use crate::run_blocking;

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let (created, notification) =
        run_blocking(move || submit_bid(&worker, &claims, req, Utc::now())).await?;

    push_all(&state.dispatcher, vec![notification]).await;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_for_requirement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(requirement_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Customer)?;
    let rows = run_blocking(move || {
        let now = Utc::now();
        state.db.with_conn(|c| {
            if queries::requirements::owned_by(c, requirement_id, claims.sub)?.is_none() {
                return Ok(None);
            }
            queries::bids::list_for_requirement(c, requirement_id, now).map(Some)
        })?
        .ok_or(ApiError::NotFound("Requirement not found"))
    })
    .await?;
    Ok(Json(rows))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::ShopOwner)?;
    let rows = run_blocking(move || {
        let rows = state.db.with_conn(|c| match queries::shops::id_for_owner(c, claims.sub)? {
            Some(shop_id) => queries::bids::list_for_shop(c, shop_id),
            None => Ok(Vec::new()),
        })?;
        Ok(rows)
    })
    .await?;
    Ok(Json(rows))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(bid_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let notifications =
        run_blocking(move || set_bid_status(&worker, &claims, bid_id, &req.status, Utc::now())).await?;

    push_all(&state.dispatcher, notifications).await;
    Ok(Json(serde_json::json!({ "message": "Bid status updated" })))
}

/// Places a pending bid and records `bid_received` for the requirement's
/// customer in the same transaction.
pub(crate) fn submit_bid(
    state: &AppStateInner,
    claims: &Claims,
    req: CreateBidRequest,
    now: DateTime<Utc>,
) -> Result<(BidCreated, Notification), ApiError> {
    require_role(claims, Role::ShopOwner)?;
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiError::validation("Price must be a non-negative number"));
    }
    check_expiry(&req.expiry_date)?;

    state.db.transaction(|tx| -> Result<_, ApiError> {
        let shop_id = queries::shops::id_for_owner(tx, claims.sub)?
            .ok_or_else(|| ApiError::validation("Shop profile not found"))?;

        let requirement = queries::requirements::open_for_bids(tx, req.requirement_id, now)?
            .ok_or(ApiError::NotFound("Requirement not found or expired"))?;

        if queries::bids::exists(tx, requirement.id, shop_id)? {
            return Err(ApiError::Conflict("You have already placed a bid on this requirement"));
        }

        let bid = Bid {
            id: Uuid::new_v4(),
            requirement_id: requirement.id,
            shop_id,
            price: req.price,
            warranty_details: optional_text(req.warranty_details),
            message: optional_text(req.message),
            status: BidStatus::Pending,
            expiry_date: req.expiry_date,
            created_at: now,
        };
        if !queries::bids::insert(tx, &bid)? {
            return Err(ApiError::Conflict("You have already placed a bid on this requirement"));
        }

        let notification = record(
            tx,
            requirement.customer_id,
            NotificationKind::BidReceived,
            "New Bid Received",
            format!(
                "You received a new bid of {} for your requirement",
                format_lkr(bid.price)
            ),
            Some(bid.id),
            now,
        )?;

        info!("Bid {} placed on requirement {} by shop {}", bid.id, requirement.id, shop_id);
        Ok((BidCreated { bid_id: bid.id }, notification))
    })
}

/// Accepts or rejects a bid on one of the caller's requirements.
///
/// Acceptance fulfills the requirement and rejects every sibling; each
/// sibling yields its own `bid_rejected` row. All of it
/// commits as one unit.
pub(crate) fn set_bid_status(
    state: &AppStateInner,
    claims: &Claims,
    bid_id: Uuid,
    status: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, ApiError> {
    require_role(claims, Role::Customer)?;
    let status = match status.parse::<BidStatus>() {
        Ok(s @ (BidStatus::Accepted | BidStatus::Rejected)) => s,
        _ => return Err(ApiError::validation("Status must be accepted or rejected")),
    };

    state.db.transaction(|tx| -> Result<_, ApiError> {
        let ctx = queries::bids::context(tx, bid_id)?.ok_or(ApiError::NotFound("Bid not found"))?;
        if ctx.customer_id != claims.sub {
            return Err(ApiError::Forbidden("Unauthorized to update this bid"));
        }

        queries::bids::set_status(tx, bid_id, status)?;

        let mut notifications = Vec::new();
        if status == BidStatus::Accepted {
            queries::requirements::set_status(tx, ctx.bid.requirement_id, RequirementStatus::Fulfilled)?;
            let siblings = queries::bids::reject_siblings(tx, ctx.bid.requirement_id, bid_id)?;

            notifications.push(record(
                tx,
                ctx.shop_owner_id,
                NotificationKind::BidAccepted,
                "Bid Accepted!",
                format!("Your bid of {} has been accepted!", format_lkr(ctx.bid.price)),
                Some(bid_id),
                now,
            )?);
            for sibling in &siblings {
                notifications.push(record(
                    tx,
                    sibling.shop_owner_id,
                    NotificationKind::BidRejected,
                    "Bid Rejected",
                    "Your bid has been rejected",
                    Some(sibling.bid_id),
                    now,
                )?);
            }
            info!(
                "Bid {} accepted; requirement {} fulfilled, {} sibling(s) rejected",
                bid_id,
                ctx.bid.requirement_id,
                siblings.len()
            );
        } else {
            notifications.push(record(
                tx,
                ctx.shop_owner_id,
                NotificationKind::BidRejected,
                "Bid Rejected",
                "Your bid has been rejected",
                Some(bid_id),
                now,
            )?);
            info!("Bid {} rejected", bid_id);
        }

        Ok(notifications)
    })
}
