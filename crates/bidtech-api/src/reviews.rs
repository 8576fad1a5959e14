use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use bidtech_db::queries;
use bidtech_reviews::SHOP_PAGE_LIMIT;
use bidtech_types::api::CreateReviewRequest;
use bidtech_types::models::{NotificationKind, Review, Role};

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::{Claims, require_role};
use crate::notify::notify_best_effort;
use crate::rating::refresh_shop_rating;
use crate::run_blocking;

pub const MAX_COMMENT_LEN: usize = 500;

/// A stored review plus who to tell about it.
#[derive(Debug)]
pub(crate) struct SubmittedReview {
    pub review: Review,
    pub shop_owner_id: Uuid,
    pub shop_name: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let submitted = run_blocking(move || submit_review(&worker, &claims, req, Utc::now())).await?;

    let review = submitted.review;
    notify_best_effort(
        &state,
        submitted.shop_owner_id,
        NotificationKind::ReviewReceived,
        "New Review".to_string(),
        format!(
            "{} left a {}-star review for {}",
            review.customer_name, review.rating, submitted.shop_name
        ),
        Some(review.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_for_shop(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reviews =
        run_blocking(move || Ok(state.reviews.list_for_shop(shop_id, SHOP_PAGE_LIMIT)?)).await?;
    Ok(Json(reviews))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, Role::Customer)?;
    let reviews = run_blocking(move || Ok(state.reviews.list_for_customer(claims.sub)?)).await?;
    Ok(Json(reviews))
}

/// Stores the review, then refreshes the shop's rating.
///
/// The review store and the ledger are separate databases, so the rating
/// refresh runs after the insert and its failure is only logged.
pub(crate) fn submit_review(
    state: &AppStateInner,
    claims: &Claims,
    req: CreateReviewRequest,
    now: DateTime<Utc>,
) -> Result<SubmittedReview, ApiError> {
    require_role(claims, Role::Customer)?;

    let rating = u8::try_from(req.rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| ApiError::validation("Rating must be between 1 and 5"))?;
    let comment = req.comment.map(|c| c.trim().to_string()).unwrap_or_default();
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation("Comment must be at most 500 characters"));
    }

    let (ctx, author) = state.db.with_conn(|c| {
        let ctx = queries::bids::accepted_for_customer(c, req.bid_id, claims.sub)?;
        let author = queries::users::by_id(c, claims.sub)?;
        Ok((ctx, author))
    })?;
    let ctx = ctx.ok_or(ApiError::InvalidState("Invalid bid or unauthorized"))?;

    if state
        .reviews
        .find_by_customer_and_bid(claims.sub, req.bid_id)?
        .is_some()
    {
        return Err(ApiError::Conflict("You have already reviewed this bid"));
    }

    let review = Review {
        id: Uuid::new_v4(),
        customer_id: claims.sub,
        shop_id: ctx.bid.shop_id,
        bid_id: req.bid_id,
        rating,
        comment,
        customer_name: author
            .and_then(|u| u.display_name())
            .unwrap_or_else(|| "Anonymous".to_string()),
        created_at: now,
    };
    if !state.reviews.insert(&review)? {
        return Err(ApiError::Conflict("You have already reviewed this bid"));
    }
    info!("Review {} ({}/5) for shop {}", review.id, review.rating, review.shop_id);

    if let Err(e) = refresh_shop_rating(state, review.shop_id) {
        warn!("Rating refresh failed for shop {}: {}", review.shop_id, e);
    }

    Ok(SubmittedReview {
        review,
        shop_owner_id: ctx.shop_owner_id,
        shop_name: ctx.shop_name,
    })
}
