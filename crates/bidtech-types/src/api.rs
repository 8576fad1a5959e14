use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Bid, Requirement, RequirementStatus, Role, Shop, User};

// -- JWT Claims --

/// JWT claims shared across bidtech-api (REST middleware) and bidtech-gateway
/// (WebSocket identify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Required when `role` is `shop_owner`.
    pub shop_name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub shop: Option<Shop>,
}

// -- Shops --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateShopRequest {
    pub shop_name: String,
    pub address: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ShopListing {
    #[serde(flatten)]
    pub shop: Shop,
    pub email: String,
    pub phone: Option<String>,
}

// -- Requirements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequirementRequest {
    pub title: String,
    pub description: Option<String>,
    pub budget: f64,
    pub tags: Vec<String>,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RequirementCreated {
    pub requirement_id: Uuid,
    pub matched_shops: usize,
}

#[derive(Debug, Serialize)]
pub struct RequirementListing {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MyRequirement {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub pending_bids: i64,
}

/// Status changes arrive as free text so that an unknown or disallowed value
/// is reported as a validation error rather than a body rejection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Bids --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBidRequest {
    pub requirement_id: Uuid,
    pub price: f64,
    pub warranty_details: Option<String>,
    pub message: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BidCreated {
    pub bid_id: Uuid,
}

/// A bid as seen by the requirement's customer.
#[derive(Debug, Serialize)]
pub struct BidWithShop {
    #[serde(flatten)]
    pub bid: Bid,
    pub shop_name: String,
    pub average_rating: f64,
    pub total_reviews: i64,
    pub email: String,
    pub phone: Option<String>,
}

/// A bid as seen by the shop that placed it.
#[derive(Debug, Serialize)]
pub struct BidWithRequirement {
    #[serde(flatten)]
    pub bid: Bid,
    pub title: String,
    pub budget: f64,
    pub requirement_status: RequirementStatus,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
}

// -- Reviews --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReviewRequest {
    pub bid_id: Uuid,
    pub rating: i64,
    pub comment: Option<String>,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}
