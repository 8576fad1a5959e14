pub mod auth;
pub mod bids;
pub mod error;
pub mod extract;
pub mod matching;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod rating;
pub mod requirements;
pub mod reviews;
pub mod routes;
pub mod shops;
pub mod users;

use anyhow::anyhow;
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Run blocking SQLite / hashing work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("blocking task failed: {}", e))
    })?
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use bidtech_db::Database;
    use bidtech_db::queries;
    use bidtech_gateway::Dispatcher;
    use bidtech_reviews::ReviewStore;
    use bidtech_types::api::{Claims, CreateBidRequest, CreateRequirementRequest};
    use bidtech_types::models::{Notification, NotificationKind, Role, Shop, User, VerificationStatus};

    use crate::auth::{AppState, AppStateInner};

    pub const SECRET: &str = "test-secret-not-for-prod";

    pub fn state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            reviews: ReviewStore::open_in_memory().unwrap(),
            dispatcher: Dispatcher::new(),
            jwt_secret: SECRET.to_string(),
            token_ttl: Duration::days(7),
            admin_key: Some("admin-key".to_string()),
        })
    }

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
    }

    pub fn claims_for(user: &User) -> Claims {
        Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: usize::MAX,
        }
    }

    pub fn customer(state: &AppState, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: Role::Customer,
            first_name: Some("Dilani".into()),
            last_name: Some("Silva".into()),
            phone: None,
            created_at: now(),
        };
        state.db.with_conn_mut(|c| queries::users::insert(c, &user, "hash")).unwrap();
        user
    }

    pub fn shop_owner(state: &AppState, email: &str, status: VerificationStatus, tags: &[&str]) -> (User, Shop) {
        let owner = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: Role::ShopOwner,
            first_name: None,
            last_name: None,
            phone: Some("0112345678".into()),
            created_at: now(),
        };
        let shop = Shop {
            id: Uuid::new_v4(),
            user_id: owner.id,
            shop_name: format!("{email} electronics"),
            address: None,
            business_license: None,
            verification_status: status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now(),
        };
        state
            .db
            .with_conn_mut(|c| {
                queries::users::insert(c, &owner, "hash")?;
                queries::shops::insert(c, &shop)
            })
            .unwrap();
        (owner, shop)
    }

    pub fn requirement_request(tags: &[&str]) -> CreateRequirementRequest {
        CreateRequirementRequest {
            title: "Gaming laptop".into(),
            description: Some("RTX 4060 or better".into()),
            budget: 350_000.0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            expiry_date: now() + Duration::days(7),
        }
    }

    pub fn bid_request(requirement_id: Uuid, price: f64) -> CreateBidRequest {
        CreateBidRequest {
            requirement_id,
            price,
            warranty_details: Some("2 years".into()),
            message: Some("Brand new, sealed".into()),
            expiry_date: now() + Duration::days(3),
        }
    }

    pub fn notifications_for(state: &AppState, user_id: Uuid) -> Vec<Notification> {
        state
            .db
            .with_conn(|c| queries::notifications::list_for_user(c, user_id, 1000))
            .unwrap()
    }

    pub fn count_kind(state: &AppState, user_id: Uuid, kind: NotificationKind) -> usize {
        notifications_for(state, user_id)
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }
}
