use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use bidtech_db::Database;
use bidtech_db::queries;
use bidtech_gateway::Dispatcher;
use bidtech_reviews::ReviewStore;
use bidtech_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use bidtech_types::models::{Role, Shop, User, VerificationStatus};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::Claims;
use crate::run_blocking;

pub const MIN_PASSWORD_LEN: usize = 6;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs, built once at startup and passed in.
pub struct AppStateInner {
    pub db: Database,
    pub reviews: ReviewStore,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// `None` disables the shop verification endpoint.
    pub admin_key: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = run_blocking(move || register_user(&state, req, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = run_blocking(move || login_user(&state, req)).await?;
    Ok(Json(response))
}

/// Creates the user and, for shop owners, their (pending) shop in one
/// transaction.
pub(crate) fn register_user(
    state: &AppStateInner,
    req: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }
    let phone = optional_text(req.phone);
    if let Some(phone) = &phone {
        validate_phone(phone)?;
    }

    let shop_name = optional_text(req.shop_name);
    if req.role == Role::ShopOwner && shop_name.is_none() {
        return Err(ApiError::validation("Shop name is required for shop owners"));
    }

    let password_hash = hash_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        email,
        role: req.role,
        first_name: optional_text(req.first_name),
        last_name: optional_text(req.last_name),
        phone,
        created_at: now,
    };

    state.db.transaction(|tx| -> Result<_, ApiError> {
        if queries::users::email_taken(tx, &user.email)? {
            return Err(ApiError::Conflict("User already exists"));
        }
        queries::users::insert(tx, &user, &password_hash)?;

        if let (Role::ShopOwner, Some(shop_name)) = (user.role, &shop_name) {
            queries::shops::insert(
                tx,
                &Shop {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    shop_name: shop_name.clone(),
                    address: optional_text(req.address.clone()),
                    business_license: None,
                    verification_status: VerificationStatus::Pending,
                    tags: Vec::new(),
                    average_rating: 0.0,
                    total_reviews: 0,
                    created_at: now,
                },
            )?;
        }
        Ok(())
    })?;

    info!("Registered {} ({})", user.email, user.role);

    let token = create_token(&state.jwt_secret, &user, state.token_ttl)?;
    Ok(AuthResponse { token, user })
}

pub(crate) fn login_user(state: &AppStateInner, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    const INVALID: ApiError = ApiError::Unauthorized("Invalid credentials");

    let email = req.email.trim().to_lowercase();
    let row = state
        .db
        .with_conn(|c| queries::users::by_email(c, &email))?
        .ok_or(INVALID)?;

    if !verify_password(&req.password, &row.password)? {
        return Err(INVALID);
    }

    let token = create_token(&state.jwt_secret, &row.user, state.token_ttl)?;
    Ok(AuthResponse {
        token,
        user: row.user,
    })
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash =
        PasswordHash::new(stored_hash).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(secret: &str, user: &User, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(ApiError::validation("A valid email address is required"))
    }
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if allowed && (7..=15).contains(&digits) {
        Ok(())
    } else {
        Err(ApiError::validation("Phone number is not valid"))
    }
}

/// Trimmed text, with blank treated as absent.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;
    use crate::testing;

    fn register_req(email: &str, role: Role, shop_name: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "hunter22".to_string(),
            role,
            first_name: Some("Ruwan".into()),
            last_name: Some("Fernando".into()),
            phone: Some("+94 77 123 4567".into()),
            shop_name: shop_name.map(str::to_string),
            address: Some("Galle Road, Colombo 03".into()),
        }
    }

    #[test]
    fn shop_owner_registration_creates_pending_shop() {
        let state = testing::state();
        let out = register_user(
            &state,
            register_req("Owner@Shop.lk", Role::ShopOwner, Some("Ruwan Computers")),
            testing::now(),
        )
        .unwrap();

        assert_eq!(out.user.email, "owner@shop.lk");
        let shop = state
            .db
            .with_conn(|c| queries::shops::by_owner(c, out.user.id))
            .unwrap()
            .unwrap();
        assert_eq!(shop.shop_name, "Ruwan Computers");
        assert_eq!(shop.verification_status, VerificationStatus::Pending);

        let claims = decode_token(testing::SECRET, &out.token).unwrap();
        assert_eq!(claims.sub, out.user.id);
        assert_eq!(claims.role, Role::ShopOwner);
    }

    #[test]
    fn shop_owner_without_shop_name_is_invalid() {
        let state = testing::state();
        let err = register_user(&state, register_req("o@shop.lk", Role::ShopOwner, None), testing::now())
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn duplicate_email_conflicts() {
        let state = testing::state();
        register_user(&state, register_req("c@example.lk", Role::Customer, None), testing::now()).unwrap();
        let err = register_user(&state, register_req("C@example.lk ", Role::Customer, None), testing::now())
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn login_checks_password() {
        let state = testing::state();
        register_user(&state, register_req("c@example.lk", Role::Customer, None), testing::now()).unwrap();

        let ok = login_user(
            &state,
            LoginRequest { email: "c@example.lk".into(), password: "hunter22".into() },
        )
        .unwrap();
        assert_eq!(ok.user.role, Role::Customer);

        let bad = login_user(
            &state,
            LoginRequest { email: "c@example.lk".into(), password: "wrong-one".into() },
        )
        .unwrap_err();
        assert!(matches!(bad, ApiError::Unauthorized(_)));

        let unknown = login_user(
            &state,
            LoginRequest { email: "nobody@example.lk".into(), password: "hunter22".into() },
        )
        .unwrap_err();
        assert!(matches!(unknown, ApiError::Unauthorized(_)));
    }

    #[test]
    fn input_validation() {
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
        assert_eq!(normalize_email(" A@B.lk ").unwrap(), "a@b.lk");
        assert!(validate_phone("0771234567").is_ok());
        assert!(validate_phone("call me").is_err());
        assert_eq!(optional_text(Some("  ".into())), None);
    }
}
