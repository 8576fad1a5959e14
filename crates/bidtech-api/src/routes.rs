use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};

use bidtech_gateway::connection;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{bids, notifications, requirements, reviews, shops, users};

/// The full HTTP surface. Cross-cutting layers (CORS, tracing) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/shops/verified", get(shops::list_verified))
        .route("/shops/{id}", get(shops::get_one))
        .route("/shops/{id}/verification", put(shops::set_verification))
        .route("/requirements", get(requirements::list_active))
        .route("/reviews/shop/{id}", get(reviews::list_for_shop))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users/profile", get(users::profile).put(users::update_profile))
        .route("/users/password", put(users::change_password))
        .route("/shops/profile", get(shops::own_shop).put(shops::update_own_shop))
        .route("/requirements", post(requirements::create))
        .route("/requirements/my", get(requirements::list_mine))
        .route("/requirements/{id}", get(requirements::get_one))
        .route("/requirements/{id}/status", put(requirements::update_status))
        .route("/bids", post(bids::create))
        .route("/bids/my", get(bids::list_mine))
        .route("/bids/requirement/{id}", get(bids::list_for_requirement))
        .route("/bids/{id}/status", put(bids::update_status))
        .route("/reviews", post(reviews::create))
        .route("/reviews/my", get(reviews::list_mine))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let ws_route = Router::new().route("/gateway", get(ws_upgrade));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use bidtech_types::models::{User, VerificationStatus};

    use crate::auth::create_token;
    use crate::testing;

    fn token(user: &User) -> String {
        create_token(testing::SECRET, user, chrono::Duration::days(1)).unwrap()
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = send(router(testing::state()), request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = router(testing::state());

        let (status, body) = send(app.clone(), request("GET", "/notifications", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = send(app, request("GET", "/users/profile", Some("garbage"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden() {
        let state = testing::state();
        let (owner, _) = testing::shop_owner(&state, "s@shop.lk", VerificationStatus::Verified, &[]);

        let body = json!({
            "title": "Gaming laptop",
            "budget": 350000,
            "tags": ["Laptop"],
            "expiry_date": "2099-01-01T00:00:00Z"
        });
        let (status, body) = send(
            router(state),
            request("POST", "/requirements", Some(&token(&owner)), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn requirement_board_round_trip() {
        let state = testing::state();
        let customer = testing::customer(&state, "c@example.lk");
        let (owner, _) = testing::shop_owner(&state, "s@shop.lk", VerificationStatus::Verified, &["Laptop"]);
        let app = router(state.clone());

        let (status, created) = send(
            app.clone(),
            request(
                "POST",
                "/requirements",
                Some(&token(&customer)),
                Some(json!({
                    "title": "Gaming laptop",
                    "description": "RTX 4060",
                    "budget": 350000,
                    "tags": ["Laptop", "Gaming"],
                    "expiry_date": "2099-01-01T00:00:00Z"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["matched_shops"], 1);
        let requirement_id = created["requirement_id"].as_str().unwrap().to_string();

        let (status, board) = send(app.clone(), request("GET", "/requirements", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board.as_array().unwrap().len(), 1);
        assert_eq!(board[0]["email"], "c@example.lk");

        let (status, count) = send(
            app.clone(),
            request("GET", "/notifications/unread-count", Some(&token(&owner)), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count["count"], 1);

        let (status, _) = send(
            app.clone(),
            request(
                "POST",
                "/bids",
                Some(&token(&owner)),
                Some(json!({
                    "requirement_id": requirement_id,
                    "price": 240000,
                    "expiry_date": "2099-01-01T00:00:00Z"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app,
            request(
                "POST",
                "/bids",
                Some(&token(&owner)),
                Some(json!({
                    "requirement_id": requirement_id,
                    "price": 230000,
                    "expiry_date": "2099-01-01T00:00:00Z"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn unknown_shop_is_not_found() {
        let uri = format!("/shops/{}", uuid::Uuid::new_v4());
        let (status, body) = send(router(testing::state()), request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let state = testing::state();
        let customer = testing::customer(&state, "c@example.lk");
        let app = router(state);

        let (status, body) = send(
            app.clone(),
            request(
                "POST",
                "/requirements",
                Some(&token(&customer)),
                Some(json!({
                    "title": "Gaming laptop",
                    "tags": ["Laptop"],
                    "expiry_date": "2099-01-01T00:00:00Z"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("budget"));

        let (status, body) = send(
            app,
            request("POST", "/auth/login", None, Some(json!({ "email": 42 }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn five_digit_expiry_year_is_refused() {
        let state = testing::state();
        let customer = testing::customer(&state, "c@example.lk");
        let app = router(state);

        let (status, body) = send(
            app.clone(),
            request(
                "POST",
                "/requirements",
                Some(&token(&customer)),
                Some(json!({
                    "title": "Gaming laptop",
                    "budget": 350000,
                    "tags": ["Laptop"],
                    "expiry_date": "+10000-01-01T00:00:00Z"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (_, board) = send(app, request("GET", "/requirements", None, None)).await;
        assert_eq!(board, json!([]));
    }
}
