use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use offerbook_api::{app, state::AuthConfig, AppState};
use offerbook_core::{CoreError, CoreResult, KvStore, TokenVerifier};
use offerbook_store::{app_config::LedgerBackend, ActorSettings, LedgerBackends, MemoryKvStore};
use serde_json::{json, Value};
use tower::ServiceExt;

const API_TOKEN: &str = "test-api-token";
const ADMIN_PASSWORD: &str = "test-admin-password";

/// Accepts "valid", rejects anything else, and fails outright on "down".
struct ScriptedVerifier;

#[async_trait]
impl TokenVerifier for ScriptedVerifier {
    async fn verify(&self, token: &str, _remote_ip: Option<&str>) -> CoreResult<bool> {
        match token {
            "valid" => Ok(true),
            "down" => Err(CoreError::Verification("connection refused".into())),
            _ => Ok(false),
        }
    }
}

fn auth() -> AuthConfig {
    AuthConfig {
        api_token: API_TOKEN.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        session_secret: "integration-secret".to_string(),
        session_ttl_seconds: 3600,
        secure_cookies: false,
    }
}

fn router_over(store: Arc<dyn KvStore>, backend: LedgerBackend) -> Router {
    let backends = LedgerBackends::over(store, backend, ActorSettings::with_mailbox(8));
    app(AppState::new(backends, Arc::new(ScriptedVerifier), auth()))
}

fn router() -> Router {
    router_over(Arc::new(MemoryKvStore::new()), LedgerBackend::Kv)
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", API_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn with_cookie(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// Logs in and returns a `Cookie` header value carrying both session cookies.
async fn admin_cookie(app: &Router) -> String {
    let login = post_json("/admin/login", json!({ "password": ADMIN_PASSWORD }));
    let response = send(app, login).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect();
    assert_eq!(cookies.len(), 2);
    cookies.join("; ")
}

#[tokio::test]
async fn test_health() {
    let response = send(&router(), Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_offer_submission_flow() {
    let app = router();

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({
                "email": "a@b.co",
                "amount": 500,
                "description": "serious buyer",
                "token": "valid",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = body_json(response).await;
    assert_eq!(receipt["domain"], "example.com");
    assert_eq!(receipt["totalOffers"], 1);
    assert_eq!(receipt["offer"]["email"], "a@b.co");
    assert_eq!(receipt["offer"]["amount"], 500);
    assert!(receipt["offer"]["timestamp"].as_str().unwrap().ends_with('Z'));

    let response = send(&app, with_bearer("GET", "/api/offers?domain=example.com")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["domain"], "example.com");
    assert_eq!(listing["offers"].as_array().unwrap().len(), 1);
    assert_eq!(listing["offers"][0]["description"], "serious buyer");

    let response = send(&app, with_bearer("DELETE", "/api/offers?domain=example.com")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Domain offers deleted successfully");

    let response = send(&app, with_bearer("GET", "/api/offers?domain=example.com")).await;
    assert_eq!(body_json(response).await["offers"], json!([]));
}

#[tokio::test]
async fn test_documented_submission_example() {
    let app = router();

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({ "email": "a@b.com", "amount": 5000, "description": "x", "token": "valid" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut receipt = body_json(response).await;
    let timestamp = receipt["offer"]
        .as_object_mut()
        .and_then(|offer| offer.remove("timestamp"))
        .unwrap();
    assert!(timestamp.as_str().unwrap().parse::<DateTime<Utc>>().is_ok());
    assert_eq!(
        receipt,
        json!({
            "domain": "example.com",
            "offer": { "email": "a@b.com", "amount": 5000, "description": "x" },
            "totalOffers": 1,
        })
    );
}

#[tokio::test]
async fn test_client_timestamp_is_ignored() {
    let app = router();
    let before = Utc::now();

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({
                "email": "a@b.com",
                "amount": 5000,
                "token": "valid",
                "timestamp": "2000-01-01T00:00:00Z",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = body_json(response).await;
    let stamped: DateTime<Utc> = receipt["offer"]["timestamp"].as_str().unwrap().parse().unwrap();
    assert!(stamped >= before);

    let response = send(&app, with_bearer("GET", "/api/offers?domain=example.com")).await;
    let stored = body_json(response).await["offers"][0]["timestamp"].clone();
    assert_ne!(stored, "2000-01-01T00:00:00Z");
    assert_eq!(stored, receipt["offer"]["timestamp"]);
}

#[tokio::test]
async fn test_fractional_amount_is_kept() {
    let app = router();

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({ "email": "a@b.com", "amount": 1500.5, "description": "x", "token": "valid" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["offer"]["amount"], 1500.5);

    let response = send(&app, with_bearer("GET", "/api/offers?domain=example.com")).await;
    assert_eq!(body_json(response).await["offers"][0]["amount"], 1500.5);

    let cookie = admin_cookie(&app).await;
    let response = send(&app, with_cookie("GET", "/admin/stats", &cookie)).await;
    let stats = body_json(response).await;
    assert_eq!(stats[0]["topOffer"], 1500.5);
    assert_eq!(stats[0]["avgOffer"], 1501);
}

#[tokio::test]
async fn test_rejected_token_persists_nothing() {
    let app = router();

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({ "email": "a@b.co", "amount": 500, "token": "forged" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Verification failed");

    let response = send(&app, with_bearer("GET", "/api/offers?domain=example.com")).await;
    assert_eq!(body_json(response).await["offers"], json!([]));
}

#[tokio::test]
async fn test_verifier_outage_is_bad_gateway() {
    let response = send(
        &router(),
        post_json(
            "/api/offers?domain=example.com",
            json!({ "email": "a@b.co", "amount": 500, "token": "down" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_submission_validation() {
    let app = router();

    let body = json!({ "email": "a@b.co", "amount": 5, "token": "valid" });
    let response = send(&app, post_json("/api/offers", body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Domain parameter is required");

    let garbled = Request::builder()
        .method("POST")
        .uri("/api/offers?domain=example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, garbled).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid request body");

    for body in [
        json!({ "amount": 5, "token": "valid" }),
        json!({ "email": "a@b.co", "token": "valid" }),
        json!({ "email": "a@b.co", "amount": 0, "token": "valid" }),
        json!({ "email": "  ", "amount": 5, "token": "valid" }),
        json!({ "email": "a@b.co", "amount": -5, "token": "valid" }),
    ] {
        let response = send(&app, post_json("/api/offers?domain=example.com", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Email and amount are required");
    }

    let response = send(
        &app,
        post_json("/api/offers?domain=example.com", json!({ "email": "a@b.co", "amount": 5 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_offer_reads_require_bearer() {
    let app = router();

    for method in ["GET", "DELETE"] {
        let anonymous = Request::builder()
            .method(method)
            .uri("/api/offers?domain=example.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .method(method)
            .uri("/api/offers?domain=example.com")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(&app, with_bearer("GET", "/api/offers")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_visit_counter() {
    let app = router();

    for expected in 1..=3u64 {
        let response = send(&app, post_json("/api/visits?domain=example.com", json!({}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["visits"], expected);
    }

    let anonymous = Request::get("/api/visits?domain=example.com").body(Body::empty()).unwrap();
    assert_eq!(send(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, with_bearer("GET", "/api/visits?domain=example.com")).await;
    assert_eq!(body_json(response).await, json!({ "domain": "example.com", "visits": 3 }));

    let response = send(&app, with_bearer("GET", "/api/visits?domain=never-seen.com")).await;
    assert_eq!(body_json(response).await["visits"], 0);
}

#[tokio::test]
async fn test_admin_login_and_stats() {
    let app = router();

    for (domain, amount) in [("a.com", 100), ("b.com", 50), ("b.com", 70)] {
        let response = send(
            &app,
            post_json(
                &format!("/api/offers?domain={}", domain),
                json!({ "email": "x@y.z", "amount": amount, "token": "valid" }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let cookie = admin_cookie(&app).await;

    let response = send(&app, with_cookie("GET", "/admin/stats", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats[0]["domain"], "b.com");
    assert_eq!(stats[0]["offerCount"], 2);
    assert_eq!(stats[0]["avgOffer"], 60);
    assert_eq!(stats[0]["topOffer"], 70);
    assert_eq!(stats[1]["domain"], "a.com");

    let response = send(&app, with_cookie("GET", "/admin/domains", &cookie)).await;
    assert_eq!(body_json(response).await, json!(["a.com", "b.com"]));

    let response = send(&app, with_cookie("GET", "/admin/offers", &cookie)).await;
    let all = body_json(response).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert!(all[0]["domain"].is_string());
    assert!(all[0]["email"].is_string());
}

#[tokio::test]
async fn test_admin_routes_need_session() {
    let app = router();

    let response = send(&app, post_json("/admin/login", json!({ "password": "guess" }))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid password");

    let response = send(&app, Request::get("/admin/stats").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = "admin_auth=true; admin_auth_time=9999999999999";
    let response = send(&app, with_cookie("GET", "/admin/domains", forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_domain_management() {
    let app = router();
    let cookie = admin_cookie(&app).await;

    let mut init = post_json("/admin/domains", json!({ "domain": "fresh.com" }));
    init.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, init).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Domain initialized successfully");

    // No stored list yet for this one
    let response = send(
        &app,
        with_cookie(
            "DELETE",
            "/admin/offers?domain=empty.com&timestamp=2025-03-01T12:00:00Z",
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=fresh.com",
            json!({ "email": "a@b.co", "amount": 10, "token": "valid" }),
        ),
    )
    .await;
    let timestamp = body_json(response).await["offer"]["timestamp"].as_str().unwrap().to_string();

    let response = send(&app, with_cookie("GET", "/admin/domains/fresh.com/offers", &cookie)).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = send(
        &app,
        with_cookie(
            "DELETE",
            &format!("/admin/offers?domain=fresh.com&timestamp={}", timestamp),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Offer deleted successfully");

    let response = send(&app, with_cookie("GET", "/admin/domains/fresh.com/offers", &cookie)).await;
    assert_eq!(body_json(response).await, json!([]));

    let response = send(&app, with_cookie("DELETE", "/admin/domains/fresh.com", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let no_timestamp = with_cookie("DELETE", "/admin/offers?domain=fresh.com", &cookie);
    let response = send(&app, no_timestamp).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_domain_cannot_be_initialized() {
    let app = router();
    let cookie = admin_cookie(&app).await;

    let mut init = post_json("/admin/domains", json!({ "domain": "" }));
    init.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, init).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, with_cookie("GET", "/admin/domains", &cookie)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_actor_backing_has_no_listing() {
    let app = router_over(Arc::new(MemoryKvStore::new()), LedgerBackend::Actor);

    let response = send(
        &app,
        post_json(
            "/api/offers?domain=example.com",
            json!({ "email": "a@b.co", "amount": 500, "token": "valid" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["totalOffers"], 1);

    let cookie = admin_cookie(&app).await;
    for uri in ["/admin/stats", "/admin/offers", "/admin/domains"] {
        let response = send(&app, with_cookie("GET", uri, &cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    let per_domain = with_cookie("GET", "/admin/domains/example.com/offers", &cookie);
    let response = send(&app, per_domain).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupt_list_is_server_error() {
    let store = Arc::new(MemoryKvStore::new());
    store.put("offers:broken.com", "{not a list").await.unwrap();
    let app = router_over(store, LedgerBackend::Kv);

    let response = send(&app, with_bearer("GET", "/api/offers?domain=broken.com")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Internal Server Error");
}

#[tokio::test]
async fn test_cors_preflight() {
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/offers?domain=example.com")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = send(&router(), preflight).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
}
