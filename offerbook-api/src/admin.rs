use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use offerbook_core::{DomainOffer, DomainStat, LedgerAck, Offer};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::{admin_session_middleware, auth::{clear_session, issue_session, session_cookies}},
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct InitializeDomainRequest {
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct SingleOfferQuery {
    pub domain: Option<String>,
    pub timestamp: Option<String>,
}

/// Login and logout are open; everything else sits behind the session check.
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/stats", get(domain_stats))
        .route("/offers", get(all_offers).delete(delete_single_offer))
        .route("/domains", get(all_domains).post(initialize_domain))
        .route("/domains/{domain}", delete(delete_domain))
        .route("/domains/{domain}/offers", get(domain_offers))
        .route_layer(from_fn_with_state(state, admin_session_middleware));

    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(protected)
}

// ============================================================================
// Session Handlers
// ============================================================================

/// POST /admin/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let Json(req) = body.map_err(|_| AppError::Validation("Invalid request body".to_string()))?;

    if req.password != state.auth.admin_password {
        tracing::warn!("Admin login failed");
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    let session = issue_session(&state.auth, Utc::now())?;
    tracing::info!("Admin session issued");
    Ok((session_cookies(jar, session, &state.auth), Json(json!({ "success": true }))))
}

/// POST /admin/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (clear_session(jar), Json(json!({ "success": true })))
}

// ============================================================================
// Catalog Handlers
// ============================================================================

/// GET /admin/stats
pub async fn domain_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<DomainStat>>, AppError> {
    let stats = state.catalog()?.get_domain_stats().await?;
    Ok(Json(stats))
}

/// GET /admin/offers
pub async fn all_offers(State(state): State<AppState>) -> Result<Json<Vec<DomainOffer>>, AppError> {
    let offers = state.catalog()?.get_all_offers().await?;
    Ok(Json(offers))
}

/// GET /admin/domains
pub async fn all_domains(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let domains = state.catalog()?.get_all_domains().await?;
    Ok(Json(domains))
}

// ============================================================================
// Ledger Handlers
// ============================================================================

/// POST /admin/domains
pub async fn initialize_domain(
    State(state): State<AppState>,
    body: Result<Json<InitializeDomainRequest>, JsonRejection>,
) -> Result<Json<LedgerAck>, AppError> {
    let Json(req) = body.map_err(|_| AppError::Validation("Invalid request body".to_string()))?;
    if req.domain.is_empty() {
        return Err(AppError::Validation("Domain parameter is required".to_string()));
    }
    let ack = state.ledger.initialize_domain(&req.domain).await?;
    Ok(Json(ack))
}

/// DELETE /admin/domains/{domain}
pub async fn delete_domain(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<LedgerAck>, AppError> {
    let ack = state.ledger.delete_domain_offers(&domain).await?;
    tracing::info!(domain = %domain, "Domain offers cleared by admin");
    Ok(Json(ack))
}

/// GET /admin/domains/{domain}/offers
pub async fn domain_offers(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<Offer>>, AppError> {
    let offers = state.ledger.get_domain_offers(&domain).await?;
    Ok(Json(offers))
}

/// DELETE /admin/offers?domain=&timestamp=
/// 204 when the domain has no stored list.
pub async fn delete_single_offer(
    State(state): State<AppState>,
    Query(query): Query<SingleOfferQuery>,
) -> Result<Response, AppError> {
    let (Some(domain), Some(raw)) = (query.domain, query.timestamp) else {
        return Err(AppError::Validation("Domain and timestamp are required".to_string()));
    };
    let timestamp = DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AppError::Validation("Invalid timestamp".to_string()))?;

    match state.ledger.delete_single_offer(&domain, timestamp).await? {
        Some(ack) => Ok(Json(ack).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
