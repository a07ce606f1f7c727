use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use offerbook_core::models::is_valid_amount;
use offerbook_core::{LedgerAck, Offer, OfferSubmission, SubmittedOffer};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::require_bearer, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

impl DomainQuery {
    pub fn require(self) -> Result<String, AppError> {
        match self.domain {
            Some(domain) if !domain.is_empty() => Ok(domain),
            _ => Err(AppError::Validation("Domain parameter is required".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitOfferRequest {
    pub email: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DomainOffersResponse {
    pub domain: String,
    pub offers: Vec<Offer>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/offers",
        get(list_offers).post(submit_offer).delete(delete_offers),
    )
}

/// Client address as reported by the edge proxy, if any.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("CF-Connecting-IP")
        .or_else(|| headers.get("X-Forwarded-For"))
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/offers?domain=
/// Public; the body must carry a verification token.
pub async fn submit_offer(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
    headers: HeaderMap,
    body: Result<Json<SubmitOfferRequest>, JsonRejection>,
) -> Result<Json<SubmittedOffer>, AppError> {
    let domain = query.require()?;
    let Json(req) = body.map_err(|_| AppError::Validation("Invalid request body".to_string()))?;

    let (email, amount) = match (req.email, req.amount) {
        (Some(email), Some(amount))
            if !email.trim().is_empty() && is_valid_amount(amount) && amount > 0.0 =>
        {
            (email, amount)
        }
        _ => return Err(AppError::Validation("Email and amount are required".to_string())),
    };

    let token = req
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Verification token is required".to_string()))?;

    let remote_ip = client_ip(&headers);
    if !state.verifier.verify(&token, remote_ip.as_deref()).await? {
        tracing::warn!(domain = %domain, "Offer rejected: verification failed");
        return Err(AppError::Validation("Verification failed".to_string()));
    }

    let receipt = state
        .ledger
        .submit_domain_offer(
            &domain,
            OfferSubmission {
                email,
                amount,
                description: req.description,
            },
        )
        .await?;

    Ok(Json(receipt))
}

/// GET /api/offers?domain=
pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
    headers: HeaderMap,
) -> Result<Json<DomainOffersResponse>, AppError> {
    require_bearer(&headers, &state.auth)?;
    let domain = query.require()?;

    let offers = state.ledger.get_domain_offers(&domain).await?;
    Ok(Json(DomainOffersResponse { domain, offers }))
}

/// DELETE /api/offers?domain=
pub async fn delete_offers(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
    headers: HeaderMap,
) -> Result<Json<LedgerAck>, AppError> {
    require_bearer(&headers, &state.auth)?;
    let domain = query.require()?;

    let ack = state.ledger.delete_domain_offers(&domain).await?;
    Ok(Json(ack))
}
