use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use offerbook_core::VisitCount;
use serde::Serialize;

use crate::{error::AppError, middleware::require_bearer, offers::DomainQuery, state::AppState};

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub domain: String,
    pub visits: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/visits", get(get_visits).post(record_visit))
}

/// POST /api/visits?domain=
/// Public; one call per page view.
pub async fn record_visit(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<VisitCount>, AppError> {
    let domain = query.require()?;
    let count = state.ledger.increment_visits(&domain).await?;
    tracing::debug!(domain = %count.domain, visits = count.visits, "Visit recorded");
    Ok(Json(count))
}

/// GET /api/visits?domain=
pub async fn get_visits(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
    headers: HeaderMap,
) -> Result<Json<VisitsResponse>, AppError> {
    require_bearer(&headers, &state.auth)?;
    let domain = query.require()?;

    let visits = state.ledger.get_visits(&domain).await?;
    Ok(Json(VisitsResponse { domain, visits }))
}
