use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::{AppState, AuthConfig}};

pub const ADMIN_AUTH_COOKIE: &str = "admin_auth";
pub const ADMIN_AUTH_TIME_COOKIE: &str = "admin_auth_time";

// ============================================================================
// Bearer check
// ============================================================================

/// Static bearer token guarding offer reads and deletes.
pub fn require_bearer(headers: &HeaderMap, auth: &AuthConfig) -> Result<(), AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if token == auth.api_token => Ok(()),
        _ => {
            tracing::warn!("Rejected request with missing or invalid bearer token");
            Err(AppError::Unauthorized("Unauthorized".to_string()))
        }
    }
}

// ============================================================================
// Admin session
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    /// Issue time in epoch milliseconds, mirrored in `admin_auth_time`.
    pub auth_time: i64,
    pub exp: usize,
}

pub struct AdminSession {
    pub token: String,
    pub issued_at_ms: i64,
}

pub fn issue_session(auth: &AuthConfig, now: DateTime<Utc>) -> Result<AdminSession, AppError> {
    let claims = AdminClaims {
        sub: "admin".to_owned(),
        auth_time: now.timestamp_millis(),
        exp: (now + Duration::seconds(auth.session_ttl_seconds as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.session_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))?;

    Ok(AdminSession {
        token,
        issued_at_ms: claims.auth_time,
    })
}

/// Adds both session cookies to the jar.
pub fn session_cookies(jar: CookieJar, session: AdminSession, auth: &AuthConfig) -> CookieJar {
    let secure = auth.secure_cookies;
    jar.add(
        Cookie::build((ADMIN_AUTH_COOKIE, session.token))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Strict)
            .path("/"),
    )
    .add(
        Cookie::build((ADMIN_AUTH_TIME_COOKIE, session.issued_at_ms.to_string()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Strict)
            .path("/"),
    )
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ADMIN_AUTH_COOKIE).path("/"))
        .remove(Cookie::build(ADMIN_AUTH_TIME_COOKIE).path("/"))
}

/// Both cookies must be present, the token must verify, and the issue time
/// must be within the session TTL.
pub fn session_is_valid(jar: &CookieJar, auth: &AuthConfig, now: DateTime<Utc>) -> bool {
    let Some(token) = jar.get(ADMIN_AUTH_COOKIE) else {
        return false;
    };
    let Some(issued_at_ms) = jar
        .get(ADMIN_AUTH_TIME_COOKIE)
        .and_then(|c| c.value().parse::<i64>().ok())
    else {
        return false;
    };

    let age_ms = now.timestamp_millis() - issued_at_ms;
    if age_ms < 0 || age_ms > (auth.session_ttl_seconds as i64) * 1000 {
        return false;
    }

    match decode::<AdminClaims>(
        token.value(),
        &DecodingKey::from_secret(auth.session_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims.auth_time == issued_at_ms,
        Err(_) => false,
    }
}

pub async fn admin_session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !session_is_valid(&jar, &state.auth, Utc::now()) {
        tracing::warn!(path = %req.uri().path(), "Rejected admin request without a valid session");
        return Err(AppError::Unauthorized("Unauthorized".to_string()));
    }

    Ok(next.run(req).await)
}
