use std::sync::Arc;

use offerbook_core::{DomainCatalog, OfferLedger, TokenVerifier};
use offerbook_store::LedgerBackends;

use crate::error::AppError;

#[derive(Clone)]
pub struct AuthConfig {
    pub api_token: String,
    pub admin_password: String,
    pub session_secret: String,
    pub session_ttl_seconds: u64,
    pub secure_cookies: bool,
}

impl From<&offerbook_store::app_config::AuthConfig> for AuthConfig {
    fn from(config: &offerbook_store::app_config::AuthConfig) -> Self {
        Self {
            api_token: config.api_token.clone(),
            admin_password: config.admin_password.clone(),
            session_secret: config.session_secret.clone(),
            session_ttl_seconds: config.session_ttl_seconds,
            secure_cookies: config.secure_cookies,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn OfferLedger>,
    /// Absent when the backing cannot enumerate domains.
    pub catalog: Option<Arc<dyn DomainCatalog>>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub auth: AuthConfig,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        backends: LedgerBackends,
        verifier: Arc<dyn TokenVerifier>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            ledger: backends.ledger,
            catalog: backends.catalog,
            verifier,
            auth,
            allowed_origins: Vec::new(),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn catalog(&self) -> Result<&Arc<dyn DomainCatalog>, AppError> {
        self.catalog.as_ref().ok_or_else(|| {
            AppError::NotImplemented(
                "Domain listing is not available on this ledger backing".to_string(),
            )
        })
    }
}
