use std::time::Duration;

use async_trait::async_trait;
use offerbook_core::{CoreError, CoreResult, TokenVerifier};
use offerbook_store::app_config::CaptchaConfig;
use serde::{Deserialize, Serialize};

/// Cloudflare Turnstile siteverify client.
pub struct TurnstileVerifier {
    client: reqwest::Client,
    secret_key: String,
    verify_url: String,
}

#[derive(Debug, Serialize)]
struct SiteverifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoteip: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl TurnstileVerifier {
    pub fn new(config: &CaptchaConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            verify_url: config.verify_url.clone(),
        })
    }
}

#[async_trait]
impl TokenVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> CoreResult<bool> {
        let body = SiteverifyRequest {
            secret: &self.secret_key,
            response: token,
            remoteip: remote_ip,
        };

        let response = self
            .client
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Verification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Verification(format!("siteverify returned {}", status)));
        }

        let outcome: SiteverifyResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Verification(e.to_string()))?;

        if !outcome.success {
            tracing::warn!(codes = ?outcome.error_codes, "Verification token rejected");
        }
        Ok(outcome.success)
    }
}
