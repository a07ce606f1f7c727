use async_trait::async_trait;

use crate::CoreResult;

/// Checks a human-verification token before a public write is accepted.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(false)` when the challenge was rejected; `Err` when the verifier
    /// could not give an answer.
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> CoreResult<bool>;
}
