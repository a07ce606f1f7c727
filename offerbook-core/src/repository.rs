use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    DomainOffer, DomainStat, LedgerAck, Offer, OfferSubmission, RequestCount, SubmittedOffer,
    VisitCount,
};
use crate::{CoreError, CoreResult};

/// Flat string-keyed storage the ledgers are layered on.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Every key starting with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> CoreResult<Vec<String>>;

    /// Adds one to a decimal counter and returns the new value.
    ///
    /// The default is a plain read-modify-write and is not atomic against
    /// concurrent callers; adapters with an atomic primitive override it.
    async fn increment(&self, key: &str) -> CoreResult<u64> {
        let current = match self.get(key).await? {
            Some(raw) => parse_counter(key, &raw)?,
            None => 0,
        };
        let next = next_counter(key, current)?;
        self.put(key, &next.to_string()).await?;
        Ok(next)
    }
}

/// Reads a stored counter, rejecting anything that is not a decimal integer.
pub fn parse_counter(key: &str, raw: &str) -> CoreResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| CoreError::corrupt(key, e))
}

/// The value after `current`; a saturated counter is reported as corrupt.
pub fn next_counter(key: &str, current: u64) -> CoreResult<u64> {
    current
        .checked_add(1)
        .ok_or_else(|| CoreError::corrupt(key, "counter overflow"))
}

/// Per-domain offer and visit operations shared by every backing.
#[async_trait]
pub trait OfferLedger: Send + Sync {
    async fn track_domain_request(&self, domain: &str) -> CoreResult<RequestCount>;

    async fn get_domain_requests(&self, domain: &str) -> CoreResult<u64>;

    async fn increment_visits(&self, domain: &str) -> CoreResult<VisitCount>;

    async fn get_visits(&self, domain: &str) -> CoreResult<u64>;

    async fn submit_domain_offer(
        &self,
        domain: &str,
        submission: OfferSubmission,
    ) -> CoreResult<SubmittedOffer>;

    /// Newest first; empty for unknown domains.
    async fn get_domain_offers(&self, domain: &str) -> CoreResult<Vec<Offer>>;

    async fn delete_domain_offers(&self, domain: &str) -> CoreResult<LedgerAck>;

    /// `None` when the domain has no stored offer list at all.
    async fn delete_single_offer(
        &self,
        domain: &str,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<LedgerAck>>;

    async fn initialize_domain(&self, domain: &str) -> CoreResult<LedgerAck>;
}

/// Cross-domain enumeration. Only backings with a prefix scan over a shared
/// namespace can provide it.
#[async_trait]
pub trait DomainCatalog: OfferLedger {
    /// Every domain that has an offer list key, sorted by name.
    async fn get_all_domains(&self) -> CoreResult<Vec<String>>;

    /// Every offer of every domain, newest first.
    async fn get_all_offers(&self) -> CoreResult<Vec<DomainOffer>>;

    async fn get_domain_stats(&self) -> CoreResult<Vec<DomainStat>>;
}

/// Rejects the empty domain, which would otherwise map to a bare key prefix.
pub fn require_domain(domain: &str) -> CoreResult<()> {
    if domain.is_empty() {
        return Err(CoreError::Validation("domain is required".to_string()));
    }
    Ok(())
}

/// Shared checks every ledger runs before appending an offer.
pub fn validate_submission(domain: &str, submission: &OfferSubmission) -> CoreResult<()> {
    require_domain(domain)?;
    submission.validate().inspect_err(|e| {
        tracing::debug!(domain, error = %e, "Offer submission rejected");
    })
}
