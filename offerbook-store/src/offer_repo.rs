use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use offerbook_core::models::{
    sort_newest_first, DomainOffer, DomainStat, LedgerAck, Offer, OfferSubmission, RequestCount,
    SubmittedOffer, VisitCount,
};
use offerbook_core::repository::{
    require_domain, validate_submission, DomainCatalog, KvStore, OfferLedger,
};
use offerbook_core::stats::{domain_stat, sort_domain_stats};
use offerbook_core::CoreResult;
use tracing::{debug, info};

use crate::records::{read_counter, read_offers, remove_by_timestamp, write_offers};

const OFFERS_PREFIX: &str = "offers:";
const REQUESTS_PREFIX: &str = "requests:";
const VISITS_PREFIX: &str = "visits:";

/// Ledger over one shared key namespace: `offers:<domain>`,
/// `requests:<domain>` and `visits:<domain>`.
///
/// Counter increments are as atomic as the store's `increment`. Offer list
/// appends are read-modify-write: two concurrent submissions for the same
/// domain can lose one of them.
pub struct KvOfferLedger {
    store: Arc<dyn KvStore>,
}

impl KvOfferLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    async fn offers(&self, domain: &str) -> CoreResult<Option<Vec<Offer>>> {
        read_offers(self.store.as_ref(), &offers_key(domain)).await
    }
}

fn offers_key(domain: &str) -> String {
    format!("{}{}", OFFERS_PREFIX, domain)
}

fn requests_key(domain: &str) -> String {
    format!("{}{}", REQUESTS_PREFIX, domain)
}

fn visits_key(domain: &str) -> String {
    format!("{}{}", VISITS_PREFIX, domain)
}

#[async_trait]
impl OfferLedger for KvOfferLedger {
    async fn track_domain_request(&self, domain: &str) -> CoreResult<RequestCount> {
        let requests = self.store.increment(&requests_key(domain)).await?;
        debug!(domain, requests, "Tracked domain request");
        Ok(RequestCount {
            domain: domain.to_string(),
            requests,
            timestamp: Utc::now(),
        })
    }

    async fn get_domain_requests(&self, domain: &str) -> CoreResult<u64> {
        read_counter(self.store.as_ref(), &requests_key(domain)).await
    }

    async fn increment_visits(&self, domain: &str) -> CoreResult<VisitCount> {
        let visits = self.store.increment(&visits_key(domain)).await?;
        debug!(domain, visits, "Recorded visit");
        Ok(VisitCount {
            domain: domain.to_string(),
            visits,
            timestamp: Utc::now(),
        })
    }

    async fn get_visits(&self, domain: &str) -> CoreResult<u64> {
        read_counter(self.store.as_ref(), &visits_key(domain)).await
    }

    async fn submit_domain_offer(
        &self,
        domain: &str,
        submission: OfferSubmission,
    ) -> CoreResult<SubmittedOffer> {
        validate_submission(domain, &submission)?;

        let key = offers_key(domain);
        let mut offers = read_offers(self.store.as_ref(), &key).await?.unwrap_or_default();
        let offer = submission.stamp(Utc::now());
        offers.push(offer.clone());
        write_offers(self.store.as_ref(), &key, &offers).await?;

        info!(domain, amount = offer.amount, total = offers.len(), "Offer submitted");
        Ok(SubmittedOffer {
            domain: domain.to_string(),
            offer,
            total_offers: offers.len(),
        })
    }

    async fn get_domain_offers(&self, domain: &str) -> CoreResult<Vec<Offer>> {
        let mut offers = self.offers(domain).await?.unwrap_or_default();
        sort_newest_first(&mut offers);
        Ok(offers)
    }

    async fn delete_domain_offers(&self, domain: &str) -> CoreResult<LedgerAck> {
        self.store.delete(&offers_key(domain)).await?;
        info!(domain, "Domain offers deleted");
        Ok(LedgerAck::new(domain, "Domain offers deleted successfully"))
    }

    async fn delete_single_offer(
        &self,
        domain: &str,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<LedgerAck>> {
        let key = offers_key(domain);
        let Some(mut offers) = read_offers(self.store.as_ref(), &key).await? else {
            return Ok(None);
        };

        let removed = remove_by_timestamp(&mut offers, timestamp);
        if offers.is_empty() {
            self.store.delete(&key).await?;
        } else {
            write_offers(self.store.as_ref(), &key, &offers).await?;
        }

        info!(domain, %timestamp, removed, "Single offer deleted");
        Ok(Some(LedgerAck::new(domain, "Offer deleted successfully")))
    }

    async fn initialize_domain(&self, domain: &str) -> CoreResult<LedgerAck> {
        require_domain(domain)?;
        let key = offers_key(domain);
        if self.store.get(&key).await?.is_none() {
            write_offers(self.store.as_ref(), &key, &[]).await?;
            info!(domain, "Domain initialized");
        }
        Ok(LedgerAck::new(domain, "Domain initialized successfully"))
    }
}

#[async_trait]
impl DomainCatalog for KvOfferLedger {
    async fn get_all_domains(&self) -> CoreResult<Vec<String>> {
        let mut domains: Vec<String> = self
            .store
            .list(OFFERS_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(OFFERS_PREFIX).map(str::to_string))
            .collect();
        domains.sort();
        Ok(domains)
    }

    async fn get_all_offers(&self) -> CoreResult<Vec<DomainOffer>> {
        let mut all = Vec::new();
        for domain in self.get_all_domains().await? {
            // Deleted between the scan and the read
            let Some(offers) = self.offers(&domain).await? else {
                continue;
            };
            all.extend(offers.into_iter().map(|offer| DomainOffer {
                domain: domain.clone(),
                offer,
            }));
        }

        all.sort_by(|a, b| b.offer.timestamp.cmp(&a.offer.timestamp));
        Ok(all)
    }

    async fn get_domain_stats(&self) -> CoreResult<Vec<DomainStat>> {
        let mut stats = Vec::new();
        for domain in self.get_all_domains().await? {
            let offers = self.get_domain_offers(&domain).await?;
            let visits = self.get_visits(&domain).await?;
            stats.push(domain_stat(&domain, visits, &offers));
        }

        sort_domain_stats(&mut stats);
        Ok(stats)
    }
}
