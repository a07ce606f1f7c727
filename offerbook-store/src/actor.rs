//! Single-actor ledger: one task per domain owns that domain's state and
//! handles its commands one at a time, so per-domain read-modify-write
//! sequences never interleave.
//!
//! Actors are addressed by a UUIDv5 derived from the domain name and keep
//! their state in a private key space (`actor:<id>:`) of the shared store.
//! There is no cross-domain scan, so this backing implements
//! [`OfferLedger`] only.
//!
//! Actors hold no state of their own beyond the store, so the namespace drops
//! the ones left idle and caps how many stay alive. The next command for an
//! evicted domain spawns a fresh actor over the same keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use offerbook_core::models::{
    sort_newest_first, LedgerAck, Offer, OfferSubmission, RequestCount, SubmittedOffer, VisitCount,
};
use offerbook_core::repository::{require_domain, validate_submission, KvStore, OfferLedger};
use offerbook_core::{CoreError, CoreResult};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_config::StorageConfig;
use crate::records::{read_counter, read_offers, remove_by_timestamp, write_offers};

/// Deterministic actor address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    pub fn for_domain(domain: &str) -> Self {
        Self::from_name(&format!("domain-offers:{}", domain))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Commands
// ============================================================================

type Reply<T> = oneshot::Sender<CoreResult<T>>;

pub enum DomainCommand {
    TrackRequest { reply: Reply<RequestCount> },
    GetRequests { reply: Reply<u64> },
    IncrementVisits { reply: Reply<VisitCount> },
    GetVisits { reply: Reply<u64> },
    SubmitOffer {
        submission: OfferSubmission,
        reply: Reply<SubmittedOffer>,
    },
    GetOffers { reply: Reply<Vec<Offer>> },
    DeleteOffers { reply: Reply<LedgerAck> },
    DeleteSingleOffer {
        timestamp: DateTime<Utc>,
        reply: Reply<Option<LedgerAck>>,
    },
    Initialize { reply: Reply<LedgerAck> },
}

// ============================================================================
// Actor
// ============================================================================

pub struct DomainActor {
    id: ActorId,
    domain: String,
    receiver: mpsc::Receiver<DomainCommand>,
    store: Arc<dyn KvStore>,
    offers_key: String,
    requests_key: String,
    visits_key: String,
}

impl DomainActor {
    pub fn new(
        domain: &str,
        store: Arc<dyn KvStore>,
        mailbox: usize,
    ) -> (Self, DomainActorHandle) {
        let id = ActorId::for_domain(domain);
        let (sender, receiver) = mpsc::channel(mailbox.max(1));

        let local = format!("actor:{}:domain:{}", id, domain);
        let actor = Self {
            id,
            domain: domain.to_string(),
            receiver,
            store,
            offers_key: local.clone(),
            requests_key: format!("{}:requests", local),
            visits_key: format!("{}:visits", local),
        };
        let handle = DomainActorHandle {
            sender,
            domain: domain.to_string(),
            lease: Arc::new(()),
        };
        (actor, handle)
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub async fn run(mut self) {
        info!(domain = %self.domain, id = %self.id, "Domain actor started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle(cmd).await;
        }

        info!(domain = %self.domain, id = %self.id, "Domain actor stopped");
    }

    async fn handle(&self, cmd: DomainCommand) {
        // A dropped reply receiver means the caller gave up; nothing to do
        match cmd {
            DomainCommand::TrackRequest { reply } => {
                let _ = reply.send(self.track_request().await);
            }
            DomainCommand::GetRequests { reply } => {
                let _ = reply.send(read_counter(self.store.as_ref(), &self.requests_key).await);
            }
            DomainCommand::IncrementVisits { reply } => {
                let _ = reply.send(self.increment_visits().await);
            }
            DomainCommand::GetVisits { reply } => {
                let _ = reply.send(read_counter(self.store.as_ref(), &self.visits_key).await);
            }
            DomainCommand::SubmitOffer { submission, reply } => {
                let _ = reply.send(self.submit_offer(submission).await);
            }
            DomainCommand::GetOffers { reply } => {
                let _ = reply.send(self.offers().await);
            }
            DomainCommand::DeleteOffers { reply } => {
                let _ = reply.send(self.delete_offers().await);
            }
            DomainCommand::DeleteSingleOffer { timestamp, reply } => {
                let _ = reply.send(self.delete_single_offer(timestamp).await);
            }
            DomainCommand::Initialize { reply } => {
                let _ = reply.send(self.initialize().await);
            }
        }
    }

    async fn track_request(&self) -> CoreResult<RequestCount> {
        let requests = self.store.increment(&self.requests_key).await?;
        Ok(RequestCount {
            domain: self.domain.clone(),
            requests,
            timestamp: Utc::now(),
        })
    }

    async fn increment_visits(&self) -> CoreResult<VisitCount> {
        let visits = self.store.increment(&self.visits_key).await?;
        debug!(domain = %self.domain, visits, "Recorded visit");
        Ok(VisitCount {
            domain: self.domain.clone(),
            visits,
            timestamp: Utc::now(),
        })
    }

    async fn submit_offer(&self, submission: OfferSubmission) -> CoreResult<SubmittedOffer> {
        let mut offers = read_offers(self.store.as_ref(), &self.offers_key)
            .await?
            .unwrap_or_default();
        let offer = submission.stamp(Utc::now());
        offers.push(offer.clone());
        write_offers(self.store.as_ref(), &self.offers_key, &offers).await?;

        info!(
            domain = %self.domain,
            amount = offer.amount,
            total = offers.len(),
            "Offer submitted"
        );
        Ok(SubmittedOffer {
            domain: self.domain.clone(),
            offer,
            total_offers: offers.len(),
        })
    }

    async fn offers(&self) -> CoreResult<Vec<Offer>> {
        let mut offers = read_offers(self.store.as_ref(), &self.offers_key)
            .await?
            .unwrap_or_default();
        sort_newest_first(&mut offers);
        Ok(offers)
    }

    async fn delete_offers(&self) -> CoreResult<LedgerAck> {
        self.store.delete(&self.offers_key).await?;
        info!(domain = %self.domain, "Domain offers deleted");
        Ok(LedgerAck::new(&self.domain, "Domain offers deleted successfully"))
    }

    async fn delete_single_offer(
        &self,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<LedgerAck>> {
        let Some(mut offers) = read_offers(self.store.as_ref(), &self.offers_key).await? else {
            return Ok(None);
        };

        let removed = remove_by_timestamp(&mut offers, timestamp);
        if offers.is_empty() {
            self.store.delete(&self.offers_key).await?;
        } else {
            write_offers(self.store.as_ref(), &self.offers_key, &offers).await?;
        }

        info!(domain = %self.domain, %timestamp, removed, "Single offer deleted");
        Ok(Some(LedgerAck::new(&self.domain, "Offer deleted successfully")))
    }

    async fn initialize(&self) -> CoreResult<LedgerAck> {
        if self.store.get(&self.offers_key).await?.is_none() {
            write_offers(self.store.as_ref(), &self.offers_key, &[]).await?;
        }
        Ok(LedgerAck::new(&self.domain, "Domain initialized successfully"))
    }
}

// ============================================================================
// Handle
// ============================================================================

#[derive(Clone)]
pub struct DomainActorHandle {
    sender: mpsc::Sender<DomainCommand>,
    domain: String,
    /// Shared by every clone; the namespace's own copy is one reference.
    lease: Arc<()>,
}

impl DomainActorHandle {
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// True while a clone of this handle is held outside the namespace.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.lease) > 1
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> DomainCommand) -> CoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| CoreError::ActorUnavailable(self.domain.clone()))?;
        rx.await
            .map_err(|_| CoreError::ActorUnavailable(self.domain.clone()))?
    }

    pub async fn track_request(&self) -> CoreResult<RequestCount> {
        self.request(|reply| DomainCommand::TrackRequest { reply }).await
    }

    pub async fn requests(&self) -> CoreResult<u64> {
        self.request(|reply| DomainCommand::GetRequests { reply }).await
    }

    pub async fn increment_visits(&self) -> CoreResult<VisitCount> {
        self.request(|reply| DomainCommand::IncrementVisits { reply }).await
    }

    pub async fn visits(&self) -> CoreResult<u64> {
        self.request(|reply| DomainCommand::GetVisits { reply }).await
    }

    pub async fn submit_offer(&self, submission: OfferSubmission) -> CoreResult<SubmittedOffer> {
        self.request(|reply| DomainCommand::SubmitOffer { submission, reply })
            .await
    }

    pub async fn offers(&self) -> CoreResult<Vec<Offer>> {
        self.request(|reply| DomainCommand::GetOffers { reply }).await
    }

    pub async fn delete_offers(&self) -> CoreResult<LedgerAck> {
        self.request(|reply| DomainCommand::DeleteOffers { reply }).await
    }

    pub async fn delete_single_offer(
        &self,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<LedgerAck>> {
        self.request(|reply| DomainCommand::DeleteSingleOffer { timestamp, reply })
            .await
    }

    pub async fn initialize(&self) -> CoreResult<LedgerAck> {
        self.request(|reply| DomainCommand::Initialize { reply }).await
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Mailbox size and eviction limits for domain actors.
#[derive(Debug, Clone, Copy)]
pub struct ActorSettings {
    pub mailbox: usize,
    /// Actors untouched for this long are dropped.
    pub idle_timeout: Duration,
    /// Soft cap on live actors; the least recently used idle one goes first.
    pub max_actors: usize,
}

impl ActorSettings {
    pub fn with_mailbox(mailbox: usize) -> Self {
        Self {
            mailbox,
            ..Self::default()
        }
    }
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            mailbox: 32,
            idle_timeout: Duration::from_secs(300),
            max_actors: 10_000,
        }
    }
}

impl From<&StorageConfig> for ActorSettings {
    fn from(config: &StorageConfig) -> Self {
        Self {
            mailbox: config.actor_mailbox,
            idle_timeout: Duration::from_secs(config.actor_idle_seconds),
            max_actors: config.max_actors,
        }
    }
}

struct ActorEntry {
    handle: DomainActorHandle,
    last_used: Instant,
}

struct Registry {
    actors: HashMap<ActorId, ActorEntry>,
    last_sweep: Instant,
}

impl Registry {
    /// Drops stopped actors and those idle past `idle_timeout`.
    fn evict_idle(&mut self, now: Instant, idle_timeout: Duration) {
        let before = self.actors.len();
        self.actors.retain(|_, entry| {
            entry.handle.in_use()
                || (!entry.handle.is_closed() && now.duration_since(entry.last_used) < idle_timeout)
        });
        self.last_sweep = now;

        let evicted = before - self.actors.len();
        if evicted > 0 {
            debug!(evicted, live = self.actors.len(), "Evicted idle domain actors");
        }
    }

    /// Removes the least recently used actor nobody is talking to.
    fn evict_least_recent(&mut self) -> bool {
        let oldest = self
            .actors
            .iter()
            .filter(|(_, entry)| !entry.handle.in_use())
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| *id);

        match oldest {
            Some(id) => self.actors.remove(&id).is_some(),
            None => false,
        }
    }
}

/// Spawns domain actors on first use and hands out their handles.
pub struct ActorNamespace {
    store: Arc<dyn KvStore>,
    settings: ActorSettings,
    registry: Mutex<Registry>,
}

impl ActorNamespace {
    pub fn new(store: Arc<dyn KvStore>, settings: ActorSettings) -> Self {
        Self {
            store,
            settings,
            registry: Mutex::new(Registry {
                actors: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub async fn get(&self, domain: &str) -> DomainActorHandle {
        let id = ActorId::for_domain(domain);
        let now = Instant::now();
        let idle_timeout = self.settings.idle_timeout;
        let mut registry = self.registry.lock().await;

        if now.duration_since(registry.last_sweep) >= idle_timeout {
            registry.evict_idle(now, idle_timeout);
        }

        if let Some(entry) = registry.actors.get_mut(&id) {
            if !entry.handle.is_closed() {
                entry.last_used = now;
                return entry.handle.clone();
            }
            warn!(domain, %id, "Domain actor mailbox closed, respawning");
        } else if registry.actors.len() >= self.settings.max_actors {
            registry.evict_idle(now, idle_timeout);
            while registry.actors.len() >= self.settings.max_actors {
                if !registry.evict_least_recent() {
                    warn!(live = registry.actors.len(), "All domain actors busy, exceeding cap");
                    break;
                }
            }
        }

        let (actor, handle) = DomainActor::new(domain, self.store.clone(), self.settings.mailbox);
        tokio::spawn(actor.run());
        registry.actors.insert(
            id,
            ActorEntry {
                handle: handle.clone(),
                last_used: now,
            },
        );
        handle
    }

    pub async fn actor_count(&self) -> usize {
        self.registry.lock().await.actors.len()
    }
}

// ============================================================================
// Ledger
// ============================================================================

pub struct ActorOfferLedger {
    namespace: ActorNamespace,
}

impl ActorOfferLedger {
    pub fn new(store: Arc<dyn KvStore>, settings: ActorSettings) -> Self {
        Self {
            namespace: ActorNamespace::new(store, settings),
        }
    }

    pub fn namespace(&self) -> &ActorNamespace {
        &self.namespace
    }
}

#[async_trait]
impl OfferLedger for ActorOfferLedger {
    async fn track_domain_request(&self, domain: &str) -> CoreResult<RequestCount> {
        self.namespace.get(domain).await.track_request().await
    }

    async fn get_domain_requests(&self, domain: &str) -> CoreResult<u64> {
        self.namespace.get(domain).await.requests().await
    }

    async fn increment_visits(&self, domain: &str) -> CoreResult<VisitCount> {
        self.namespace.get(domain).await.increment_visits().await
    }

    async fn get_visits(&self, domain: &str) -> CoreResult<u64> {
        self.namespace.get(domain).await.visits().await
    }

    async fn submit_domain_offer(
        &self,
        domain: &str,
        submission: OfferSubmission,
    ) -> CoreResult<SubmittedOffer> {
        validate_submission(domain, &submission)?;
        self.namespace.get(domain).await.submit_offer(submission).await
    }

    async fn get_domain_offers(&self, domain: &str) -> CoreResult<Vec<Offer>> {
        self.namespace.get(domain).await.offers().await
    }

    async fn delete_domain_offers(&self, domain: &str) -> CoreResult<LedgerAck> {
        self.namespace.get(domain).await.delete_offers().await
    }

    async fn delete_single_offer(
        &self,
        domain: &str,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<LedgerAck>> {
        self.namespace
            .get(domain)
            .await
            .delete_single_offer(timestamp)
            .await
    }

    async fn initialize_domain(&self, domain: &str) -> CoreResult<LedgerAck> {
        require_domain(domain)?;
        self.namespace.get(domain).await.initialize().await
    }
}
