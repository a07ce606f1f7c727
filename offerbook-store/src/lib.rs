pub mod actor;
pub mod app_config;
pub mod memory_repo;
pub mod offer_repo;
pub mod records;
pub mod redis_repo;

use std::sync::Arc;

use offerbook_core::repository::{DomainCatalog, KvStore, OfferLedger};
use offerbook_core::{CoreError, CoreResult};
use tracing::info;

pub use actor::{
    ActorId, ActorNamespace, ActorOfferLedger, ActorSettings, DomainActor, DomainActorHandle,
};
pub use memory_repo::MemoryKvStore;
pub use offer_repo::KvOfferLedger;
pub use redis_repo::RedisKvStore;

use app_config::{LedgerBackend, RedisConfig, StorageConfig, StoreBackend};

/// The ledger the API writes through, plus the listing capability when the
/// chosen backing has one.
#[derive(Clone)]
pub struct LedgerBackends {
    pub ledger: Arc<dyn OfferLedger>,
    pub catalog: Option<Arc<dyn DomainCatalog>>,
}

impl LedgerBackends {
    pub fn over(store: Arc<dyn KvStore>, backend: LedgerBackend, actors: ActorSettings) -> Self {
        match backend {
            LedgerBackend::Kv => {
                let ledger = Arc::new(KvOfferLedger::new(store));
                Self {
                    ledger: ledger.clone(),
                    catalog: Some(ledger),
                }
            }
            LedgerBackend::Actor => Self {
                ledger: Arc::new(ActorOfferLedger::new(store, actors)),
                catalog: None,
            },
        }
    }
}

pub async fn connect_store(
    config: &StorageConfig,
    redis: &RedisConfig,
) -> CoreResult<Arc<dyn KvStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisKvStore::new(&redis.url)
                .await
                .map_err(CoreError::storage)?;
            store.ping().await?;
            Ok(Arc::new(store))
        }
    }
}

pub async fn build_ledger(
    config: &StorageConfig,
    redis: &RedisConfig,
) -> CoreResult<LedgerBackends> {
    let store = connect_store(config, redis).await?;
    info!(ledger = ?config.ledger, "Ledger backing selected");
    Ok(LedgerBackends::over(store, config.ledger, ActorSettings::from(config)))
}
