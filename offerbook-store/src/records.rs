//! Stored encodings shared by both ledgers: offer lists are JSON arrays,
//! counters are decimal strings.

use offerbook_core::models::Offer;
use offerbook_core::repository::{parse_counter, KvStore};
use offerbook_core::{CoreError, CoreResult};

pub async fn read_offers(store: &dyn KvStore, key: &str) -> CoreResult<Option<Vec<Offer>>> {
    match store.get(key).await? {
        Some(raw) => decode_offers(key, &raw).map(Some),
        None => Ok(None),
    }
}

pub async fn write_offers(store: &dyn KvStore, key: &str, offers: &[Offer]) -> CoreResult<()> {
    let raw = serde_json::to_string(offers).map_err(CoreError::storage)?;
    store.put(key, &raw).await
}

pub async fn read_counter(store: &dyn KvStore, key: &str) -> CoreResult<u64> {
    match store.get(key).await? {
        Some(raw) => parse_counter(key, &raw),
        None => Ok(0),
    }
}

pub fn decode_offers(key: &str, raw: &str) -> CoreResult<Vec<Offer>> {
    serde_json::from_str(raw).map_err(|e| CoreError::corrupt(key, e))
}

/// Removes offers stamped exactly `timestamp`, returning how many went.
pub fn remove_by_timestamp(
    offers: &mut Vec<Offer>,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> usize {
    let before = offers.len();
    offers.retain(|offer| offer.timestamp != timestamp);
    before - offers.len()
}
