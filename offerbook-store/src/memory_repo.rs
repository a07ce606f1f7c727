use std::collections::BTreeMap;

use async_trait::async_trait;
use offerbook_core::repository::{next_counter, parse_counter, KvStore};
use offerbook_core::CoreResult;
use tokio::sync::RwLock;

/// In-process ordered map. Used for development and tests.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> CoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    // Held under the write lock for the whole read-modify-write
    async fn increment(&self, key: &str) -> CoreResult<u64> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(raw) => parse_counter(key, raw)?,
            None => 0,
        };
        let next = next_counter(key, current)?;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}
