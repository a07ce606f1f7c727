use async_trait::async_trait;
use offerbook_core::repository::KvStore;
use offerbook_core::{CoreError, CoreResult};
use redis::AsyncCommands;
use tracing::{debug, info};

const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisKvStore {
    client: redis::Client,
}

impl RedisKvStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Round-trips a PING so startup fails fast on a bad URL.
    pub async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CoreError::storage)?;
        info!("Redis reachable: {}", reply);
        Ok(())
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CoreError::storage)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(CoreError::storage)?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(CoreError::storage)
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(CoreError::storage)
    }

    async fn list(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", escape_glob(prefix));

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(CoreError::storage)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(prefix, count = keys.len(), "Scanned keys");
        Ok(keys)
    }

    async fn increment(&self, key: &str) -> CoreResult<u64> {
        let mut conn = self.connection().await?;
        let value: u64 = conn.incr(key, 1u64).await.map_err(CoreError::storage)?;
        Ok(value)
    }
}

/// Escapes the characters SCAN MATCH treats as glob syntax.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
