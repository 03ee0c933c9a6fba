//! Redis tier
//!
//! Stores each value as an encoded [`Item`] envelope under `prefix + key`.
//! TTLs are enforced by Redis itself (`SETEX`), so no local expiry scan runs
//! on this tier.
//!
//! Reads never fail: connection, select and decode errors are logged and
//! reported as a miss. Writes return every error to the caller.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use crate::{
    CacheError, Item, RedisConfig, Tier, Value,
    item::now_nanos,
    pool::{ConnectionPool, RemoteConnection},
};

/// Tier backed by a Redis connection pool
pub struct RedisTier<P: ConnectionPool = ConnectionManager> {
    pool: Option<P>,
    db: i64,
    prefix: String,
    default_ttl_ms: u64,
}

impl RedisTier<ConnectionManager> {
    /// Build a tier from configuration.
    ///
    /// Without a URL the tier has no pool: reads miss and writes fail with
    /// [`CacheError::NoPool`].
    pub async fn from_config(config: &RedisConfig) -> Result<Self, CacheError> {
        let mut tier = match &config.url {
            Some(url) => {
                let client = redis::Client::open(url.as_str())?;
                Self::new(ConnectionManager::new(client).await?)
            }
            None => {
                warn!("Redis tier configured without a URL; writes will fail");
                Self::without_pool()
            }
        };
        tier.set_prefix(&config.prefix);
        tier.select(config.db);
        tier.set_default_ttl(config.default_ttl_ms);
        Ok(tier)
    }
}

impl<P: ConnectionPool> RedisTier<P> {
    pub fn new(pool: P) -> Self {
        Self {
            pool: Some(pool),
            db: 0,
            prefix: String::new(),
            default_ttl_ms: 0,
        }
    }

    /// A tier with no pool behind it
    pub fn without_pool() -> Self {
        Self {
            pool: None,
            db: 0,
            prefix: String::new(),
            default_ttl_ms: 0,
        }
    }

    /// Prefix prepended to every key (e.g., "myapp:" → "myapp:user.alice")
    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_owned();
    }

    /// Database index selected on each acquired connection
    pub fn select(&mut self, db: i64) {
        self.db = db;
    }

    /// TTL used by `set`, in milliseconds (0 = never expires)
    pub fn set_default_ttl(&mut self, ttl_ms: u64) {
        self.default_ttl_ms = ttl_ms;
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn db(&self) -> i64 {
        self.db
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl_ms
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Acquire a connection with the configured database selected
    async fn conn(&self) -> Result<P::Connection, CacheError> {
        let pool = self.pool.as_ref().ok_or(CacheError::NoPool)?;
        let mut conn = pool.acquire().await?;
        conn.select(self.db).await?;
        Ok(conn)
    }

    async fn get_item(&self, key: &str) -> Option<Item> {
        let redis_key = self.prefixed_key(key);

        let mut conn = match self.conn().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Redis connection error reading key {}: {}", redis_key, e);
                return None;
            }
        };

        let bytes = match conn.get(&redis_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss Redis for key: {}", redis_key);
                return None;
            }
            Err(e) => {
                warn!("Redis GET error for key {}: {}", redis_key, e);
                return None;
            }
        };

        match Item::decode(&bytes) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Failed to decode cached item for key {}: {}", redis_key, e);
                None
            }
        }
    }

    async fn valid_value(&self, key: &str) -> Option<Value> {
        let item = self.get_item(key).await?;
        if !item.is_valid(now_nanos()) {
            debug!("Redis item expired for key: {}", key);
            return None;
        }
        item.value
    }

    async fn store(&self, key: &str, value: Option<Value>, ttl_ms: u64) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let redis_key = self.prefixed_key(key);

        let Some(value) = value else {
            return conn.del(&redis_key).await;
        };

        let payload = Item::with_value(value, ttl_ms).encode()?;

        if ttl_ms < 1 {
            conn.set(&redis_key, payload).await
        } else {
            // SETEX rejects 0, so sub-second TTLs round up to one second
            let seconds = (ttl_ms / 1000).max(1);
            conn.set_ex(&redis_key, payload, seconds).await
        }
    }
}

#[async_trait]
impl<P: ConnectionPool> Tier for RedisTier<P> {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        self.valid_value(key).await
    }

    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.valid_value(key).await?;
        match value.to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to encode value for key {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<(), CacheError> {
        self.store(key, value, self.default_ttl_ms).await
    }

    async fn set_expire(
        &self,
        key: &str,
        value: Option<Value>,
        ttl_ms: u64,
    ) -> Result<(), CacheError> {
        self.store(key, value, ttl_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TierExt;

    fn detached() -> RedisTier<ConnectionManager> {
        RedisTier::without_pool()
    }

    #[test]
    fn test_prefixed_key() {
        let mut tier = detached();
        assert_eq!(tier.prefixed_key("user.alice"), "user.alice");

        tier.set_prefix("myapp:");
        assert_eq!(tier.prefixed_key("user.alice"), "myapp:user.alice");
        assert_eq!(tier.prefix(), "myapp:");
    }

    #[test]
    fn test_setters() {
        let mut tier = detached();
        tier.select(3);
        tier.set_default_ttl(5000);
        assert_eq!(tier.db(), 3);
        assert_eq!(tier.default_ttl(), 5000);
    }

    #[tokio::test]
    async fn test_without_pool_reads_miss() {
        let tier = detached();
        assert!(tier.get_value("k").await.is_none());
        assert!(tier.get_bytes("k").await.is_none());
        assert!(tier.get::<String>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_without_pool_writes_fail() {
        let tier = detached();
        let result = tier.set("k", Some(Value::new(1u8))).await;
        assert!(matches!(result, Err(CacheError::NoPool)));

        let result = tier.delete("k").await;
        assert!(matches!(result, Err(CacheError::NoPool)));
    }

    #[tokio::test]
    async fn test_from_config_without_url() {
        let config = RedisConfig {
            prefix: "svc:".to_owned(),
            db: 1,
            default_ttl_ms: 2000,
            ..Default::default()
        };
        let tier = RedisTier::from_config(&config).await.unwrap();
        assert_eq!(tier.prefix(), "svc:");
        assert_eq!(tier.db(), 1);
        assert_eq!(tier.default_ttl(), 2000);
        assert!(matches!(
            tier.set("k", Some(Value::new(1u8))).await,
            Err(CacheError::NoPool)
        ));
    }
}
