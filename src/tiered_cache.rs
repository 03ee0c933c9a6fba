//! Tiered cache facade
//!
//! This module provides the read-through/write-through strategy over an
//! ordered list of tiers:
//! - Reads probe tiers in order and stop at the first hit
//! - Writes go to every tier, in order, even when one of them fails
//! - Every call is bounded by a read or write deadline
//!
//! The deadline bounds how long the caller waits, not the work itself. Each
//! call runs its tier walk on a spawned task; when the deadline passes first
//! the caller gets a miss (reads) or simply returns (writes) while the task
//! keeps running and may still update tiers afterwards.

use parking_lot::RwLock;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::{
    CacheConfig, CacheError, Cacheable, MemoryTier, RedisTier, Tier, TierExt, Value,
};

/// Ordered set of cache tiers behind one API.
///
/// Methods spawn onto the current tokio runtime and must be called from
/// within one. Clones share tiers and settings.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<TieredCacheInner>,
}

struct TieredCacheInner {
    /// Read priority order. Calls work on a snapshot taken when they start.
    tiers: RwLock<Vec<Arc<dyn Tier>>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl TieredCache {
    /// Create a cache with no tiers and the configured deadlines
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(TieredCacheInner {
                tiers: RwLock::new(Vec::new()),
                read_timeout: config.read_timeout(),
                write_timeout: config.write_timeout(),
            }),
        }
    }

    /// Create a cache with the memory and Redis tiers the config describes,
    /// memory first
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache = Self::new(config);

        if let Some(memory) = &config.memory {
            let tier: Arc<dyn Tier> = Arc::new(MemoryTier::from_config(memory)?);
            cache.add_tier(Some(tier));
        }
        if let Some(redis) = &config.redis {
            let tier: Arc<dyn Tier> = Arc::new(RedisTier::from_config(redis).await?);
            cache.add_tier(Some(tier));
        }

        debug!("Tiered cache built with {} tiers", cache.tier_count());
        Ok(cache)
    }

    /// Append a tier, builder style
    pub fn with_tier(self, tier: Arc<dyn Tier>) -> Self {
        self.add_tier(Some(tier));
        self
    }

    /// Replace the tier list
    pub fn set_tiers(&self, tiers: Vec<Arc<dyn Tier>>) {
        *self.inner.tiers.write() = tiers;
    }

    /// Append a tier with the lowest priority. `None` is ignored.
    pub fn add_tier(&self, tier: Option<Arc<dyn Tier>>) {
        if let Some(tier) = tier {
            self.inner.tiers.write().push(tier);
        }
    }

    pub fn tier_count(&self) -> usize {
        self.inner.tiers.read().len()
    }

    pub fn read_timeout(&self) -> Duration {
        self.inner.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.inner.write_timeout
    }

    /// Get the value for `key` as `T` from the first tier holding one.
    /// A tier holding a value of another type counts as a miss there.
    pub async fn get<T: Cacheable>(&self, key: &str) -> Option<T> {
        self.read(key, |tier, key| async move { tier.get::<T>(&key).await })
            .await
    }

    /// Get the stored value for `key` from the first tier holding one
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.read(key, |tier, key| async move { tier.get_value(&key).await })
            .await
    }

    /// Get the value-only encoding for `key` from the first tier holding one
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.read(key, |tier, key| async move { tier.get_bytes(&key).await })
            .await
    }

    /// Store `value` in every tier with each tier's default TTL
    pub async fn set<T: Cacheable>(&self, key: &str, value: T) {
        self.write(key, Some(Value::new(value)), None).await
    }

    /// Store `value` in every tier, expiring after `ttl_ms` milliseconds
    pub async fn set_expire<T: Cacheable>(&self, key: &str, value: T, ttl_ms: u64) {
        self.write(key, Some(Value::new(value)), Some(ttl_ms)).await
    }

    /// Store an already wrapped value; `None` deletes the key everywhere
    pub async fn set_value(&self, key: &str, value: Option<Value>) {
        self.write(key, value, None).await
    }

    /// Delete `key` from every tier
    pub async fn delete(&self, key: &str) {
        self.write(key, None, None).await
    }

    fn snapshot(&self) -> Vec<Arc<dyn Tier>> {
        self.inner.tiers.read().clone()
    }

    async fn read<R, F, Fut>(&self, key: &str, probe: F) -> Option<R>
    where
        R: Send + 'static,
        F: Fn(Arc<dyn Tier>, String) -> Fut + Send + 'static,
        Fut: Future<Output = Option<R>> + Send + 'static,
    {
        let tiers = self.snapshot();
        let owned_key = key.to_owned();

        let task = tokio::spawn(async move {
            for tier in tiers {
                let name = tier.name();
                if let Some(found) = probe(tier, owned_key.clone()).await {
                    debug!("Cache hit {} for key: {}", name, owned_key);
                    return Some(found);
                }
                debug!("Cache miss {} for key: {}", name, owned_key);
            }
            None
        });

        self.within(self.inner.read_timeout, "read", key, task)
            .await
            .flatten()
    }

    async fn write(&self, key: &str, value: Option<Value>, ttl_ms: Option<u64>) {
        let tiers = self.snapshot();
        let owned_key = key.to_owned();

        let task = tokio::spawn(async move {
            for tier in tiers {
                let result = match ttl_ms {
                    Some(ttl_ms) => tier.set_expire(&owned_key, value.clone(), ttl_ms).await,
                    None => tier.set(&owned_key, value.clone()).await,
                };
                if let Err(e) = result {
                    warn!(
                        "{} tier write failed for key {}: {}. Continuing.",
                        tier.name(),
                        owned_key,
                        e
                    );
                }
            }
        });

        self.within(self.inner.write_timeout, "write", key, task)
            .await;
    }

    /// Wait for `task` up to `deadline`. A zero deadline waits indefinitely.
    /// The task is detached, not aborted, when the deadline passes.
    async fn within<R>(
        &self,
        deadline: Duration,
        op: &str,
        key: &str,
        task: JoinHandle<R>,
    ) -> Option<R> {
        let joined = if deadline.is_zero() {
            task.await
        } else {
            match tokio::time::timeout(deadline, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    debug!("Cache {} timed out after {:?} for key: {}", op, deadline, key);
                    return None;
                }
            }
        };

        match joined {
            Ok(result) => Some(result),
            Err(e) => {
                error!("Cache {} task failed for key {}: {}", op, key, e);
                None
            }
        }
    }
}
