//! Bounded in-memory tier
//!
//! Holds at most `max_size` items. When a new key arrives at capacity, one
//! entry is evicted: an already-expired entry if the scan finds one, otherwise
//! the oldest-inserted entry still present.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::debug;

use crate::{CacheError, Item, MemoryConfig, Tier, Value, item::now_nanos};

/// In-process tier with capacity bound and per-item TTL
pub struct MemoryTier {
    state: RwLock<State>,
    max_size: usize,
    default_ttl_ms: AtomicU64,
}

struct Entry {
    item: Item,
    /// Insertion sequence, matched against the eviction queue
    seq: u64,
}

#[derive(Default)]
struct State {
    items: HashMap<String, Entry>,
    /// Insertion order. Entries whose seq no longer matches `items` are stale
    /// (deleted or overwritten since) and are skipped when popped.
    queue: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl State {
    fn is_current(&self, key: &str, seq: u64) -> bool {
        self.items.get(key).is_some_and(|entry| entry.seq == seq)
    }

    fn evict_one(&mut self, now: i64) {
        let expired = self
            .items
            .iter()
            .find(|(_, entry)| !entry.item.is_valid(now))
            .map(|(key, _)| key.clone());
        if let Some(key) = expired {
            self.items.remove(&key);
            debug!("Evicted expired key from memory tier: {}", key);
            return;
        }

        while let Some((key, seq)) = self.queue.pop_front() {
            if self.is_current(&key, seq) {
                self.items.remove(&key);
                debug!("Evicted oldest key from memory tier: {}", key);
                return;
            }
        }
    }

    fn compact_queue(&mut self, max_size: usize) {
        if self.queue.len() <= max_size.saturating_mul(2) {
            return;
        }
        let mut queue = std::mem::take(&mut self.queue);
        queue.retain(|(key, seq)| self.is_current(key, *seq));
        self.queue = queue;
    }
}

impl MemoryTier {
    /// Create a tier holding at most `max_size` items
    pub fn new(max_size: usize) -> Result<Self, CacheError> {
        if max_size == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        Ok(Self {
            state: RwLock::new(State {
                items: HashMap::with_capacity(max_size),
                queue: VecDeque::with_capacity(max_size),
                next_seq: 0,
            }),
            max_size,
            default_ttl_ms: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &MemoryConfig) -> Result<Self, CacheError> {
        let tier = Self::new(config.max_size)?;
        tier.set_default_ttl(config.default_ttl_ms);
        Ok(tier)
    }

    /// TTL used by `set`, in milliseconds (0 = never expires)
    pub fn set_default_ttl(&self, ttl_ms: u64) {
        self.default_ttl_ms.store(ttl_ms, Ordering::Relaxed);
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl_ms.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Number of stored items, expired ones included until evicted or purged
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    /// Remove all items
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.items.clear();
        state.queue.clear();
    }

    /// Drop every expired item, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = now_nanos();
        let mut state = self.state.write();
        let before = state.items.len();
        state.items.retain(|_, entry| entry.item.is_valid(now));
        let removed = before - state.items.len();
        if removed > 0 {
            debug!("Purged {} expired keys from memory tier", removed);
        }
        state.compact_queue(self.max_size);
        removed
    }

    fn valid_value(&self, key: &str) -> Option<Value> {
        let state = self.state.read();
        let entry = state.items.get(key)?;
        if !entry.item.is_valid(now_nanos()) {
            return None;
        }
        entry.item.value.clone()
    }

    fn store(&self, key: &str, value: Option<Value>, ttl_ms: u64) {
        if key.is_empty() {
            return;
        }

        let mut state = self.state.write();

        let Some(value) = value else {
            state.items.remove(key);
            return;
        };

        if !state.items.contains_key(key) && state.items.len() >= self.max_size {
            state.evict_one(now_nanos());
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.items.insert(
            key.to_owned(),
            Entry {
                item: Item::with_value(value, ttl_ms),
                seq,
            },
        );
        state.queue.push_back((key.to_owned(), seq));
        state.compact_queue(self.max_size);
    }
}

#[async_trait]
impl Tier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        self.valid_value(key)
    }

    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.valid_value(key)?.to_bytes().ok()
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<(), CacheError> {
        self.store(key, value, self.default_ttl());
        Ok(())
    }

    async fn set_expire(
        &self,
        key: &str,
        value: Option<Value>,
        ttl_ms: u64,
    ) -> Result<(), CacheError> {
        self.store(key, value, ttl_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TierExt, decode_value};
    use serde::{Deserialize, Serialize};
    use std::{sync::Arc, time::Duration};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    fn value(s: &str) -> Option<Value> {
        Some(Value::new(s.to_owned()))
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(MemoryTier::new(0), Err(CacheError::InvalidCapacity)));
    }

    #[test]
    fn test_from_config() {
        let tier = MemoryTier::from_config(&MemoryConfig {
            max_size: 3,
            default_ttl_ms: 250,
        })
        .unwrap();
        assert_eq!(tier.capacity(), 3);
        assert_eq!(tier.default_ttl(), 250);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("key", value("value")).await.unwrap();

        assert_eq!(tier.get::<String>("key").await, Some("value".to_owned()));
        assert_eq!(tier.get::<String>("missing").await, None);
    }

    #[tokio::test]
    async fn test_get_type_mismatch_is_miss() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("key", value("value")).await.unwrap();

        assert_eq!(tier.get::<i64>("key").await, None);
        assert_eq!(tier.get::<Point>("key").await, None);
        assert!(tier.get_value("key").await.is_some());
    }

    #[tokio::test]
    async fn test_get_struct() {
        let tier = MemoryTier::new(10).unwrap();
        let point = Point { x: 1, y: -2 };
        tier.set("point", Some(Value::new(point.clone()))).await.unwrap();

        assert_eq!(tier.get::<Point>("point").await, Some(point));
    }

    #[tokio::test]
    async fn test_get_bytes() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("num", Some(Value::new(99u64))).await.unwrap();

        let bytes = tier.get_bytes("num").await.unwrap();
        assert_eq!(decode_value::<u64>(&bytes).unwrap(), 99);
        assert!(tier.get_bytes("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_key_ignored() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("", value("value")).await.unwrap();
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_set_nil_deletes() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("k", value("v")).await.unwrap();
        assert_eq!(tier.len(), 1);

        tier.set("k", None).await.unwrap();
        assert!(tier.is_empty());
        assert!(tier.get_value("k").await.is_none());

        // Deleting an absent key creates nothing
        tier.set("other", None).await.unwrap();
        assert!(tier.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set("k", value("v")).await.unwrap();
        tier.delete("k").await.unwrap();
        assert!(tier.get::<String>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_expiry() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set_expire("k", value("v"), 100).await.unwrap();
        assert_eq!(tier.get::<String>("k").await, Some("v".to_owned()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(tier.get::<String>("k").await, None);
        assert!(tier.get_bytes("k").await.is_none());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_to_set() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set_default_ttl(50);
        tier.set("k", value("v")).await.unwrap();
        assert!(tier.get_value("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(tier.get_value("k").await.is_none());
    }

    #[tokio::test]
    async fn test_fifo_eviction() {
        let tier = MemoryTier::new(3).unwrap();
        for key in ["a", "b", "c"] {
            tier.set(key, value(key)).await.unwrap();
        }
        tier.set("d", value("d")).await.unwrap();

        assert_eq!(tier.len(), 3);
        assert!(tier.get_value("a").await.is_none());
        for key in ["b", "c", "d"] {
            assert!(tier.get_value(key).await.is_some(), "{key} should survive");
        }

        tier.set("e", value("e")).await.unwrap();
        assert!(tier.get_value("b").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_first() {
        let tier = MemoryTier::new(3).unwrap();
        tier.set("a", value("a")).await.unwrap();
        tier.set("b", value("b")).await.unwrap();
        tier.set_expire("c", value("c"), 10).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        tier.set("d", value("d")).await.unwrap();

        assert_eq!(tier.len(), 3);
        assert!(tier.get_value("a").await.is_some());
        assert!(tier.get_value("b").await.is_some());
        assert!(tier.get_value("d").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_at_capacity_keeps_others() {
        let tier = MemoryTier::new(2).unwrap();
        tier.set("a", value("a1")).await.unwrap();
        tier.set("b", value("b")).await.unwrap();
        tier.set("a", value("a2")).await.unwrap();

        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get::<String>("a").await, Some("a2".to_owned()));
        assert!(tier.get_value("b").await.is_some());

        // "a" was re-inserted after "b", so "b" is now the oldest
        tier.set("c", value("c")).await.unwrap();
        assert!(tier.get_value("b").await.is_none());
        assert!(tier.get_value("a").await.is_some());
    }

    #[tokio::test]
    async fn test_deleted_key_skipped_by_eviction() {
        let tier = MemoryTier::new(2).unwrap();
        tier.set("a", value("a")).await.unwrap();
        tier.set("b", value("b")).await.unwrap();
        tier.set("a", None).await.unwrap();

        tier.set("c", value("c")).await.unwrap();
        assert_eq!(tier.len(), 2);

        // Queue head "a" is stale, so the next eviction takes "b"
        tier.set("d", value("d")).await.unwrap();
        assert!(tier.get_value("b").await.is_none());
        assert!(tier.get_value("c").await.is_some());
        assert!(tier.get_value("d").await.is_some());
    }

    #[tokio::test]
    async fn test_queue_stays_bounded() {
        let tier = MemoryTier::new(4).unwrap();
        for i in 0..1000 {
            tier.set("same", Some(Value::new(i))).await.unwrap();
        }
        assert!(tier.state.read().queue.len() <= 8);
        assert_eq!(tier.get::<i32>("same").await, Some(999));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let tier = MemoryTier::new(10).unwrap();
        tier.set_expire("short", value("v"), 10).await.unwrap();
        tier.set("long", value("v")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tier.purge_expired(), 1);
        assert_eq!(tier.len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = MemoryTier::new(10).unwrap();
        for i in 0..5 {
            tier.set(&format!("k{i}"), Some(Value::new(i))).await.unwrap();
        }
        tier.clear();
        assert!(tier.is_empty());
        assert!(tier.state.read().queue.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let tier = Arc::new(MemoryTier::new(50).unwrap());
        let mut handles = vec![];

        for batch in 0..10 {
            let tier = Arc::clone(&tier);
            handles.push(tokio::spawn(async move {
                for i in 0..20 {
                    let key = format!("batch-{batch}-{i}");
                    tier.set(&key, Some(Value::new(i))).await.unwrap();
                    let _ = tier.get::<i32>(&key).await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tier.len(), 50);
    }
}
