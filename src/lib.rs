//! tiercache - Layered caching library
//!
//! This library provides a read-through/write-through cache over an ordered
//! list of tiers:
//! - A bounded in-memory tier with per-item TTL (fastest)
//! - A Redis tier reached through a connection pool (shared across instances)
//! - Any other backend implementing [`Tier`]
//!
//! The cache supports:
//! - Fallback reads: the first tier holding a value wins
//! - Fan-out writes: every tier receives every write
//! - Read and write deadlines that bound the caller's wait
//! - Typed values with exact type checks on the way out
//!
//! ```no_run
//! use tiercache::{CacheConfig, MemoryConfig, RedisConfig, TieredCache};
//!
//! # async fn example() -> Result<(), tiercache::CacheError> {
//! let config = CacheConfig {
//!     read_timeout_ms: 100,
//!     memory: Some(MemoryConfig::default()),
//!     redis: Some(RedisConfig {
//!         url: Some("redis://localhost:6379".into()),
//!         prefix: "myapp:".into(),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! let cache = TieredCache::from_config(&config).await?;
//!
//! cache.set_expire("greeting", "hello".to_owned(), 60_000).await;
//! let greeting: Option<String> = cache.get("greeting").await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod item;
pub mod memory;
pub mod pool;
pub mod redis_tier;
mod tier;
mod tiered_cache;
mod value;

pub use config::{CacheConfig, MemoryConfig, RedisConfig};
pub use error::CacheError;
pub use item::{Item, NEVER_EXPIRES};
pub use memory::MemoryTier;
pub use redis_tier::RedisTier;
pub use tier::{Tier, TierExt};
pub use tiered_cache::TieredCache;
pub use value::{Cacheable, Value, decode_value, encode_value};

// Re-export async_trait for implementing custom tiers
pub use async_trait::async_trait;
