//! Cache configuration
//!
//! ```
//! use std::time::Duration;
//! use tiercache::{CacheConfig, MemoryConfig};
//!
//! let config = CacheConfig {
//!     read_timeout_ms: 50,
//!     memory: Some(MemoryConfig {
//!         max_size: 10_000,
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! assert_eq!(config.read_timeout(), Duration::from_millis(50));
//! assert_eq!(config.write_timeout(), Duration::from_secs(3600));
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the tiered cache
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Deadline for a whole read across all tiers, in milliseconds (0 = none)
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Deadline for a whole write across all tiers, in milliseconds (0 = none)
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
    /// In-process tier, consulted first when present
    #[serde(default)]
    pub memory: Option<MemoryConfig>,
    /// Redis tier, consulted after the memory tier when present
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

/// Configuration for the bounded in-memory tier
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of entries held
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// TTL applied by `set`, in milliseconds (0 = never expires)
    #[serde(default)]
    pub default_ttl_ms: u64,
}

/// Configuration for the Redis tier
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection string (e.g., "redis://localhost:6379").
    /// Without one the tier has no pool and every write fails.
    #[serde(default)]
    pub url: Option<String>,
    /// Prepended to every key
    #[serde(default)]
    pub prefix: String,
    /// Database index selected before each command
    #[serde(default)]
    pub db: i64,
    /// TTL applied by `set`, in milliseconds (0 = never expires)
    #[serde(default)]
    pub default_ttl_ms: u64,
}

fn default_timeout_ms() -> u64 { 60 * 60 * 1000 } // 1 hour
fn default_max_size() -> usize { 1000 }

impl CacheConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            memory: None,
            redis: None,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            default_ttl_ms: 0,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            prefix: String::new(),
            db: 0,
            default_ttl_ms: 0,
        }
    }
}
