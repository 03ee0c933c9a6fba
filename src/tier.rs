//! The contract every cache tier implements

use async_trait::async_trait;

use crate::{CacheError, Cacheable, Value};

/// One cache backend in a [`TieredCache`](crate::TieredCache).
///
/// Reads report `None` for anything that is not a usable value: absent,
/// expired, undecodable, or a backend failure. Only writes return errors.
/// Writing `None` deletes the key.
#[async_trait]
pub trait Tier: Send + Sync + 'static {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Stored value for `key`
    async fn get_value(&self, key: &str) -> Option<Value>;

    /// Value-only encoding of the stored value, see [`decode_value`](crate::decode_value)
    async fn get_bytes(&self, key: &str) -> Option<Vec<u8>>;

    /// Store with the tier's default TTL
    async fn set(&self, key: &str, value: Option<Value>) -> Result<(), CacheError>;

    /// Store with an explicit TTL in milliseconds (0 = never expires)
    async fn set_expire(
        &self,
        key: &str,
        value: Option<Value>,
        ttl_ms: u64,
    ) -> Result<(), CacheError>;
}

/// Typed helpers available on every [`Tier`]
#[async_trait]
pub trait TierExt: Tier {
    /// Stored value copied out as `T`; a value of any other type is a miss
    async fn get<T: Cacheable>(&self, key: &str) -> Option<T> {
        self.get_value(key).await?.downcast::<T>()
    }

    /// Delete `key` from this tier
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.set_expire(key, None, 0).await
    }
}

impl<T: Tier + ?Sized> TierExt for T {}
