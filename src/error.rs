//! Cache error types

use redis::RedisError;

/// Cache-related errors
///
/// Only tier writes surface these. Read paths degrade every failure to a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis pool is not configured")]
    NoPool,

    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Failed to select Redis database {db}: {source}")]
    Select {
        db: i64,
        #[source]
        source: RedisError,
    },

    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Memory tier capacity must be greater than zero")]
    InvalidCapacity,

    #[error("Backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}
