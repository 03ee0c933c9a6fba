//! Connection pool abstraction for the Redis tier
//!
//! The tier only needs `SELECT`, `GET`, `SET`, `SETEX` and `DEL`. Connections
//! are acquired per operation and released when dropped.

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager, MultiplexedConnection};

use crate::CacheError;

/// A connection able to run the commands the Redis tier issues
#[async_trait]
pub trait RemoteConnection: Send {
    /// `SELECT db`, failing with [`CacheError::Select`]
    async fn select(&mut self, db: i64) -> Result<(), CacheError>;

    /// `GET key`
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// `SET key payload`
    async fn set(&mut self, key: &str, payload: Vec<u8>) -> Result<(), CacheError>;

    /// `SETEX key seconds payload`
    async fn set_ex(
        &mut self,
        key: &str,
        payload: Vec<u8>,
        seconds: u64,
    ) -> Result<(), CacheError>;

    /// `DEL key`
    async fn del(&mut self, key: &str) -> Result<(), CacheError>;
}

/// Source of connections shared by every call on a tier
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: RemoteConnection;

    async fn acquire(&self) -> Result<Self::Connection, CacheError>;
}

/// Any async `redis` connection (multiplexed, managed, cluster) can serve the tier.
#[async_trait]
impl<C> RemoteConnection for C
where
    C: ConnectionLike + Send,
{
    async fn select(&mut self, db: i64) -> Result<(), CacheError> {
        redis::cmd("SELECT")
            .arg(db)
            .query_async::<()>(self)
            .await
            .map_err(|source| CacheError::Select { db, source })
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(redis::cmd("GET").arg(key).query_async(self).await?)
    }

    async fn set(&mut self, key: &str, payload: Vec<u8>) -> Result<(), CacheError> {
        Ok(redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .query_async::<()>(self)
            .await?)
    }

    async fn set_ex(
        &mut self,
        key: &str,
        payload: Vec<u8>,
        seconds: u64,
    ) -> Result<(), CacheError> {
        Ok(redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(payload)
            .query_async::<()>(self)
            .await?)
    }

    async fn del(&mut self, key: &str) -> Result<(), CacheError> {
        Ok(redis::cmd("DEL").arg(key).query_async::<()>(self).await?)
    }
}

/// Opens a multiplexed connection per acquisition.
#[async_trait]
impl ConnectionPool for redis::Client {
    type Connection = MultiplexedConnection;

    async fn acquire(&self) -> Result<Self::Connection, CacheError> {
        Ok(self.get_multiplexed_async_connection().await?)
    }
}

/// Hands out clones of one managed, auto-reconnecting connection.
///
/// Clones share the underlying socket, so every tier using the same manager
/// should select the same database.
#[async_trait]
impl ConnectionPool for ConnectionManager {
    type Connection = ConnectionManager;

    async fn acquire(&self) -> Result<Self::Connection, CacheError> {
        Ok(self.clone())
    }
}
