use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

use super::RevocationStore;
use crate::error::RevocationError;

/// Revocation store on a Redis connection manager, which reconnects on
/// its own after the server goes away.
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn connect(url: &str) -> Result<Self, RevocationError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("connected to revocation store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RevocationError> {
        let millis = ttl.as_millis();
        if millis == 0 {
            return Err(RevocationError::InvalidTtl);
        }

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(u64::try_from(millis).unwrap_or(u64::MAX))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
