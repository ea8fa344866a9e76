use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::RevocationStore;
use crate::clock::Clock;
use crate::error::RevocationError;

/// In-process revocation store keyed by token, holding only the deadline.
/// Expiry follows the injected clock, and stale entries are swept on every
/// write.
#[derive(Clone)]
pub struct MemoryRevocationStore {
    entries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn set_with_expiry(&self, key: &str, _value: &str, ttl: Duration) -> Result<(), RevocationError> {
        if ttl.is_zero() {
            return Err(RevocationError::InvalidTtl);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| RevocationError::InvalidTtl)?;
        let now = self.clock.now();

        let mut entries = self.entries.write().await;
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(key.to_string(), now + ttl);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|expires_at| *expires_at > now))
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        Ok(())
    }
}
