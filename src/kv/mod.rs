//! Revocation blacklist for signed-out session tokens.
//!
//! Keys expire on their own, so a revoked token is only remembered for as
//! long as it could still have been presented.

mod memory;
mod redis_store;

pub use self::memory::MemoryRevocationStore;
pub use self::redis_store::RedisRevocationStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RevocationError;

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Stores `key` for `ttl`. A zero `ttl` is rejected.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// True while `key` is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, RevocationError>;

    async fn ping(&self) -> Result<(), RevocationError>;
}
