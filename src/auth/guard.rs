use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::auth::password::{HashError, PasswordHasher};
use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::db::UserRecord;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginVerdict {
    Accepted,
    Rejected,
    LockedOut,
}

/// Bounded-retry lockout over the counters stored on each user.
///
/// The guard only mutates the record it is handed. Persisting the result is
/// the caller's job, inside the same transaction that loaded the record.
pub struct LoginGuard {
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    max_attempts: i32,
    retry_timeout_secs: i64,
    decoy_hash: OnceCell<String>,
}

const DECOY_PASSWORD: &str = "decoy-password-never-issued";

impl LoginGuard {
    pub fn new(hasher: Arc<dyn PasswordHasher>, clock: Arc<dyn Clock>, config: &SecurityConfig) -> Self {
        Self {
            hasher,
            clock,
            max_attempts: config.max_login_attempts,
            retry_timeout_secs: config.retry_timeout_secs,
            decoy_hash: OnceCell::new(),
        }
    }

    pub fn is_locked_out(&self, user: &UserRecord, now: i64) -> bool {
        user.login_retry >= self.max_attempts && now - user.last_login < self.retry_timeout_secs
    }

    /// Decides one sign-in attempt and updates `login_retry` and `last_login`
    /// on `Accepted` and `Rejected`. A locked-out attempt never reaches the
    /// hasher and leaves the record untouched.
    pub async fn check(&self, user: &mut UserRecord, password: &str) -> Result<LoginVerdict, AppError> {
        let now = self.clock.timestamp();
        if self.is_locked_out(user, now) {
            warn!(user_id = %user.id, retry = user.login_retry, "sign-in rejected while locked out");
            return Ok(LoginVerdict::LockedOut);
        }

        match self.verify(user.password_hash.clone(), password).await? {
            Ok(()) => {
                user.login_retry = 0;
                user.last_login = now;
                Ok(LoginVerdict::Accepted)
            }
            Err(HashError::Mismatch) => {
                user.login_retry = if user.login_retry >= self.max_attempts {
                    1
                } else {
                    user.login_retry + 1
                };
                user.last_login = now;
                debug!(user_id = %user.id, retry = user.login_retry, "password mismatch");
                Ok(LoginVerdict::Rejected)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Spends one verification on a decoy hash so a sign-in for an unknown
    /// user costs as much as one with a wrong password. The decoy is hashed
    /// once, at the configured cost, on first use.
    pub async fn check_unknown(&self, password: &str) -> Result<(), AppError> {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| async {
                let hasher = self.hasher.clone();
                tokio::task::spawn_blocking(move || hasher.hash(DECOY_PASSWORD))
                    .await
                    .map_err(|e| AppError::InternalError(format!("password hashing task failed: {}", e)))?
                    .map_err(AppError::from)
            })
            .await?;

        let _ = self.verify(decoy.clone(), password).await?;
        Ok(())
    }

    async fn verify(&self, hash: String, password: &str) -> Result<Result<(), HashError>, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AppError::InternalError(format!("password verification task failed: {}", e)))
    }
}
