use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account together with its login-attempt bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    #[sqlx(rename = "password")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Consecutive failed sign-ins, kept within `[0, max_login_attempts]`.
    pub login_retry: i32,
    /// Unix seconds of the most recent sign-in attempt.
    pub last_login: i64,
}

impl UserRecord {
    pub fn new(id: String, username: String, email: String, password_hash: String, now: i64) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            login_retry: 0,
            last_login: now,
        }
    }
}
