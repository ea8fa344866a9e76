use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;

use crate::db::models::UserRecord;
use crate::error::DatabaseError;

const USER_COLUMNS: &str = "id, username, email, password, login_retry, last_login";

/// Storage for user records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Opens a transaction for the lookup-then-update sequence of a sign-in.
    async fn begin(&self) -> Result<Box<dyn CredentialTx>, DatabaseError>;

    /// Finds a user whose username equals `username` or whose email equals
    /// `email`. A `None` field matches nothing.
    async fn find_by_credential(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DatabaseError>;

    /// Inserts a new user. Fails with [`DatabaseError::Duplicate`] when the
    /// username or email is taken.
    async fn save(&self, user: &UserRecord) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

/// A unit of work over user records. Dropping it without `commit` discards
/// its writes.
#[async_trait]
pub trait CredentialTx: Send {
    /// Finds and locks the user matching `credential` as username or email.
    async fn find_by_credential(&mut self, credential: &str) -> Result<Option<UserRecord>, DatabaseError>;

    /// Persists `login_retry` and `last_login`.
    async fn update_retry_state(&mut self, user: &UserRecord) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn begin(&self) -> Result<Box<dyn CredentialTx>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgCredentialTx { tx }))
    }

    async fn find_by_credential(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1"
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn save(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password, login_retry, last_login)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.login_retry)
        .bind(user.last_login)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}

pub struct PgCredentialTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CredentialTx for PgCredentialTx {
    async fn find_by_credential(&mut self, credential: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1 LIMIT 1 FOR UPDATE"
        ))
        .bind(credential)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn update_retry_state(&mut self, user: &UserRecord) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET login_retry = $1, last_login = $2 WHERE id = $3")
            .bind(user.login_retry)
            .bind(user.last_login)
            .bind(&user.id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
