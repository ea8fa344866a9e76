//! Credential persistence.
//!
//! [`CredentialStore`] is the seam between the auth core and whatever keeps
//! user records. Postgres backs production; the in-memory store backs tests
//! and local runs without a database.

pub mod credentials;
pub mod memory;
pub mod models;

pub use credentials::{CredentialStore, CredentialTx, PgCredentialStore};
pub use memory::MemoryCredentialStore;
pub use models::UserRecord;

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Opens the pool and brings the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
