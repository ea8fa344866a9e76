pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod ids;
pub mod kv;
pub mod learning;
pub mod middleware;
pub mod routes;
pub mod telemetry;
pub mod ws;

use sqlx::PgPool;
use std::sync::Arc;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

use auth::{AuthService, BcryptHasher, LoginGuard, PasswordHasher, TokenService};
use clock::{Clock, SystemClock};
use db::{CredentialStore, PgCredentialStore};
use ids::NanoIdGenerator;
use kv::{RedisRevocationStore, RevocationStore};
use learning::{LearningService, LessonStore, PgLearningStore, TimeSpentStore};

/// Application state shared across all workers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    pub credentials: Arc<dyn CredentialStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub learning: Arc<LearningService>,
    db_pool: Option<Arc<PgPool>>,
}

impl AppState {
    /// Connects Postgres and Redis and wires every service on the system clock.
    pub async fn new(config: Settings) -> Result<Self> {
        let pool = Arc::new(db::connect(&config.database).await?);
        let revocations = Arc::new(RedisRevocationStore::connect(&config.kv.url).await?);
        let learning_store = Arc::new(PgLearningStore::new(pool.clone()));

        let mut state = Self::with_stores(
            config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            revocations,
            learning_store.clone(),
            learning_store,
            Arc::new(SystemClock),
        )?;
        state.db_pool = Some(pool);
        Ok(state)
    }

    /// Wires the services over caller-supplied stores and clock.
    pub fn with_stores(
        config: Settings,
        credentials: Arc<dyn CredentialStore>,
        revocations: Arc<dyn RevocationStore>,
        lessons: Arc<dyn LessonStore>,
        time_spent: Arc<dyn TimeSpentStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(config.security.bcrypt_cost));
        let tokens = Arc::new(TokenService::new(&config.security, &config.session, clock.clone())?);
        let guard = LoginGuard::new(hasher.clone(), clock.clone(), &config.security);
        let ids = Arc::new(NanoIdGenerator::new(config.security.id_length)?);

        let auth = Arc::new(AuthService::new(
            credentials.clone(),
            revocations.clone(),
            hasher,
            guard,
            tokens.clone(),
            ids,
            clock,
        ));

        Ok(Self {
            config: Arc::new(config),
            auth,
            tokens,
            credentials,
            revocations,
            learning: Arc::new(LearningService::new(lessons, time_spent)),
            db_pool: None,
        })
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
    }
}
