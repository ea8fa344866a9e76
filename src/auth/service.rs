use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::guard::{LoginGuard, LoginVerdict};
use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenService;
use crate::clock::Clock;
use crate::db::{CredentialStore, CredentialTx, UserRecord};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::ids::IdGenerator;
use crate::kv::RevocationStore;

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    revocations: Arc<dyn RevocationStore>,
    hasher: Arc<dyn PasswordHasher>,
    guard: LoginGuard,
    tokens: Arc<TokenService>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        revocations: Arc<dyn RevocationStore>,
        hasher: Arc<dyn PasswordHasher>,
        guard: LoginGuard,
        tokens: Arc<TokenService>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            revocations,
            hasher,
            guard,
            tokens,
            ids,
            clock,
        }
    }

    /// Verifies `credential` (username or email) and `password` and returns
    /// the user with a freshly signed session token.
    ///
    /// The lookup and the retry-counter update share one transaction, which
    /// is committed for every decided attempt so lockout state survives
    /// concurrent failures.
    pub async fn sign_in(&self, credential: &str, password: &str) -> Result<(UserRecord, String), AppError> {
        let mut tx = self.credentials.begin().await?;

        let outcome = self.attempt(tx.as_mut(), credential, password).await;
        let user = match outcome {
            Ok(user) => {
                tx.commit().await?;
                user
            }
            Err(AppError::AuthError(e)) => {
                tx.commit().await?;
                return Err(e.into());
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back sign-in");
                }
                return Err(e);
            }
        };

        let token = self.tokens.issue(&user)?;
        info!(user_id = %user.id, "user signed in");
        Ok((user, token))
    }

    async fn attempt(
        &self,
        tx: &mut dyn CredentialTx,
        credential: &str,
        password: &str,
    ) -> Result<UserRecord, AppError> {
        let Some(mut user) = tx.find_by_credential(credential).await? else {
            self.guard.check_unknown(password).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        match self.guard.check(&mut user, password).await? {
            LoginVerdict::LockedOut => Err(AuthError::TooManyAttempts.into()),
            LoginVerdict::Rejected => {
                tx.update_retry_state(&user).await?;
                Err(AuthError::InvalidCredentials.into())
            }
            LoginVerdict::Accepted => {
                tx.update_retry_state(&user).await?;
                Ok(user)
            }
        }
    }

    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<UserRecord, AppError> {
        if self
            .credentials
            .find_by_credential(Some(username), Some(email))
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateUser.into());
        }

        let hasher = self.hasher.clone();
        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AppError::InternalError(format!("password hashing task failed: {}", e)))??;

        let user = UserRecord::new(
            self.ids.generate(),
            username.to_string(),
            email.to_string(),
            password_hash,
            self.clock.timestamp(),
        );

        match self.credentials.save(&user).await {
            Ok(()) => {
                info!(user_id = %user.id, "user signed up");
                Ok(user)
            }
            Err(DatabaseError::Duplicate) => Err(AuthError::DuplicateUser.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// True when either field is already registered. Empty fields never match.
    pub async fn exists(&self, username: Option<&str>, email: Option<&str>) -> Result<bool, AppError> {
        let username = username.filter(|s| !s.is_empty());
        let email = email.filter(|s| !s.is_empty());
        if username.is_none() && email.is_none() {
            return Ok(false);
        }

        Ok(self.credentials.find_by_credential(username, email).await?.is_some())
    }

    /// Blacklists `token` for the rest of its lifetime. Returns whether an
    /// entry was written; an already expired token has nothing left to
    /// revoke.
    pub async fn sign_out(&self, token: &str) -> Result<bool, AppError> {
        let claims = self
            .tokens
            .validate(token)
            .map_err(|_| AuthError::Forbidden)?;

        let remaining = self.tokens.time_remaining(&claims);
        if remaining.is_zero() {
            return Ok(false);
        }

        self.revocations.set_with_expiry(token, "", remaining).await?;
        info!(user_id = %claims.subject_id, "user signed out");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{BcryptHasher, HashError, MockPasswordHasher};
    use crate::clock::ManualClock;
    use crate::config::Settings;
    use crate::db::MemoryCredentialStore;
    use crate::ids::NanoIdGenerator;
    use crate::kv::MemoryRevocationStore;
    use chrono::Duration;

    struct Fixture {
        service: AuthService,
        credentials: MemoryCredentialStore,
        revocations: MemoryRevocationStore,
        tokens: Arc<TokenService>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(hasher: Arc<dyn PasswordHasher>) -> Fixture {
        let settings = Settings::new_for_test().unwrap();
        let clock = Arc::new(ManualClock::default());
        let credentials = MemoryCredentialStore::new();
        let revocations = MemoryRevocationStore::new(clock.clone());
        let tokens = Arc::new(
            TokenService::new(&settings.security, &settings.session, clock.clone()).unwrap(),
        );
        let guard = LoginGuard::new(hasher.clone(), clock.clone(), &settings.security);
        let service = AuthService::new(
            Arc::new(credentials.clone()),
            Arc::new(revocations.clone()),
            hasher,
            guard,
            tokens.clone(),
            Arc::new(NanoIdGenerator::new(settings.security.id_length).unwrap()),
            clock.clone(),
        );

        Fixture {
            service,
            credentials,
            revocations,
            tokens,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(BcryptHasher::new(4)))
    }

    #[tokio::test]
    async fn test_sign_up_stores_hashed_password() {
        let f = fixture();
        let user = f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        let stored = f.credentials.get(&user.id).await.unwrap();
        assert_ne!(stored.password_hash, "secret1");
        assert_eq!(stored.login_retry, 0);
        assert_eq!(stored.last_login, f.clock.timestamp());
        assert_eq!(stored.id.len(), 24);
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        let err = f.service.sign_up("alice02", "a@x.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::DuplicateUser)));
    }

    #[tokio::test]
    async fn test_sign_in_by_username_or_email() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        let (user, token) = f.service.sign_in("alice01", "secret1").await.unwrap();
        let claims = f.tokens.validate(&token).unwrap();
        assert_eq!(claims.subject_id, user.id);
        assert_eq!(claims.display_name, "alice01");
        assert_eq!(claims.expires_at, f.clock.timestamp() + 1800);

        assert!(f.service.sign_in("a@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        let unknown = f.service.sign_in("nobody1", "secret1").await.unwrap_err();
        let wrong = f.service.sign_in("alice01", "secret2").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_unknown_user_runs_one_verification() {
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().times(1).returning(|_| Ok("decoy-hash".into()));
        hasher
            .expect_verify()
            .times(1)
            .returning(|_, _| Err(HashError::Mismatch));
        let f = fixture_with(Arc::new(hasher));

        let err = f.service.sign_in("nobody1", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_lockout_persists_across_attempts() {
        let f = fixture();
        let user = f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        for _ in 0..3 {
            let err = f.service.sign_in("alice01", "wrong1").await.unwrap_err();
            assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
        }
        assert_eq!(f.credentials.get(&user.id).await.unwrap().login_retry, 3);

        let err = f.service.sign_in("alice01", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::TooManyAttempts)));

        f.clock.advance(Duration::seconds(3600));
        assert!(f.service.sign_in("alice01", "secret1").await.is_ok());
        assert_eq!(f.credentials.get(&user.id).await.unwrap().login_retry, 0);
    }

    #[tokio::test]
    async fn test_hasher_failure_rolls_back() {
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().returning(|_| Ok("stored-hash".into()));
        hasher
            .expect_verify()
            .returning(|_, _| Err(HashError::Internal("corrupt".into())));
        let f = fixture_with(Arc::new(hasher));
        let user = f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        let err = f.service.sign_in("alice01", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
        assert_eq!(f.credentials.get(&user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_exists() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();

        assert!(f.service.exists(Some("alice01"), None).await.unwrap());
        assert!(f.service.exists(None, Some("a@x.com")).await.unwrap());
        assert!(!f.service.exists(Some("bobby01"), Some("b@x.com")).await.unwrap());
        assert!(!f.service.exists(Some(""), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_for_remaining_lifetime() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();
        let (_, token) = f.service.sign_in("alice01", "secret1").await.unwrap();

        assert!(f.service.sign_out(&token).await.unwrap());
        assert!(f.revocations.exists(&token).await.unwrap());
        assert!(f.service.sign_out(&token).await.unwrap());

        f.clock.advance(Duration::seconds(1800));
        assert!(!f.revocations.exists(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_expired_token_writes_nothing() {
        let f = fixture();
        f.service.sign_up("alice01", "a@x.com", "secret1").await.unwrap();
        let (_, token) = f.service.sign_in("alice01", "secret1").await.unwrap();

        f.clock.advance(Duration::hours(1));
        assert!(!f.service.sign_out(&token).await.unwrap());
        assert_eq!(f.revocations.len().await, 0);
    }

    #[tokio::test]
    async fn test_sign_out_invalid_token_forbidden() {
        let f = fixture();
        let err = f.service.sign_out("garbage").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::Forbidden)));
        assert_eq!(f.revocations.len().await, 0);
    }
}
