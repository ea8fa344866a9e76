use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::credentials::{CredentialStore, CredentialTx};
use crate::db::models::UserRecord;
use crate::error::DatabaseError;

type Users = HashMap<String, UserRecord>;

/// Process-local credential store. Transactions hold the whole table lock,
/// so concurrent sign-ins are fully serialised.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    users: Arc<Mutex<Users>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

fn matching<'a>(users: &'a Users, username: Option<&str>, email: Option<&str>) -> Option<&'a UserRecord> {
    users
        .values()
        .find(|user| username == Some(user.username.as_str()) || email == Some(user.email.as_str()))
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn begin(&self) -> Result<Box<dyn CredentialTx>, DatabaseError> {
        let guard = self.users.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryCredentialTx {
            guard,
            snapshot: Some(snapshot),
        }))
    }

    async fn find_by_credential(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let users = self.users.lock().await;
        Ok(matching(&users, username, email).cloned())
    }

    async fn save(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.id) || matching(&users, Some(user.username.as_str()), Some(user.email.as_str())).is_some() {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

struct MemoryCredentialTx {
    guard: OwnedMutexGuard<Users>,
    /// Pre-transaction state; `None` once committed.
    snapshot: Option<Users>,
}

#[async_trait]
impl CredentialTx for MemoryCredentialTx {
    async fn find_by_credential(&mut self, credential: &str) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(matching(&self.guard, Some(credential), Some(credential)).cloned())
    }

    async fn update_retry_state(&mut self, user: &UserRecord) -> Result<(), DatabaseError> {
        let stored = self.guard.get_mut(&user.id).ok_or(DatabaseError::NotFound)?;
        stored.login_retry = user.login_retry;
        stored.last_login = user.last_login;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DatabaseError> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        // Drop restores the snapshot.
        Ok(())
    }
}

impl Drop for MemoryCredentialTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}
