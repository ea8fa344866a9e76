use thiserror::Error;

use crate::error::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The plaintext does not match the stored hash.
    #[error("password mismatch")]
    Mismatch,

    /// The stored hash is corrupt or the hasher itself failed.
    #[error("hasher failure: {0}")]
    Internal(String),
}

impl From<HashError> for AppError {
    fn from(err: HashError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), HashError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| HashError::Internal(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), HashError> {
        match bcrypt::verify(plaintext, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(HashError::Mismatch),
            Err(e) => Err(HashError::Internal(e.to_string())),
        }
    }
}
