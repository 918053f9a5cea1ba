//! Port for password hashing.

use async_trait::async_trait;

use crate::domain::PasswordHash;

use super::define_port_error;

define_port_error! {
    /// Errors raised by password hashers.
    pub enum PasswordHasherError {
        /// Hashing failed, for example because of invalid parameters.
        Hashing { message: String } => "password hashing failed: {message}",
        /// The stored hash could not be decoded.
        MalformedHash => "stored password hash is malformed",
    }
}

/// Hashing is CPU-bound; implementations should move work off the async
/// executor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// Constant-time comparison of `password` against `hash`.
    async fn verify(&self, password: &str, hash: &PasswordHash)
    -> Result<bool, PasswordHasherError>;
}
