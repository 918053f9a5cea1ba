//! Port for single-use password reset tokens.
//!
//! Only SHA-256 digests of tokens are stored; the clear token exists in the
//! emailed link alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by password reset token adapters.
    pub enum PasswordResetRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "reset token repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "reset token repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn store(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PasswordResetRepositoryError>;

    /// Mark an unused, unexpired token as used and return its owner.
    ///
    /// Returns `None` for unknown, used or expired tokens.
    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, PasswordResetRepositoryError>;
}
