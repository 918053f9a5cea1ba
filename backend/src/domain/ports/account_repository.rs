//! Port for account persistence and balance mutations.
//!
//! Balance changes are expressed as conditional operations so adapters can
//! implement them as single atomic statements; callers never read a balance,
//! modify it, and write it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Account, Email, NewAccount, PasswordHash, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by account repository adapters.
    pub enum AccountRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "account repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "account repository query failed: {message}",
        /// The email is already registered to another account.
        DuplicateEmail => "email already registered",
    }
}

/// Tokens actually removed by a saturating charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCharge {
    pub charged: i64,
    pub balance: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account; fails with `DuplicateEmail` when taken.
    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountRepositoryError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, AccountRepositoryError>;

    async fn find_by_email(&self, email: &Email)
    -> Result<Option<Account>, AccountRepositoryError>;

    /// Change the login email; fails with `DuplicateEmail` when taken.
    async fn update_email(&self, id: &UserId, email: &Email)
    -> Result<(), AccountRepositoryError>;

    async fn update_password_hash(
        &self,
        id: &UserId,
        hash: &PasswordHash,
    ) -> Result<(), AccountRepositoryError>;

    /// Delete the account and everything it owns. Returns whether a row existed.
    async fn delete(&self, id: &UserId) -> Result<bool, AccountRepositoryError>;

    /// Top up free answers to `allowance` when the last reset predates
    /// `period_start`. Returns whether the reset happened.
    async fn reset_free_answers(
        &self,
        id: &UserId,
        allowance: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AccountRepositoryError>;

    /// Decrement free answers when at least one remains.
    async fn consume_free_answer(&self, id: &UserId) -> Result<bool, AccountRepositoryError>;

    /// Give back a free answer taken by [`Self::consume_free_answer`]. The
    /// count never rises above `allowance`, so a monthly reset that landed
    /// in between is not topped up.
    async fn restore_free_answer(
        &self,
        id: &UserId,
        allowance: u32,
    ) -> Result<(), AccountRepositoryError>;

    /// Subtract exactly `amount` when the balance covers it.
    ///
    /// Returns the new balance, or `None` when the balance is insufficient.
    async fn deduct_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<Option<i64>, AccountRepositoryError>;

    /// Subtract up to `amount`, stopping at zero.
    async fn charge_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<TokenCharge, AccountRepositoryError>;
}
