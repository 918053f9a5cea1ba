//! Error mapping and account helpers shared by the domain services.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::ports::{
    AccountRepository, AccountRepositoryError, PasswordResetRepositoryError,
    SavedAnswerRepositoryError, SubscriptionRepositoryError, TokenPurchaseRepositoryError,
};
use crate::domain::{
    Account, Error, FREE_ANSWERS_PER_MONTH, UserId, month_start, needs_monthly_reset,
};

pub(crate) fn map_account_error(error: AccountRepositoryError) -> Error {
    match error {
        AccountRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("account repository unavailable: {message}"))
        }
        AccountRepositoryError::Query { message } => {
            Error::internal(format!("account repository error: {message}"))
        }
        AccountRepositoryError::DuplicateEmail => Error::conflict("email already registered"),
    }
}

pub(crate) fn map_subscription_error(error: SubscriptionRepositoryError) -> Error {
    match error {
        SubscriptionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("subscription repository unavailable: {message}"))
        }
        SubscriptionRepositoryError::Query { message } => {
            Error::internal(format!("subscription repository error: {message}"))
        }
    }
}

pub(crate) fn map_purchase_error(error: TokenPurchaseRepositoryError) -> Error {
    match error {
        TokenPurchaseRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("purchase repository unavailable: {message}"))
        }
        TokenPurchaseRepositoryError::Query { message } => {
            Error::internal(format!("purchase repository error: {message}"))
        }
    }
}

pub(crate) fn map_saved_answer_error(error: SavedAnswerRepositoryError) -> Error {
    match error {
        SavedAnswerRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("saved answer repository unavailable: {message}"))
        }
        SavedAnswerRepositoryError::Query { message } => {
            Error::internal(format!("saved answer repository error: {message}"))
        }
    }
}

pub(crate) fn map_reset_error(error: PasswordResetRepositoryError) -> Error {
    match error {
        PasswordResetRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("reset token repository unavailable: {message}"))
        }
        PasswordResetRepositoryError::Query { message } => {
            Error::internal(format!("reset token repository error: {message}"))
        }
    }
}

/// Error returned when a session refers to an account that no longer exists.
pub(crate) fn missing_account() -> Error {
    Error::unauthorized("account no longer exists")
}

pub(crate) async fn load_account<A>(accounts: &A, user_id: &UserId) -> Result<Account, Error>
where
    A: AccountRepository + ?Sized,
{
    accounts
        .find_by_id(user_id)
        .await
        .map_err(map_account_error)?
        .ok_or_else(missing_account)
}

/// Apply the monthly free-answer top-up when due and return the fresh row.
///
/// The repository only resets rows whose last reset predates the current
/// month, so concurrent callers top up at most once.
pub(crate) async fn refresh_monthly_allowance<A>(
    accounts: &A,
    account: Account,
    now: DateTime<Utc>,
) -> Result<Account, Error>
where
    A: AccountRepository + ?Sized,
{
    if !needs_monthly_reset(account.free_answers_reset_at, now) {
        return Ok(account);
    }
    let applied = accounts
        .reset_free_answers(&account.id, FREE_ANSWERS_PER_MONTH, month_start(now), now)
        .await
        .map_err(map_account_error)?;
    debug!(user_id = %account.id, applied, "monthly free answers reset");
    load_account(accounts, &account.id).await
}
