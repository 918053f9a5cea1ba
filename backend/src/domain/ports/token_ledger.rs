//! Driving ports for the token balance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Error, TokenPackage, TokenPurchase, UserId};

/// Spendable balances of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token_balance: i64,
    pub free_answers_remaining: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenQuery: Send + Sync {
    async fn balance(&self, user_id: &UserId) -> Result<TokenBalance, Error>;

    /// Purchases, newest first.
    async fn purchases(&self, user_id: &UserId) -> Result<Vec<TokenPurchase>, Error>;

    /// Package catalogue offered at checkout.
    fn packages(&self) -> Vec<TokenPackage>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenCommand: Send + Sync {
    /// Remove exactly `amount` tokens.
    ///
    /// # Errors
    /// `invalid_request` when `amount` is not positive; `payment_required`
    /// when the balance does not cover it.
    async fn deduct(&self, user_id: &UserId, amount: i64) -> Result<TokenBalance, Error>;
}
