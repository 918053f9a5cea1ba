//! Port for recording token purchases.

use async_trait::async_trait;

use crate::domain::{NewTokenPurchase, PurchaseOutcome, TokenPurchase, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by token purchase repository adapters.
    pub enum TokenPurchaseRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "purchase repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "purchase repository query failed: {message}",
    }
}

/// Port for the purchase ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenPurchaseRepository: Send + Sync {
    /// Record the purchase and credit the buyer in one transaction.
    ///
    /// A second call with the same external payment id changes nothing and
    /// returns [`PurchaseOutcome::AlreadyRecorded`].
    async fn record_purchase(
        &self,
        purchase: &NewTokenPurchase,
    ) -> Result<PurchaseOutcome, TokenPurchaseRepositoryError>;

    /// Purchases for the user, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TokenPurchase>, TokenPurchaseRepositoryError>;
}
