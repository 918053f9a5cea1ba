//! Driving port for purchases and provider events.

use async_trait::async_trait;

use crate::domain::{CheckoutSession, Error, SubscriptionTier, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingCommand: Send + Sync {
    /// Open a checkout for a token package.
    ///
    /// # Errors
    /// `invalid_request` for an unknown package id.
    async fn create_token_checkout(
        &self,
        user_id: &UserId,
        package_id: &str,
    ) -> Result<CheckoutSession, Error>;

    /// Open a checkout for a subscription tier.
    ///
    /// # Errors
    /// `invalid_request` when no price is configured for the tier.
    async fn create_subscription_checkout(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
    ) -> Result<CheckoutSession, Error>;

    /// Verify and apply a provider event. Replays are harmless.
    ///
    /// # Errors
    /// `invalid_request` when the signature or payload is rejected.
    async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<(), Error>;
}
