//! Driving port for reading subscription state.

use async_trait::async_trait;

use crate::domain::{Error, SubscriptionSummary, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionQuery: Send + Sync {
    /// Latest subscription, if the user ever had one.
    async fn current(&self, user_id: &UserId) -> Result<Option<SubscriptionSummary>, Error>;

    /// Whether the user currently has premium access.
    async fn is_premium(&self, user_id: &UserId) -> Result<bool, Error>;
}
