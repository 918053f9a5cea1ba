//! Port for subscription persistence and the daily usage counter.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{Subscription, SubscriptionStatus, SubscriptionUpsert, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by subscription repository adapters.
    pub enum SubscriptionRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "subscription repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "subscription repository query failed: {message}",
    }
}

/// Port for subscription storage.
///
/// The external subscription id is unique: [`Self::upsert`] updates the
/// existing row rather than adding another one, so provider event replays
/// converge on a single record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Subscription governing access at `now`, chosen by
    /// [`Subscription::select_current`].
    async fn find_current(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError>;

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError>;

    /// Insert or update by external id; daily usage is preserved on update.
    async fn upsert(
        &self,
        subscription: &SubscriptionUpsert,
    ) -> Result<Subscription, SubscriptionRepositoryError>;

    /// Set the status by external id. Returns whether a row matched.
    async fn update_status(
        &self,
        external_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool, SubscriptionRepositoryError>;

    /// Count one use against `today`, rolling the counter over when it
    /// belongs to an earlier day. Returns `false` when `cap` is reached.
    async fn reserve_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
        cap: u32,
    ) -> Result<bool, SubscriptionRepositoryError>;

    /// Undo a reservation made for `today`.
    async fn release_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<(), SubscriptionRepositoryError>;
}
