//! Read-side subscription service.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;

use crate::domain::ports::{SubscriptionQuery, SubscriptionRepository};
use crate::domain::service_support::map_subscription_error;
use crate::domain::{Error, SubscriptionSummary, UserId};

/// Subscription service implementing [`SubscriptionQuery`].
#[derive(Clone)]
pub struct SubscriptionService<S> {
    subscriptions: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> SubscriptionService<S> {
    /// Create a new service over the subscription repository.
    pub fn new(subscriptions: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscriptions,
            clock,
        }
    }
}

#[async_trait]
impl<S> SubscriptionQuery for SubscriptionService<S>
where
    S: SubscriptionRepository,
{
    async fn current(&self, user_id: &UserId) -> Result<Option<SubscriptionSummary>, Error> {
        let now = self.clock.utc();
        Ok(self
            .subscriptions
            .find_current(user_id, now)
            .await
            .map_err(map_subscription_error)?
            .map(|subscription| SubscriptionSummary::at(&subscription, now)))
    }

    async fn is_premium(&self, user_id: &UserId) -> Result<bool, Error> {
        Ok(self
            .current(user_id)
            .await?
            .is_some_and(|summary| summary.is_premium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockSubscriptionRepository, SubscriptionRepositoryError};
    use crate::domain::{ErrorCode, Subscription, SubscriptionStatus, SubscriptionTier};
    use crate::test_support::MutableClock;
    use chrono::{Duration, Utc};
    use rstest::rstest;

    fn stored(status: SubscriptionStatus, period_end_in_days: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: uuid::Uuid::new_v4(),
            user_id: UserId::random(),
            external_subscription_id: "sub_1".into(),
            tier: SubscriptionTier::Pro,
            status,
            current_period_start: now - Duration::days(1),
            current_period_end: now + Duration::days(period_end_in_days),
            daily_usage_count: 0,
            daily_usage_date: None,
            created_at: now,
        }
    }

    fn service(repo: MockSubscriptionRepository) -> SubscriptionService<MockSubscriptionRepository> {
        SubscriptionService::new(Arc::new(repo), Arc::new(MutableClock::new(Utc::now())))
    }

    #[rstest]
    #[case::active(Some(stored(SubscriptionStatus::Active, 10)), true)]
    #[case::trialing(Some(stored(SubscriptionStatus::Trialing, 10)), true)]
    #[case::past_due(Some(stored(SubscriptionStatus::PastDue, 10)), false)]
    #[case::expired(Some(stored(SubscriptionStatus::Active, -1)), false)]
    #[case::none(None, false)]
    #[tokio::test]
    async fn premium_requires_granting_status_and_open_period(
        #[case] subscription: Option<Subscription>,
        #[case] expected: bool,
    ) {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_current()
            .return_once(move |_, _| Ok(subscription));

        let premium = service(repo)
            .is_premium(&UserId::random())
            .await
            .expect("query succeeds");

        assert_eq!(premium, expected);
    }

    #[tokio::test]
    async fn connection_errors_surface_as_service_unavailable() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_current()
            .return_once(|_, _| Err(SubscriptionRepositoryError::connection("pool exhausted")));

        let error = service(repo)
            .current(&UserId::random())
            .await
            .expect_err("unavailable");

        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }
}
