//! Recurring subscriptions and their per-day quota.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::UserId;

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Basic,
    Pro,
}

impl SubscriptionTier {
    /// Maximum explanations per UTC day.
    #[must_use]
    pub const fn daily_cap(self) -> u32 {
        match self {
            Self::Basic => 30,
            Self::Pro => 150,
        }
    }

    /// Stable storage and wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored or received label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for SubscriptionTier {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            other => Err(UnknownLabel {
                kind: "subscription tier",
                value: other.to_owned(),
            }),
        }
    }
}

/// Lifecycle state as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

impl SubscriptionStatus {
    /// Whether this status grants premium access (subject to the period end).
    #[must_use]
    pub const fn grants_access(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Stable storage and wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = UnknownLabel;

    /// Parse a provider status. `incomplete_expired` collapses to
    /// [`SubscriptionStatus::Incomplete`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "incomplete" | "incomplete_expired" => Ok(Self::Incomplete),
            "unpaid" => Ok(Self::Unpaid),
            other => Err(UnknownLabel {
                kind: "subscription status",
                value: other.to_owned(),
            }),
        }
    }
}

/// Stored subscription with its daily usage counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: UserId,
    pub external_subscription_id: String,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub daily_usage_count: u32,
    /// UTC day the counter belongs to; a different day means zero usage.
    pub daily_usage_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Premium access requires a granting status and an unexpired period.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Subscription, SubscriptionStatus, SubscriptionTier, UserId};
    /// use chrono::{Duration, Utc};
    ///
    /// let now = Utc::now();
    /// let sub = Subscription {
    ///     id: uuid::Uuid::new_v4(),
    ///     user_id: UserId::random(),
    ///     external_subscription_id: "sub_123".into(),
    ///     tier: SubscriptionTier::Basic,
    ///     status: SubscriptionStatus::Active,
    ///     current_period_start: now - Duration::days(1),
    ///     current_period_end: now + Duration::days(29),
    ///     daily_usage_count: 0,
    ///     daily_usage_date: None,
    ///     created_at: now,
    /// };
    /// assert!(sub.is_premium(now));
    /// assert!(!sub.is_premium(now + Duration::days(30)));
    /// ```
    #[must_use]
    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.status.grants_access() && self.current_period_end > now
    }

    /// The subscription that governs access at `now`: a premium one when the
    /// user has any, otherwise the most recently created.
    ///
    /// Status changes on a superseded subscription, such as the cancellation
    /// of the old plan after an upgrade, never displace a live one.
    pub fn select_current<I>(subscriptions: I, now: DateTime<Utc>) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        subscriptions
            .into_iter()
            .max_by_key(|sub| (sub.is_premium(now), sub.created_at))
    }

    /// Usage recorded for `today`; zero when the counter belongs to another day.
    #[must_use]
    pub fn daily_usage_for(&self, today: NaiveDate) -> u32 {
        if self.daily_usage_date == Some(today) {
            self.daily_usage_count
        } else {
            0
        }
    }

    /// Whether another explanation fits under today's cap.
    #[must_use]
    pub fn has_quota_left(&self, today: NaiveDate) -> bool {
        self.daily_usage_for(today) < self.tier.daily_cap()
    }
}

/// Insert-or-update payload keyed by the provider subscription id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpsert {
    pub user_id: UserId,
    pub external_subscription_id: String,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

/// Client view of the caller's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub is_premium: bool,
    pub daily_cap: u32,
    pub used_today: u32,
}

impl SubscriptionSummary {
    /// Project a stored subscription at `now`.
    #[must_use]
    pub fn at(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            tier: subscription.tier,
            status: subscription.status,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            is_premium: subscription.is_premium(now),
            daily_cap: subscription.tier.daily_cap(),
            used_today: subscription.daily_usage_for(now.date_naive()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn subscription(status: SubscriptionStatus, end_offset_days: i64) -> Subscription {
        let now = noon();
        Subscription {
            id: Uuid::new_v4(),
            user_id: UserId::random(),
            external_subscription_id: "sub_1".into(),
            tier: SubscriptionTier::Basic,
            status,
            current_period_start: now - Duration::days(10),
            current_period_end: now + Duration::days(end_offset_days),
            daily_usage_count: 0,
            daily_usage_date: None,
            created_at: now,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[case(SubscriptionStatus::Active, 5, true)]
    #[case(SubscriptionStatus::Trialing, 5, true)]
    #[case(SubscriptionStatus::Active, -1, false)]
    #[case(SubscriptionStatus::Active, 0, false)]
    #[case(SubscriptionStatus::PastDue, 5, false)]
    #[case(SubscriptionStatus::Canceled, 5, false)]
    #[case(SubscriptionStatus::Incomplete, 5, false)]
    #[case(SubscriptionStatus::Unpaid, 5, false)]
    fn premium_requires_status_and_period(
        #[case] status: SubscriptionStatus,
        #[case] end_offset_days: i64,
        #[case] expected: bool,
    ) {
        assert_eq!(
            subscription(status, end_offset_days).is_premium(noon()),
            expected
        );
    }

    #[test]
    fn daily_usage_is_zero_on_a_new_day() {
        let mut sub = subscription(SubscriptionStatus::Active, 5);
        let today = noon().date_naive();
        sub.daily_usage_count = 30;
        sub.daily_usage_date = Some(today);
        assert_eq!(sub.daily_usage_for(today), 30);
        assert!(!sub.has_quota_left(today));

        let tomorrow = today.succ_opt().expect("next day");
        assert_eq!(sub.daily_usage_for(tomorrow), 0);
        assert!(sub.has_quota_left(tomorrow));
    }

    fn created(status: SubscriptionStatus, minutes_ago: i64) -> Subscription {
        Subscription {
            created_at: noon() - Duration::minutes(minutes_ago),
            ..subscription(status, 5)
        }
    }

    #[test]
    fn a_live_plan_outranks_a_newer_lapsed_one() {
        let live = created(SubscriptionStatus::Active, 60);
        let lapsed = created(SubscriptionStatus::Canceled, 5);
        let picked = Subscription::select_current([lapsed, live.clone()], noon());
        assert_eq!(picked, Some(live));
    }

    #[rstest]
    #[case::both_live(SubscriptionStatus::Active, SubscriptionStatus::Active)]
    #[case::both_lapsed(SubscriptionStatus::Canceled, SubscriptionStatus::PastDue)]
    fn newest_wins_among_equals(
        #[case] older: SubscriptionStatus,
        #[case] newer: SubscriptionStatus,
    ) {
        let newer = created(newer, 5);
        let picked =
            Subscription::select_current([newer.clone(), created(older, 60)], noon());
        assert_eq!(picked, Some(newer));
    }

    #[test]
    fn no_rows_means_no_subscription() {
        assert_eq!(Subscription::select_current(Vec::new(), noon()), None);
    }

    #[rstest]
    #[case(SubscriptionTier::Basic, 30)]
    #[case(SubscriptionTier::Pro, 150)]
    fn tier_caps(#[case] tier: SubscriptionTier, #[case] cap: u32) {
        assert_eq!(tier.daily_cap(), cap);
    }

    #[rstest]
    #[case("incomplete_expired", SubscriptionStatus::Incomplete)]
    #[case("past_due", SubscriptionStatus::PastDue)]
    fn parses_provider_statuses(#[case] raw: &str, #[case] expected: SubscriptionStatus) {
        assert_eq!(raw.parse::<SubscriptionStatus>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_tier() {
        assert!("enterprise".parse::<SubscriptionTier>().is_err());
    }
}
