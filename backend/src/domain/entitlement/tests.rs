//! Unit tests for entitlement resolution and pricing.

use super::*;
use crate::domain::{SubscriptionStatus, SubscriptionTier, UserId};
use chrono::Duration;
use rstest::{fixture, rstest};
use uuid::Uuid;

fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[fixture]
fn now() -> DateTime<Utc> {
    at(2026, 5, 20, 15)
}

fn subscription(
    now: DateTime<Utc>,
    tier: SubscriptionTier,
    status: SubscriptionStatus,
    used_today: u32,
) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id: UserId::random(),
        external_subscription_id: "sub_test".into(),
        tier,
        status,
        current_period_start: now - Duration::days(3),
        current_period_end: now + Duration::days(27),
        daily_usage_count: used_today,
        daily_usage_date: Some(now.date_naive()),
        created_at: now,
    }
}

fn snapshot(free: u32, tokens: i64, subscription: Option<Subscription>) -> EntitlementSnapshot {
    EntitlementSnapshot {
        free_answers_remaining: free,
        free_answers_reset_at: at(2026, 5, 1, 0),
        token_balance: tokens,
        subscription,
    }
}

#[rstest]
fn free_answer_wins_over_everything(now: DateTime<Utc>) {
    let sub = subscription(now, SubscriptionTier::Pro, SubscriptionStatus::Active, 0);
    let decision = resolve(&snapshot(1, 1_000, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Allowed(PaymentSource::FreeAnswer)
    );
}

#[rstest]
fn tokens_are_used_before_subscription(now: DateTime<Utc>) {
    let sub = subscription(now, SubscriptionTier::Basic, SubscriptionStatus::Active, 0);
    let decision = resolve(&snapshot(0, 5, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(decision, EntitlementDecision::Allowed(PaymentSource::Tokens));
}

#[rstest]
fn balance_below_minimum_falls_through_to_subscription(now: DateTime<Utc>) {
    let sub = subscription(now, SubscriptionTier::Basic, SubscriptionStatus::Active, 29);
    let decision = resolve(&snapshot(0, 4, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Allowed(PaymentSource::Subscription)
    );
}

#[rstest]
#[case(SubscriptionTier::Basic, 30)]
#[case(SubscriptionTier::Pro, 150)]
fn exhausted_daily_quota_is_reported(
    now: DateTime<Utc>,
    #[case] tier: SubscriptionTier,
    #[case] cap: u32,
) {
    let sub = subscription(now, tier, SubscriptionStatus::Active, cap);
    let decision = resolve(&snapshot(0, 0, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Denied(DenialReason::DailyCapReached { cap })
    );
}

#[rstest]
fn yesterdays_usage_does_not_count(now: DateTime<Utc>) {
    let mut sub = subscription(now, SubscriptionTier::Basic, SubscriptionStatus::Active, 30);
    sub.daily_usage_date = Some(now.date_naive() - Duration::days(1));
    let decision = resolve(&snapshot(0, 0, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Allowed(PaymentSource::Subscription)
    );
}

#[rstest]
#[case(SubscriptionStatus::PastDue)]
#[case(SubscriptionStatus::Canceled)]
#[case(SubscriptionStatus::Unpaid)]
fn lapsed_subscription_requires_payment(now: DateTime<Utc>, #[case] status: SubscriptionStatus) {
    let sub = subscription(now, SubscriptionTier::Pro, status, 0);
    let decision = resolve(&snapshot(0, 0, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Denied(DenialReason::PaymentRequired)
    );
}

#[rstest]
fn expired_period_requires_payment(now: DateTime<Utc>) {
    let mut sub = subscription(now, SubscriptionTier::Pro, SubscriptionStatus::Active, 0);
    sub.current_period_end = now;
    let decision = resolve(&snapshot(0, 0, Some(sub)), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Denied(DenialReason::PaymentRequired)
    );
}

#[rstest]
fn nothing_left_requires_payment(now: DateTime<Utc>) {
    let decision = resolve(&snapshot(0, 0, None), &PricingPolicy::default(), now);
    assert_eq!(
        decision,
        EntitlementDecision::Denied(DenialReason::PaymentRequired)
    );
}

#[rstest]
fn zero_minimum_still_needs_a_positive_balance(now: DateTime<Utc>) {
    let pricing = PricingPolicy {
        min_balance_to_start: 0,
        ..PricingPolicy::default()
    };
    let decision = resolve(&snapshot(0, 0, None), &pricing, now);
    assert_eq!(
        decision,
        EntitlementDecision::Denied(DenialReason::PaymentRequired)
    );
}

#[rstest]
#[case(at(2026, 4, 30, 23), at(2026, 5, 1, 0), true)]
#[case(at(2026, 5, 1, 0), at(2026, 5, 31, 23), false)]
#[case(at(2025, 12, 31, 12), at(2026, 1, 1, 9), true)]
#[case(at(2026, 5, 2, 0), at(2026, 5, 2, 0), false)]
fn monthly_reset_follows_calendar_months(
    #[case] last_reset: DateTime<Utc>,
    #[case] now: DateTime<Utc>,
    #[case] expected: bool,
) {
    assert_eq!(needs_monthly_reset(last_reset, now), expected);
}

#[rstest]
fn reset_replaces_rather_than_accumulates(now: DateTime<Utc>) {
    let mut state = snapshot(2, 0, None);
    state.free_answers_reset_at = at(2026, 4, 3, 8);
    assert!(apply_monthly_reset(&mut state, now));
    assert_eq!(state.free_answers_remaining, FREE_ANSWERS_PER_MONTH);
    assert_eq!(state.free_answers_reset_at, now);

    state.free_answers_remaining = 0;
    assert!(!apply_monthly_reset(&mut state, now + Duration::days(5)));
    assert_eq!(state.free_answers_remaining, 0);
}

#[rstest]
fn month_start_is_midnight_on_the_first(now: DateTime<Utc>) {
    assert_eq!(month_start(now), at(2026, 5, 1, 0));
}

#[rstest]
#[case(0, 0, 0, 1)]
#[case(1, 0, 3, 1)]
#[case(1_000, 500, 7_500, 23)]
#[case(1_000_000, 0, 2_500_000, 7_500)]
#[case(0, 1_000_000, 10_000_000, 30_000)]
fn cost_rounds_up_and_respects_minimum(
    #[case] prompt_tokens: u64,
    #[case] completion_tokens: u64,
    #[case] provider: u64,
    #[case] tokens: i64,
) {
    let cost = cost_of(
        TokenUsage {
            prompt_tokens,
            completion_tokens,
        },
        &PricingPolicy::default(),
    );
    assert_eq!(cost.provider_micro_usd, provider);
    assert_eq!(cost.tokens, tokens);
}

#[test]
fn cost_survives_extreme_usage() {
    let cost = cost_of(
        TokenUsage {
            prompt_tokens: u64::MAX,
            completion_tokens: u64::MAX,
        },
        &PricingPolicy::default(),
    );
    assert!(cost.tokens > 0);
}

#[test]
fn payment_source_labels_are_stable() {
    assert_eq!(PaymentSource::FreeAnswer.as_str(), "free_answer");
    assert_eq!(PaymentSource::Tokens.as_str(), "tokens");
    assert_eq!(PaymentSource::Subscription.as_str(), "subscription");
}
