//! Entitlement rules: who may request an explanation, and what it costs.
//!
//! Everything here is pure. Services load an [`EntitlementSnapshot`], ask
//! [`resolve`] for a decision, then reserve the chosen source atomically
//! through the repositories; the rules are evaluated again by the storage
//! layer's conditional updates so concurrent requests cannot overspend.
//!
//! Resolution order is fixed: a free answer first, then prepaid tokens, then
//! the subscription's daily quota.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Account, Subscription};

/// Free answers granted at the start of every UTC calendar month.
pub const FREE_ANSWERS_PER_MONTH: u32 = 3;

/// Which entitlement paid for an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    FreeAnswer,
    Tokens,
    Subscription,
}

impl PaymentSource {
    /// Stable storage and metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeAnswer => "free_answer",
            Self::Tokens => "tokens",
            Self::Subscription => "subscription",
        }
    }
}

/// Why an explanation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No free answer, too few tokens, and no usable subscription.
    PaymentRequired,
    /// The subscription is premium but today's quota is spent.
    DailyCapReached { cap: u32 },
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementDecision {
    Allowed(PaymentSource),
    Denied(DenialReason),
}

/// Balances relevant to a single decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSnapshot {
    pub free_answers_remaining: u32,
    pub free_answers_reset_at: DateTime<Utc>,
    pub token_balance: i64,
    pub subscription: Option<Subscription>,
}

impl EntitlementSnapshot {
    /// Capture the balances of an account and its current subscription.
    #[must_use]
    pub fn new(account: &Account, subscription: Option<Subscription>) -> Self {
        Self {
            free_answers_remaining: account.free_answers_remaining,
            free_answers_reset_at: account.free_answers_reset_at,
            token_balance: account.token_balance,
            subscription,
        }
    }
}

/// Token accounting reported by the vision model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Sum of prompt and completion tokens.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Integer pricing parameters.
///
/// Provider prices are expressed in micro-USD per million model tokens; the
/// app sells its own tokens at `micro_usd_per_token` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub input_micro_usd_per_million: u64,
    pub output_micro_usd_per_million: u64,
    pub markup_percent: u64,
    pub micro_usd_per_token: u64,
    pub min_charge_tokens: i64,
    pub min_balance_to_start: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            input_micro_usd_per_million: 2_500_000,
            output_micro_usd_per_million: 10_000_000,
            markup_percent: 300,
            micro_usd_per_token: 1_000,
            min_charge_tokens: 1,
            min_balance_to_start: 5,
        }
    }
}

/// Provider cost and app-token charge for one explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cost {
    /// Raw provider cost in micro-USD, rounded up.
    pub provider_micro_usd: u64,
    /// Tokens to charge, at least `min_charge_tokens`.
    pub tokens: i64,
}

fn div_ceil(numerator: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    numerator.div_ceil(denominator)
}

/// Convert model usage into a token charge, rounding every step up.
///
/// # Examples
/// ```
/// use backend::domain::{cost_of, PricingPolicy, TokenUsage};
///
/// let usage = TokenUsage { prompt_tokens: 1_000, completion_tokens: 500 };
/// let cost = cost_of(usage, &PricingPolicy::default());
/// assert_eq!(cost.provider_micro_usd, 7_500);
/// assert_eq!(cost.tokens, 23);
/// ```
#[must_use]
pub fn cost_of(usage: TokenUsage, pricing: &PricingPolicy) -> Cost {
    let raw = u128::from(usage.prompt_tokens) * u128::from(pricing.input_micro_usd_per_million)
        + u128::from(usage.completion_tokens) * u128::from(pricing.output_micro_usd_per_million);
    let provider = div_ceil(raw, 1_000_000);
    let marked_up = div_ceil(provider * u128::from(pricing.markup_percent), 100);
    let tokens = div_ceil(marked_up, u128::from(pricing.micro_usd_per_token));
    let tokens = i64::try_from(tokens).unwrap_or(i64::MAX);
    Cost {
        provider_micro_usd: u64::try_from(provider).unwrap_or(u64::MAX),
        tokens: tokens.max(pricing.min_charge_tokens),
    }
}

/// First instant of the UTC calendar month containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map_or(now, |midnight| Utc.from_utc_datetime(&midnight))
}

/// Whether the free-answer allowance is due for its monthly top-up.
#[must_use]
pub fn needs_monthly_reset(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last_reset < month_start(now)
}

/// Apply the monthly top-up to a snapshot, returning whether it changed.
///
/// The allowance is replaced, not accumulated: unused answers expire.
pub fn apply_monthly_reset(snapshot: &mut EntitlementSnapshot, now: DateTime<Utc>) -> bool {
    if !needs_monthly_reset(snapshot.free_answers_reset_at, now) {
        return false;
    }
    snapshot.free_answers_remaining = FREE_ANSWERS_PER_MONTH;
    snapshot.free_answers_reset_at = now;
    true
}

/// Decide which source pays for the next explanation.
///
/// # Examples
/// ```
/// use backend::domain::{
///     resolve, EntitlementDecision, EntitlementSnapshot, PaymentSource, PricingPolicy,
/// };
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let snapshot = EntitlementSnapshot {
///     free_answers_remaining: 0,
///     free_answers_reset_at: now,
///     token_balance: 40,
///     subscription: None,
/// };
/// assert_eq!(
///     resolve(&snapshot, &PricingPolicy::default(), now),
///     EntitlementDecision::Allowed(PaymentSource::Tokens)
/// );
/// ```
#[must_use]
pub fn resolve(
    snapshot: &EntitlementSnapshot,
    pricing: &PricingPolicy,
    now: DateTime<Utc>,
) -> EntitlementDecision {
    if snapshot.free_answers_remaining > 0 {
        return EntitlementDecision::Allowed(PaymentSource::FreeAnswer);
    }
    if snapshot.token_balance >= pricing.min_balance_to_start.max(1) {
        return EntitlementDecision::Allowed(PaymentSource::Tokens);
    }
    match snapshot
        .subscription
        .as_ref()
        .filter(|sub| sub.is_premium(now))
    {
        Some(sub) if sub.has_quota_left(now.date_naive()) => {
            EntitlementDecision::Allowed(PaymentSource::Subscription)
        }
        Some(sub) => EntitlementDecision::Denied(DenialReason::DailyCapReached {
            cap: sub.tier.daily_cap(),
        }),
        None => EntitlementDecision::Denied(DenialReason::PaymentRequired),
    }
}

#[cfg(test)]
mod tests;
