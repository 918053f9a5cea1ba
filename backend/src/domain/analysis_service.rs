//! Metered image explanation.
//!
//! Every request follows the same sequence:
//!
//! 1. top up the monthly free-answer allowance when a new month started;
//! 2. resolve which entitlement pays, refusing with 402 when none does;
//! 3. reserve that entitlement with a conditional update;
//! 4. call the vision model, releasing the reservation if it fails;
//! 5. charge tokens for token-paid requests and write the usage log.
//!
//! Token-paid requests are only pre-checked before the model call because
//! the charge depends on the usage the model reports; the charge saturates at
//! zero so the balance never goes negative.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{
    AccountRepository, AnalysisCommand, AnalysisMetrics, AnalysisOutcomeKind,
    SubscriptionRepository, TokenCharge, UsageLogRepository, VisionModel, VisionRequest,
};
use crate::domain::service_support::{
    load_account, map_account_error, map_subscription_error, refresh_monthly_allowance,
};
use crate::domain::{
    AnalysisInput, AnalysisOutcome, DenialReason, EntitlementDecision, EntitlementSnapshot,
    Error, Explanation, FREE_ANSWERS_PER_MONTH, PaymentSource, PricingPolicy, RemainingBalances,
    UsageRecord, UserId, cost_of, resolve,
};

/// Attempts made when a reservation loses a race with a concurrent request.
const RESERVATION_ATTEMPTS: usize = 2;

/// Entitlement held for the duration of one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    FreeAnswer,
    Tokens,
    Subscription { id: Uuid, day: NaiveDate },
}

impl Reservation {
    const fn source(self) -> PaymentSource {
        match self {
            Self::FreeAnswer => PaymentSource::FreeAnswer,
            Self::Tokens => PaymentSource::Tokens,
            Self::Subscription { .. } => PaymentSource::Subscription,
        }
    }
}

/// Analysis service implementing [`AnalysisCommand`].
#[derive(Clone)]
pub struct AnalysisService<A, S, U> {
    accounts: Arc<A>,
    subscriptions: Arc<S>,
    usage_log: Arc<U>,
    vision: Arc<dyn VisionModel>,
    metrics: Arc<dyn AnalysisMetrics>,
    pricing: PricingPolicy,
    clock: Arc<dyn Clock>,
}

impl<A, S, U> AnalysisService<A, S, U> {
    /// Create a new service.
    pub fn new(
        accounts: Arc<A>,
        subscriptions: Arc<S>,
        usage_log: Arc<U>,
        vision: Arc<dyn VisionModel>,
        metrics: Arc<dyn AnalysisMetrics>,
        pricing: PricingPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            subscriptions,
            usage_log,
            vision,
            metrics,
            pricing,
            clock,
        }
    }
}

/// Balances once `reservation` is spent, derived from the snapshot it was
/// taken against and the ledger's answer to the token charge.
fn balances_after(
    snapshot: &EntitlementSnapshot,
    reservation: Reservation,
    charge: Option<TokenCharge>,
    now: DateTime<Utc>,
) -> RemainingBalances {
    let today = now.date_naive();
    let spent_free = u32::from(reservation == Reservation::FreeAnswer);
    let spent_daily = u32::from(matches!(reservation, Reservation::Subscription { .. }));
    RemainingBalances {
        free_answers_remaining: snapshot.free_answers_remaining.saturating_sub(spent_free),
        token_balance: charge.map_or(snapshot.token_balance, |charge| charge.balance),
        subscription_remaining_today: snapshot
            .subscription
            .as_ref()
            .filter(|sub| sub.is_premium(now))
            .map(|sub| {
                sub.tier
                    .daily_cap()
                    .saturating_sub(sub.daily_usage_for(today).saturating_add(spent_daily))
            }),
    }
}

fn denial_error(reason: DenialReason) -> Error {
    match reason {
        DenialReason::PaymentRequired => Error::payment_required(
            "no free answers, tokens or subscription allowance remain",
        )
        .with_details(json!({ "reason": "payment_required" })),
        DenialReason::DailyCapReached { cap } => Error::payment_required(format!(
            "daily subscription limit of {cap} analyses reached"
        ))
        .with_details(json!({ "reason": "daily_cap_reached", "dailyCap": cap })),
    }
}

impl<A, S, U> AnalysisService<A, S, U>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    U: UsageLogRepository,
{
    async fn record_metrics(
        &self,
        outcome: AnalysisOutcomeKind,
        source: Option<PaymentSource>,
        tokens_charged: i64,
    ) {
        if let Err(error) = self.metrics.record(outcome, source, tokens_charged).await {
            warn!(%error, "failed to record analysis metrics");
        }
    }

    async fn write_usage(&self, record: UsageRecord) {
        if let Err(error) = self.usage_log.record(&record).await {
            warn!(user_id = %record.user_id, %error, "failed to write usage log");
        }
    }

    async fn snapshot(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<EntitlementSnapshot, Error> {
        let account = load_account(self.accounts.as_ref(), user_id).await?;
        let account = refresh_monthly_allowance(self.accounts.as_ref(), account, now).await?;
        let subscription = self
            .subscriptions
            .find_current(user_id, now)
            .await
            .map_err(map_subscription_error)?;
        Ok(EntitlementSnapshot::new(&account, subscription))
    }

    /// Try to hold the resolved entitlement; `None` means a concurrent
    /// request took it first.
    async fn try_reserve(
        &self,
        user_id: &UserId,
        snapshot: &EntitlementSnapshot,
        source: PaymentSource,
        today: NaiveDate,
    ) -> Result<Option<Reservation>, Error> {
        match source {
            PaymentSource::FreeAnswer => {
                let consumed = self
                    .accounts
                    .consume_free_answer(user_id)
                    .await
                    .map_err(map_account_error)?;
                Ok(consumed.then_some(Reservation::FreeAnswer))
            }
            PaymentSource::Tokens => Ok(Some(Reservation::Tokens)),
            PaymentSource::Subscription => {
                let Some(subscription) = snapshot.subscription.as_ref() else {
                    return Ok(None);
                };
                let reserved = self
                    .subscriptions
                    .reserve_daily_use(subscription.id, today, subscription.tier.daily_cap())
                    .await
                    .map_err(map_subscription_error)?;
                Ok(reserved.then_some(Reservation::Subscription {
                    id: subscription.id,
                    day: today,
                }))
            }
        }
    }

    async fn reserve(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(Reservation, EntitlementSnapshot), Error> {
        for _ in 0..RESERVATION_ATTEMPTS {
            let snapshot = self.snapshot(user_id, now).await?;
            let source = match resolve(&snapshot, &self.pricing, now) {
                EntitlementDecision::Allowed(source) => source,
                EntitlementDecision::Denied(reason) => {
                    self.record_metrics(AnalysisOutcomeKind::Denied, None, 0)
                        .await;
                    return Err(denial_error(reason));
                }
            };
            if let Some(reservation) = self
                .try_reserve(user_id, &snapshot, source, now.date_naive())
                .await?
            {
                return Ok((reservation, snapshot));
            }
        }
        Err(Error::conflict(
            "balances changed while the request was processed; please retry",
        ))
    }

    async fn release(&self, user_id: &UserId, reservation: Reservation) {
        let result = match reservation {
            Reservation::FreeAnswer => self
                .accounts
                .restore_free_answer(user_id, FREE_ANSWERS_PER_MONTH)
                .await
                .map_err(map_account_error),
            Reservation::Tokens => Ok(()),
            Reservation::Subscription { id, day } => self
                .subscriptions
                .release_daily_use(id, day)
                .await
                .map_err(map_subscription_error),
        };
        if let Err(error) = result {
            warn!(user_id = %user_id, %error, "failed to release analysis reservation");
        }
    }
}

#[async_trait]
impl<A, S, U> AnalysisCommand for AnalysisService<A, S, U>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    U: UsageLogRepository,
{
    async fn analyze(
        &self,
        user_id: &UserId,
        input: AnalysisInput,
    ) -> Result<AnalysisOutcome, Error> {
        let now = self.clock.utc();
        let (reservation, snapshot) = self.reserve(user_id, now).await?;
        let source = reservation.source();

        let request = VisionRequest {
            image: input.image,
            intent: input.intent,
            language: input.language.clone(),
        };
        let response = match self.vision.explain(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(user_id = %user_id, %error, source = source.as_str(), "vision model failed");
                self.release(user_id, reservation).await;
                self.write_usage(UsageRecord::failed(*user_id, source)).await;
                self.record_metrics(AnalysisOutcomeKind::UpstreamFailed, Some(source), 0)
                    .await;
                return Err(Error::internal("failed to analyze image"));
            }
        };

        let cost = cost_of(response.usage, &self.pricing);
        let charge = if reservation == Reservation::Tokens {
            Some(
                self.accounts
                    .charge_tokens(user_id, cost.tokens)
                    .await
                    .map_err(map_account_error)?,
            )
        } else {
            None
        };
        let tokens_charged = charge.map_or(0, |charge| charge.charged);

        self.write_usage(UsageRecord {
            user_id: *user_id,
            payment_source: source,
            usage: response.usage,
            cost_micro_usd: cost.provider_micro_usd,
            tokens_charged,
            success: true,
        })
        .await;
        self.record_metrics(AnalysisOutcomeKind::Succeeded, Some(source), tokens_charged)
            .await;
        info!(
            user_id = %user_id,
            source = source.as_str(),
            model_tokens = response.usage.total(),
            tokens_charged,
            "analysis completed"
        );

        Ok(AnalysisOutcome {
            explanation: Explanation::from_model_text(&response.content),
            intent: input.intent,
            language: input.language,
            payment_source: source,
            tokens_charged,
            remaining: balances_after(&snapshot, reservation, charge, now),
        })
    }
}

#[cfg(test)]
#[path = "analysis_service_tests.rs"]
mod tests;
