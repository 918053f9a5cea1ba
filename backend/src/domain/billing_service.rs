//! Billing service: hosted checkout sessions and payment provider events.
//!
//! Webhook handling is idempotent. Token credits are keyed by the external
//! payment id and subscriptions by the external subscription id, so the
//! provider may redeliver any event without double-crediting.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::ports::{
    AccountRepository, BillingCommand, PaymentGateway, PaymentGatewayError,
    SubscriptionRepository, TokenPurchaseRepository,
};
use crate::domain::service_support::{
    load_account, map_account_error, map_purchase_error, map_subscription_error,
};
use crate::domain::{
    CheckoutItem, CheckoutRequest, CheckoutSession, Error, NewTokenPurchase, PaymentEvent,
    PurchaseOutcome, SubscriptionChange, SubscriptionStatus, SubscriptionTier,
    SubscriptionUpsert, TokenPackage, UserId,
};

/// Period assumed for a subscription whose provider event carried none.
const DEFAULT_PERIOD: Duration = Duration::days(30);

/// Redirect targets and provider price ids used when opening checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub success_url: Url,
    pub cancel_url: Url,
    pub basic_price_id: Option<String>,
    pub pro_price_id: Option<String>,
}

impl CheckoutSettings {
    fn price_id(&self, tier: SubscriptionTier) -> Option<&str> {
        match tier {
            SubscriptionTier::Basic => self.basic_price_id.as_deref(),
            SubscriptionTier::Pro => self.pro_price_id.as_deref(),
        }
        .filter(|id| !id.trim().is_empty())
    }
}

/// Billing service implementing [`BillingCommand`].
#[derive(Clone)]
pub struct BillingService<A, S, P> {
    accounts: Arc<A>,
    subscriptions: Arc<S>,
    purchases: Arc<P>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
    clock: Arc<dyn Clock>,
}

impl<A, S, P> BillingService<A, S, P> {
    /// Create a new service.
    pub fn new(
        accounts: Arc<A>,
        subscriptions: Arc<S>,
        purchases: Arc<P>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            subscriptions,
            purchases,
            gateway,
            settings,
            clock,
        }
    }
}

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::NotConfigured => {
            Error::service_unavailable("payments are not configured")
        }
        PaymentGatewayError::Transport { message } => {
            Error::service_unavailable(format!("payment provider unavailable: {message}"))
        }
        PaymentGatewayError::Rejected { status, message } => {
            Error::internal(format!("payment provider rejected request ({status}): {message}"))
        }
        PaymentGatewayError::InvalidSignature { message } => {
            Error::invalid_request(format!("invalid webhook signature: {message}"))
        }
        PaymentGatewayError::MalformedEvent { message } => {
            Error::invalid_request(format!("invalid webhook payload: {message}"))
        }
    }
}

impl<A, S, P> BillingService<A, S, P>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    P: TokenPurchaseRepository,
{
    async fn open_checkout(
        &self,
        user_id: &UserId,
        item: CheckoutItem,
    ) -> Result<CheckoutSession, Error> {
        let account = load_account(self.accounts.as_ref(), user_id).await?;
        let request = CheckoutRequest {
            user_id: account.id,
            email: account.email,
            item,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
        };
        let session = self
            .gateway
            .create_checkout(&request)
            .await
            .map_err(map_gateway_error)?;
        info!(user_id = %user_id, session_id = %session.session_id, "checkout session created");
        Ok(session)
    }

    async fn account_exists(&self, user_id: &UserId) -> Result<bool, Error> {
        Ok(self
            .accounts
            .find_by_id(user_id)
            .await
            .map_err(map_account_error)?
            .is_some())
    }

    async fn credit_purchase(&self, purchase: NewTokenPurchase) -> Result<(), Error> {
        if !self.account_exists(&purchase.user_id).await? {
            warn!(
                user_id = %purchase.user_id,
                payment_id = %purchase.external_payment_id,
                "token purchase for unknown account ignored"
            );
            return Ok(());
        }
        match self
            .purchases
            .record_purchase(&purchase)
            .await
            .map_err(map_purchase_error)?
        {
            PurchaseOutcome::Credited { balance } => info!(
                user_id = %purchase.user_id,
                tokens = purchase.tokens,
                balance,
                "token purchase credited"
            ),
            PurchaseOutcome::AlreadyRecorded => info!(
                payment_id = %purchase.external_payment_id,
                "duplicate token purchase event ignored"
            ),
        }
        Ok(())
    }

    async fn start_subscription(
        &self,
        user_id: UserId,
        external_subscription_id: String,
        tier: SubscriptionTier,
    ) -> Result<(), Error> {
        let existing = self
            .subscriptions
            .find_by_external_id(&external_subscription_id)
            .await
            .map_err(map_subscription_error)?;
        if existing.is_some() {
            debug!(%external_subscription_id, "subscription already recorded");
            return Ok(());
        }
        if !self.account_exists(&user_id).await? {
            warn!(user_id = %user_id, "subscription checkout for unknown account ignored");
            return Ok(());
        }
        let now = self.clock.utc();
        self.upsert(SubscriptionUpsert {
            user_id,
            external_subscription_id,
            tier,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: now + DEFAULT_PERIOD,
        })
        .await
    }

    async fn apply_change(&self, change: SubscriptionChange) -> Result<(), Error> {
        let existing = self
            .subscriptions
            .find_by_external_id(&change.external_subscription_id)
            .await
            .map_err(map_subscription_error)?;

        let user_id = change
            .user_id
            .or_else(|| existing.as_ref().map(|sub| sub.user_id));
        let tier = change.tier.or_else(|| existing.as_ref().map(|sub| sub.tier));
        let (Some(user_id), Some(tier)) = (user_id, tier) else {
            warn!(
                subscription_id = %change.external_subscription_id,
                "subscription event without owner or tier ignored"
            );
            return Ok(());
        };
        if existing.is_none() && !self.account_exists(&user_id).await? {
            warn!(user_id = %user_id, "subscription event for unknown account ignored");
            return Ok(());
        }

        let (start, end) = change.current_period.unwrap_or_else(|| {
            existing.as_ref().map_or_else(
                || self.default_period(),
                |sub| (sub.current_period_start, sub.current_period_end),
            )
        });
        self.upsert(SubscriptionUpsert {
            user_id,
            external_subscription_id: change.external_subscription_id,
            tier,
            status: change.status,
            current_period_start: start,
            current_period_end: end,
        })
        .await
    }

    fn default_period(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = self.clock.utc();
        (now, now + DEFAULT_PERIOD)
    }

    async fn upsert(&self, upsert: SubscriptionUpsert) -> Result<(), Error> {
        let stored = self
            .subscriptions
            .upsert(&upsert)
            .await
            .map_err(map_subscription_error)?;
        info!(
            user_id = %stored.user_id,
            subscription_id = %stored.external_subscription_id,
            tier = stored.tier.as_str(),
            status = stored.status.as_str(),
            "subscription stored"
        );
        Ok(())
    }

    async fn set_status(
        &self,
        external_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), Error> {
        let updated = self
            .subscriptions
            .update_status(external_subscription_id, status)
            .await
            .map_err(map_subscription_error)?;
        if updated {
            info!(subscription_id = %external_subscription_id, status = status.as_str(), "subscription status changed");
        } else {
            warn!(subscription_id = %external_subscription_id, "status change for unknown subscription ignored");
        }
        Ok(())
    }
}

#[async_trait]
impl<A, S, P> BillingCommand for BillingService<A, S, P>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    P: TokenPurchaseRepository,
{
    async fn create_token_checkout(
        &self,
        user_id: &UserId,
        package_id: &str,
    ) -> Result<CheckoutSession, Error> {
        let package = TokenPackage::find(package_id)
            .ok_or_else(|| Error::invalid_request(format!("unknown token package: {package_id}")))?;
        self.open_checkout(user_id, CheckoutItem::Tokens(package))
            .await
    }

    async fn create_subscription_checkout(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
    ) -> Result<CheckoutSession, Error> {
        let price_id = self.settings.price_id(tier).ok_or_else(|| {
            Error::invalid_request(format!("subscription tier {tier} is not available"))
        })?;
        let item = CheckoutItem::Subscription {
            tier,
            price_id: price_id.to_owned(),
        };
        self.open_checkout(user_id, item).await
    }

    async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<(), Error> {
        let event = self
            .gateway
            .verify_event(payload, signature)
            .map_err(map_gateway_error)?;
        match event {
            PaymentEvent::TokensPurchased(purchase) => self.credit_purchase(purchase).await,
            PaymentEvent::SubscriptionCheckoutCompleted {
                user_id,
                external_subscription_id,
                tier,
            } => {
                self.start_subscription(user_id, external_subscription_id, tier)
                    .await
            }
            PaymentEvent::SubscriptionChanged(change) => self.apply_change(change).await,
            PaymentEvent::SubscriptionDeleted {
                external_subscription_id,
            } => {
                self.set_status(&external_subscription_id, SubscriptionStatus::Canceled)
                    .await
            }
            PaymentEvent::SubscriptionPaymentFailed {
                external_subscription_id,
            } => {
                self.set_status(&external_subscription_id, SubscriptionStatus::PastDue)
                    .await
            }
            PaymentEvent::Ignored { event_type } => {
                debug!(%event_type, "payment event ignored");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "billing_service_tests.rs"]
mod tests;
