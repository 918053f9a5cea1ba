//! Stripe wire types and their mapping into `PaymentEvent`.
//!
//! Only fields the domain acts on are decoded. Checkout sessions carry the
//! purchaser and purchase details in `metadata`, written when the session is
//! created.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{
    NewTokenPurchase, PaymentEvent, SubscriptionChange, SubscriptionStatus, SubscriptionTier,
    TokenPackage, UserId,
};

pub(super) const META_USER_ID: &str = "user_id";
pub(super) const META_PACKAGE_ID: &str = "package_id";
pub(super) const META_TOKENS: &str = "tokens";
pub(super) const META_TIER: &str = "tier";

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutSessionCreatedDto {
    pub(super) id: String,
    pub(super) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct EventDto {
    #[serde(rename = "type")]
    pub(super) event_type: String,
    pub(super) data: EventDataDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct EventDataDto {
    pub(super) object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionDto {
    id: String,
    mode: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionDto {
    id: String,
    status: String,
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<SubscriptionItemsDto>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItemsDto {
    #[serde(default)]
    data: Vec<SubscriptionItemDto>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItemDto {
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DeletedSubscriptionDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceDto {
    #[serde(default)]
    subscription: Option<String>,
}

fn decode<T: for<'de> Deserialize<'de>>(object: Value, what: &str) -> Result<T, String> {
    serde_json::from_value(object).map_err(|err| format!("invalid {what} object: {err}"))
}

fn parse_user_id(raw: Option<&String>) -> Result<Option<UserId>, String> {
    raw.map(|value| UserId::new(value).map_err(|err| format!("invalid user id '{value}': {err}")))
        .transpose()
}

fn parse_tier(raw: Option<&String>) -> Result<Option<SubscriptionTier>, String> {
    raw.map(|value| value.parse::<SubscriptionTier>().map_err(|err| err.to_string()))
        .transpose()
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| format!("timestamp {seconds} out of range"))
}

impl EventDto {
    /// Reduce the event to what the domain handles.
    pub(super) fn into_payment_event(self) -> Result<PaymentEvent, String> {
        let object = self.data.object;
        match self.event_type.as_str() {
            "checkout.session.completed" => {
                decode::<CheckoutSessionDto>(object, "checkout session")?.into_payment_event()
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                decode::<SubscriptionDto>(object, "subscription")?.into_change()
            }
            "customer.subscription.deleted" => {
                let deleted: DeletedSubscriptionDto = decode(object, "subscription")?;
                Ok(PaymentEvent::SubscriptionDeleted {
                    external_subscription_id: deleted.id,
                })
            }
            "invoice.payment_failed" => {
                let invoice: InvoiceDto = decode(object, "invoice")?;
                Ok(match invoice.subscription {
                    Some(external_subscription_id) => PaymentEvent::SubscriptionPaymentFailed {
                        external_subscription_id,
                    },
                    None => PaymentEvent::Ignored {
                        event_type: self.event_type,
                    },
                })
            }
            _ => Ok(PaymentEvent::Ignored {
                event_type: self.event_type,
            }),
        }
    }
}

impl CheckoutSessionDto {
    fn user_id(&self) -> Result<UserId, String> {
        parse_user_id(
            self.metadata
                .get(META_USER_ID)
                .or(self.client_reference_id.as_ref()),
        )?
        .ok_or_else(|| format!("checkout session {} has no user id", self.id))
    }

    fn into_payment_event(self) -> Result<PaymentEvent, String> {
        match self.mode.as_str() {
            "payment" => self.into_token_purchase(),
            "subscription" => {
                let user_id = self.user_id()?;
                let tier = parse_tier(self.metadata.get(META_TIER))?
                    .ok_or_else(|| format!("checkout session {} has no tier", self.id))?;
                let external_subscription_id = self
                    .subscription
                    .ok_or_else(|| format!("checkout session {} has no subscription", self.id))?;
                Ok(PaymentEvent::SubscriptionCheckoutCompleted {
                    user_id,
                    external_subscription_id,
                    tier,
                })
            }
            other => Ok(PaymentEvent::Ignored {
                event_type: format!("checkout.session.completed ({other})"),
            }),
        }
    }

    fn into_token_purchase(self) -> Result<PaymentEvent, String> {
        if self.payment_status.as_deref().is_some_and(|status| status != "paid") {
            return Ok(PaymentEvent::Ignored {
                event_type: "checkout.session.completed (unpaid)".to_owned(),
            });
        }
        let user_id = self.user_id()?;
        let package = self
            .metadata
            .get(META_PACKAGE_ID)
            .and_then(|id| TokenPackage::find(id));
        let tokens = match self.metadata.get(META_TOKENS) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|err| format!("invalid token count '{raw}': {err}"))?,
            None => package
                .map(|package| package.tokens)
                .ok_or_else(|| format!("checkout session {} has no token count", self.id))?,
        };
        if tokens <= 0 {
            return Err(format!("checkout session {} credits no tokens", self.id));
        }
        let price_cents = self
            .amount_total
            .or_else(|| package.map(|package| package.price_cents))
            .unwrap_or_default();
        let currency = self
            .currency
            .or_else(|| package.map(|package| package.currency.to_owned()))
            .unwrap_or_else(|| "usd".to_owned());
        Ok(PaymentEvent::TokensPurchased(NewTokenPurchase {
            user_id,
            tokens,
            price_cents,
            currency,
            external_payment_id: self.payment_intent.unwrap_or(self.id),
        }))
    }
}

impl SubscriptionDto {
    fn period(&self) -> (Option<i64>, Option<i64>) {
        let first_item = self.items.as_ref().and_then(|items| items.data.first());
        (
            self.current_period_start
                .or_else(|| first_item.and_then(|item| item.current_period_start)),
            self.current_period_end
                .or_else(|| first_item.and_then(|item| item.current_period_end)),
        )
    }

    fn into_change(self) -> Result<PaymentEvent, String> {
        let status = self
            .status
            .parse::<SubscriptionStatus>()
            .map_err(|err| err.to_string())?;
        let current_period = match self.period() {
            (Some(start), Some(end)) => Some((timestamp(start)?, timestamp(end)?)),
            _ => None,
        };
        Ok(PaymentEvent::SubscriptionChanged(SubscriptionChange {
            user_id: parse_user_id(self.metadata.get(META_USER_ID))?,
            tier: parse_tier(self.metadata.get(META_TIER))?,
            external_subscription_id: self.id,
            status,
            current_period,
        }))
    }
}
