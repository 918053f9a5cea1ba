//! Token packages, purchases, checkout requests and provider events.
//!
//! Provider wire formats stay in the outbound adapter; this module only
//! describes what the domain needs to act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Email, SubscriptionStatus, SubscriptionTier, UserId};

/// A purchasable bundle of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub tokens: i64,
    pub price_cents: i64,
    pub currency: &'static str,
}

/// Fixed package catalogue.
pub const TOKEN_PACKAGES: [TokenPackage; 3] = [
    TokenPackage {
        id: "starter",
        name: "Starter",
        tokens: 100,
        price_cents: 199,
        currency: "usd",
    },
    TokenPackage {
        id: "standard",
        name: "Standard",
        tokens: 500,
        price_cents: 799,
        currency: "usd",
    },
    TokenPackage {
        id: "bulk",
        name: "Bulk",
        tokens: 1500,
        price_cents: 1999,
        currency: "usd",
    },
];

impl TokenPackage {
    /// Look up a package by id.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::TokenPackage;
    ///
    /// assert_eq!(TokenPackage::find("standard").map(|p| p.tokens), Some(500));
    /// assert!(TokenPackage::find("mega").is_none());
    /// ```
    #[must_use]
    pub fn find(id: &str) -> Option<Self> {
        TOKEN_PACKAGES.iter().copied().find(|package| package.id == id)
    }
}

/// Completed token purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPurchase {
    pub id: Uuid,
    #[serde(skip)]
    #[schema(ignore)]
    pub user_id: UserId,
    pub tokens: i64,
    pub price_cents: i64,
    pub currency: String,
    pub external_payment_id: String,
    pub created_at: DateTime<Utc>,
}

/// Purchase to record once per external payment id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTokenPurchase {
    pub user_id: UserId,
    pub tokens: i64,
    pub price_cents: i64,
    pub currency: String,
    pub external_payment_id: String,
}

/// Result of recording a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// The purchase was new and the balance was credited.
    Credited { balance: i64 },
    /// The payment id was already recorded; nothing changed.
    AlreadyRecorded,
}

/// What the caller is buying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutItem {
    Tokens(TokenPackage),
    Subscription {
        tier: SubscriptionTier,
        price_id: String,
    },
}

/// Request to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub email: Email,
    pub item: CheckoutItem,
    pub success_url: Url,
    pub cancel_url: Url,
}

/// Hosted checkout page returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    #[schema(value_type = String, example = "https://checkout.stripe.com/c/pay/cs_test_a1")]
    pub url: Url,
}

/// Subscription state carried by a provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub external_subscription_id: String,
    pub user_id: Option<UserId>,
    pub tier: Option<SubscriptionTier>,
    pub status: SubscriptionStatus,
    pub current_period: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Verified provider event, reduced to what the domain acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// A one-off token checkout was paid.
    TokensPurchased(NewTokenPurchase),
    /// A subscription checkout completed.
    SubscriptionCheckoutCompleted {
        user_id: UserId,
        external_subscription_id: String,
        tier: SubscriptionTier,
    },
    /// A subscription was created or changed.
    SubscriptionChanged(SubscriptionChange),
    /// A subscription was deleted at the provider.
    SubscriptionDeleted { external_subscription_id: String },
    /// A renewal payment failed.
    SubscriptionPaymentFailed { external_subscription_id: String },
    /// An event type the domain does not act on.
    Ignored { event_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_ids_are_unique() {
        for (index, package) in TOKEN_PACKAGES.iter().enumerate() {
            assert!(
                TOKEN_PACKAGES
                    .iter()
                    .skip(index + 1)
                    .all(|other| other.id != package.id),
                "duplicate package id {}",
                package.id
            );
        }
    }

    #[test]
    fn larger_packages_are_cheaper_per_token() {
        let per_token: Vec<i64> = TOKEN_PACKAGES
            .iter()
            .map(|package| package.price_cents * 10_000 / package.tokens)
            .collect();
        assert!(per_token.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn checkout_sessions_carry_the_url_as_a_string() {
        let session = CheckoutSession {
            session_id: "cs_test_1".to_owned(),
            url: Url::parse("https://checkout.stripe.com/c/pay/cs_test_1").expect("valid url"),
        };
        let value = serde_json::to_value(&session).expect("serialise");
        assert_eq!(
            value,
            serde_json::json!({
                "sessionId": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })
        );
        let back: CheckoutSession = serde_json::from_value(value).expect("deserialise");
        assert_eq!(back, session);
    }
}
