//! Reqwest-backed Stripe gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::{Client, Url};
use tracing::debug;

use super::dto::{
    CheckoutSessionCreatedDto, EventDto, META_PACKAGE_ID, META_TIER, META_TOKENS, META_USER_ID,
};
use super::signature;
use crate::domain::ports::{PaymentGateway, PaymentGatewayError};
use crate::domain::{CheckoutItem, CheckoutRequest, CheckoutSession, PaymentEvent};

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Credentials and endpoint for the Stripe API.
#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    /// Endpoint secret (`whsec_...`); webhooks are refused without it.
    pub webhook_secret: Option<String>,
    pub api_base: Url,
}

impl StripeSettings {
    /// Settings for the live Stripe API.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in API base fails to parse.
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            secret_key: secret_key.into(),
            webhook_secret,
            api_base: Url::parse(DEFAULT_API_BASE)?,
        })
    }
}

impl std::fmt::Debug for StripeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSettings")
            .field("api_base", &self.api_base.as_str())
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Stripe implementation of [`PaymentGateway`].
pub struct StripeGateway {
    client: Client,
    settings: StripeSettings,
    clock: Arc<dyn Clock>,
}

impl StripeGateway {
    /// Build a gateway; `clock` bounds webhook signature age.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: StripeSettings, clock: Arc<dyn Clock>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            settings,
            clock,
        })
    }

    fn sessions_url(&self) -> Result<Url, PaymentGatewayError> {
        self.settings
            .api_base
            .join("checkout/sessions")
            .map_err(|err| PaymentGatewayError::transport(format!("invalid API base: {err}")))
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let user_id = request.user_id.to_string();
    let mut form = vec![
        ("success_url".to_owned(), request.success_url.to_string()),
        ("cancel_url".to_owned(), request.cancel_url.to_string()),
        ("customer_email".to_owned(), request.email.to_string()),
        ("client_reference_id".to_owned(), user_id.clone()),
        (format!("metadata[{META_USER_ID}]"), user_id.clone()),
        ("line_items[0][quantity]".to_owned(), "1".to_owned()),
    ];
    match &request.item {
        CheckoutItem::Tokens(package) => {
            form.extend([
                ("mode".to_owned(), "payment".to_owned()),
                (format!("metadata[{META_PACKAGE_ID}]"), package.id.to_owned()),
                (format!("metadata[{META_TOKENS}]"), package.tokens.to_string()),
                (
                    "line_items[0][price_data][currency]".to_owned(),
                    package.currency.to_owned(),
                ),
                (
                    "line_items[0][price_data][unit_amount]".to_owned(),
                    package.price_cents.to_string(),
                ),
                (
                    "line_items[0][price_data][product_data][name]".to_owned(),
                    format!("{} tokens ({})", package.tokens, package.name),
                ),
            ]);
        }
        CheckoutItem::Subscription { tier, price_id } => {
            form.extend([
                ("mode".to_owned(), "subscription".to_owned()),
                (format!("metadata[{META_TIER}]"), tier.as_str().to_owned()),
                ("line_items[0][price]".to_owned(), price_id.clone()),
                (
                    format!("subscription_data[metadata][{META_USER_ID}]"),
                    user_id,
                ),
                (
                    format!("subscription_data[metadata][{META_TIER}]"),
                    tier.as_str().to_owned(),
                ),
            ]);
        }
    }
    form
}

fn parse_session(body: &[u8]) -> Result<CheckoutSession, PaymentGatewayError> {
    let created: CheckoutSessionCreatedDto = serde_json::from_slice(body).map_err(|err| {
        PaymentGatewayError::rejected(200_u16, format!("invalid checkout session payload: {err}"))
    })?;
    let url = created
        .url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(|err| PaymentGatewayError::rejected(200_u16, format!("invalid checkout url: {err}")))?
        .ok_or_else(|| PaymentGatewayError::rejected(200_u16, "checkout session has no url"))?;
    Ok(CheckoutSession {
        session_id: created.id,
        url,
    })
}

fn parse_event(payload: &[u8]) -> Result<PaymentEvent, PaymentGatewayError> {
    let event: EventDto = serde_json::from_slice(payload)
        .map_err(|err| PaymentGatewayError::malformed_event(err.to_string()))?;
    event
        .into_payment_event()
        .map_err(PaymentGatewayError::malformed_event)
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let response = self
            .client
            .post(self.sessions_url()?)
            .basic_auth(&self.settings.secret_key, None::<&str>)
            .form(&checkout_form(request))
            .send()
            .await
            .map_err(|err| PaymentGatewayError::transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| PaymentGatewayError::transport(err.to_string()))?;
        if !status.is_success() {
            return Err(PaymentGatewayError::rejected(
                status.as_u16(),
                String::from_utf8_lossy(&body).chars().take(160).collect::<String>(),
            ));
        }
        parse_session(body.as_ref())
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError> {
        let secret = self
            .settings
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(PaymentGatewayError::not_configured)?;
        signature::verify(payload, signature, secret, self.clock.utc().timestamp())?;
        let event = parse_event(payload)?;
        debug!(?event, "verified payment event");
        Ok(event)
    }
}
