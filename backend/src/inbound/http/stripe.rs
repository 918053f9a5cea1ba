//! Checkout creation and the payment provider webhook.
//!
//! The webhook is unauthenticated; trust comes from the `Stripe-Signature`
//! header, which is verified over the raw request body.

use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{CheckoutSession, Error, SubscriptionTier};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, missing_field_error, parse_label};

/// Header carrying `t=<unix>,v1=<hex hmac>`.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

const PACKAGE_ID: FieldName = FieldName::new("packageId");
const TIER: FieldName = FieldName::new("tier");

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenCheckoutRequest {
    #[schema(example = "standard")]
    pub package_id: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheckoutRequest {
    #[schema(example = "pro")]
    pub tier: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
}

/// Start a checkout for a token package.
#[utoipa::path(
    post,
    path = "/api/stripe/create-token-checkout",
    request_body = TokenCheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout page", body = CheckoutSession),
        (status = 400, description = "Unknown package", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 503, description = "Payments are not configured", body = Error)
    ),
    tags = ["billing"],
    operation_id = "createTokenCheckout"
)]
#[post("/stripe/create-token-checkout")]
pub async fn create_token_checkout(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<TokenCheckoutRequest>,
) -> ApiResult<web::Json<CheckoutSession>> {
    let user_id = session.current_user()?;
    let package_id = payload.package_id.trim();
    if package_id.is_empty() {
        return Err(missing_field_error(PACKAGE_ID));
    }
    let checkout = state
        .billing
        .create_token_checkout(&user_id, package_id)
        .await?;
    Ok(web::Json(checkout))
}

/// Start a checkout for a subscription tier.
#[utoipa::path(
    post,
    path = "/api/stripe/create-subscription-checkout",
    request_body = SubscriptionCheckoutRequest,
    responses(
        (status = 200, description = "Hosted checkout page", body = CheckoutSession),
        (status = 400, description = "Unknown or unpriced tier", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 503, description = "Payments are not configured", body = Error)
    ),
    tags = ["billing"],
    operation_id = "createSubscriptionCheckout"
)]
#[post("/stripe/create-subscription-checkout")]
pub async fn create_subscription_checkout(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<SubscriptionCheckoutRequest>,
) -> ApiResult<web::Json<CheckoutSession>> {
    let user_id = session.current_user()?;
    let tier: SubscriptionTier = parse_label(&payload.tier, TIER)?;
    let checkout = state
        .billing
        .create_subscription_checkout(&user_id, tier)
        .await?;
    Ok(web::Json(checkout))
}

/// Receive a provider event.
#[utoipa::path(
    post,
    path = "/api/stripe/webhook",
    request_body(content = String, content_type = "application/json",
        description = "Raw provider event"),
    params(("Stripe-Signature" = String, Header, description = "Event signature")),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Signature or payload rejected", body = Error)
    ),
    tags = ["billing"],
    operation_id = "stripeWebhook",
    security([])
)]
#[post("/stripe/webhook")]
pub async fn webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<WebhookAck>> {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::invalid_request("missing Stripe-Signature header"))?;
    state.billing.handle_webhook(&body, signature).await?;
    info!(bytes = body.len(), "payment event processed");
    Ok(web::Json(WebhookAck { received: true }))
}
