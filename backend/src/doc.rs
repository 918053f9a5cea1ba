//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] collects every handler under `/api`, the health probes and the
//! session cookie security scheme. Swagger UI serves it in debug builds and
//! `openapi-dump` prints it for client generation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::ports::TokenBalance;
use crate::domain::{
    AccountProfile, AnalysisIntent, AnalysisOutcome, CheckoutSession, ContentType, Error,
    ErrorCode, ImageSource, PaymentSource, SavedAnswer, SubscriptionStatus, SubscriptionSummary,
    SubscriptionTier, TokenPackage, TokenPurchase,
};
use crate::inbound::http::{analyze, auth, health, saved_answers, stripe, subscription, tokens};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Encrypted session cookie issued by POST /api/auth/login or /api/auth/register.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Snapwise API",
        description = "Photo explanations paid for by free answers, tokens or a subscription."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::current_user,
        auth::update_profile,
        auth::delete_account,
        auth::forgot_password,
        auth::reset_password,
        tokens::balance,
        tokens::purchases,
        tokens::packages,
        tokens::deduct,
        subscription::current,
        subscription::check_premium,
        saved_answers::list,
        saved_answers::create,
        saved_answers::get_one,
        saved_answers::delete_one,
        analyze::analyze,
        stripe::create_token_checkout,
        stripe::create_subscription_checkout,
        stripe::webhook,
        health::ready,
        health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        AccountProfile,
        TokenBalance,
        TokenPackage,
        TokenPurchase,
        SubscriptionSummary,
        SubscriptionTier,
        SubscriptionStatus,
        SavedAnswer,
        ContentType,
        AnalysisOutcome,
        AnalysisIntent,
        ImageSource,
        PaymentSource,
        CheckoutSession,
        auth::CredentialsRequest,
        auth::ProfileRequest,
        auth::ForgotPasswordRequest,
        auth::ResetPasswordRequest,
        auth::MessageResponse,
        tokens::DeductRequest,
        subscription::SubscriptionResponse,
        subscription::PremiumResponse,
        saved_answers::SaveAnswerRequest,
        analyze::AnalyzeRequest,
        stripe::TokenCheckoutRequest,
        stripe::SubscriptionCheckoutRequest,
        stripe::WebhookAck,
    )),
    tags(
        (name = "auth", description = "Registration, sessions and password recovery"),
        (name = "tokens", description = "Token balance and purchases"),
        (name = "subscription", description = "Subscription status"),
        (name = "saved-answers", description = "Premium saved answers"),
        (name = "analysis", description = "Image explanations"),
        (name = "billing", description = "Checkout and payment events"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
