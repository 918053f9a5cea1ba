//! Domain primitives, entitlement rules and services.
//!
//! Purpose: define strongly typed entities used by the HTTP and persistence
//! adapters, the pure entitlement engine that meters explanations, and the
//! services implementing the driving ports declared in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`): API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`): stable error identifier.
//! - Account, Subscription, TokenPurchase, SavedAnswer: stored aggregates.
//! - resolve / cost_of: entitlement decision and pricing.
//! - *Service: driving port implementations wired by the server.

pub mod account;
mod account_service;
pub mod analysis;
mod analysis_service;
pub mod auth;
pub mod billing;
mod billing_service;
pub mod entitlement;
pub mod error;
pub mod ports;
pub mod saved_answer;
mod saved_answer_service;
mod service_support;
pub mod subscription;
mod subscription_service;
mod token_service;
pub mod trace_id;
pub mod usage;

pub use self::account::{
    Account, AccountProfile, AccountValidationError, EMAIL_MAX_LEN, Email, NewAccount,
    PasswordHash, UserId,
};
pub use self::account_service::{AccountService, RESET_TOKEN_TTL};
pub use self::analysis::{
    AnalysisImage, AnalysisInput, AnalysisIntent, AnalysisOutcome, AnalysisValidationError,
    DEFAULT_LANGUAGE, Explanation, ImageSource, Language, MAX_IMAGE_BYTES, RemainingBalances,
};
pub use self::analysis_service::AnalysisService;
pub use self::auth::{
    CredentialsValidationError, LoginCredentials, NewPassword, PASSWORD_MAX_LEN,
    PASSWORD_MIN_LEN, ProfileUpdate, Registration,
};
pub use self::billing::{
    CheckoutItem, CheckoutRequest, CheckoutSession, NewTokenPurchase, PaymentEvent,
    PurchaseOutcome, SubscriptionChange, TOKEN_PACKAGES, TokenPackage, TokenPurchase,
};
pub use self::billing_service::{BillingService, CheckoutSettings};
pub use self::entitlement::{
    Cost, DenialReason, EntitlementDecision, EntitlementSnapshot, FREE_ANSWERS_PER_MONTH,
    PaymentSource, PricingPolicy, TokenUsage, apply_monthly_reset, cost_of, month_start,
    needs_monthly_reset, resolve,
};
pub use self::error::{Error, ErrorCode};
pub use self::saved_answer::{
    ContentType, NewSavedAnswer, SavedAnswer, SavedAnswerValidationError, TITLE_MAX_LEN,
};
pub use self::saved_answer_service::SavedAnswerService;
pub use self::subscription::{
    Subscription, SubscriptionStatus, SubscriptionSummary, SubscriptionTier, SubscriptionUpsert,
    UnknownLabel,
};
pub use self::subscription_service::SubscriptionService;
pub use self::token_service::TokenService;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::usage::UsageRecord;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
