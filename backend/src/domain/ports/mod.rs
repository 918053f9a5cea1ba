//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`*Command`, `*Query`) are implemented by domain services
//! and consumed by inbound adapters. Driven ports (repositories, gateways)
//! are implemented by outbound adapters and consumed by services.

mod macros;
pub(crate) use macros::define_port_error;

mod account_command;
mod account_repository;
mod analysis_command;
mod analysis_metrics;
mod billing_command;
mod mailer;
mod password_hasher;
mod password_reset_repository;
mod payment_gateway;
mod saved_answer_command;
mod saved_answer_repository;
mod subscription_query;
mod subscription_repository;
mod token_ledger;
mod token_purchase_repository;
mod usage_log_repository;
mod vision_model;

pub use account_command::{AccountCommand, AccountQuery};
#[cfg(test)]
pub use account_command::{MockAccountCommand, MockAccountQuery};
#[cfg(test)]
pub use account_repository::MockAccountRepository;
pub use account_repository::{AccountRepository, AccountRepositoryError, TokenCharge};
pub use analysis_command::AnalysisCommand;
#[cfg(test)]
pub use analysis_command::MockAnalysisCommand;
#[cfg(test)]
pub use analysis_metrics::MockAnalysisMetrics;
pub use analysis_metrics::{
    AnalysisMetrics, AnalysisMetricsError, AnalysisOutcomeKind, NoOpAnalysisMetrics,
};
pub use billing_command::BillingCommand;
#[cfg(test)]
pub use billing_command::MockBillingCommand;
#[cfg(test)]
pub use mailer::MockMailer;
pub use mailer::{LoggingMailer, Mailer, MailerError};
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHasher, PasswordHasherError};
#[cfg(test)]
pub use password_reset_repository::MockPasswordResetRepository;
pub use password_reset_repository::{PasswordResetRepository, PasswordResetRepositoryError};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{PaymentGateway, PaymentGatewayError, UnconfiguredPaymentGateway};
pub use saved_answer_command::{SavedAnswerCommand, SavedAnswerQuery};
#[cfg(test)]
pub use saved_answer_command::{MockSavedAnswerCommand, MockSavedAnswerQuery};
#[cfg(test)]
pub use saved_answer_repository::MockSavedAnswerRepository;
pub use saved_answer_repository::{SavedAnswerRepository, SavedAnswerRepositoryError};
#[cfg(test)]
pub use subscription_query::MockSubscriptionQuery;
pub use subscription_query::SubscriptionQuery;
#[cfg(test)]
pub use subscription_repository::MockSubscriptionRepository;
pub use subscription_repository::{SubscriptionRepository, SubscriptionRepositoryError};
pub use token_ledger::{TokenBalance, TokenCommand, TokenQuery};
#[cfg(test)]
pub use token_ledger::{MockTokenCommand, MockTokenQuery};
#[cfg(test)]
pub use token_purchase_repository::MockTokenPurchaseRepository;
pub use token_purchase_repository::{TokenPurchaseRepository, TokenPurchaseRepositoryError};
#[cfg(test)]
pub use usage_log_repository::MockUsageLogRepository;
pub use usage_log_repository::{UsageLogRepository, UsageLogRepositoryError};
#[cfg(test)]
pub use vision_model::MockVisionModel;
pub use vision_model::{
    FIXTURE_USAGE, FixtureVisionModel, VisionModel, VisionModelError, VisionRequest,
    VisionResponse,
};
