//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    AccountCommand, AccountQuery, AnalysisCommand, BillingCommand, SavedAnswerCommand,
    SavedAnswerQuery, SubscriptionQuery, TokenCommand, TokenQuery,
};

/// Dependency bundle for HTTP handlers.
///
/// One service usually backs both halves of a command/query pair; the
/// server wiring casts the same `Arc` to each trait object.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<dyn AccountCommand>,
    pub accounts_query: Arc<dyn AccountQuery>,
    pub tokens: Arc<dyn TokenCommand>,
    pub tokens_query: Arc<dyn TokenQuery>,
    pub subscriptions: Arc<dyn SubscriptionQuery>,
    pub saved_answers: Arc<dyn SavedAnswerCommand>,
    pub saved_answers_query: Arc<dyn SavedAnswerQuery>,
    pub analysis: Arc<dyn AnalysisCommand>,
    pub billing: Arc<dyn BillingCommand>,
}
