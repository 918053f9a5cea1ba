//! Usage log entries written for every analysis attempt.

use super::{PaymentSource, TokenUsage, UserId};

/// One analysis attempt, successful or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: UserId,
    pub payment_source: PaymentSource,
    pub usage: TokenUsage,
    pub cost_micro_usd: u64,
    pub tokens_charged: i64,
    pub success: bool,
}

impl UsageRecord {
    /// Record for a failed upstream call: nothing consumed, nothing charged.
    #[must_use]
    pub const fn failed(user_id: UserId, payment_source: PaymentSource) -> Self {
        Self {
            user_id,
            payment_source,
            usage: TokenUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
            },
            cost_micro_usd: 0,
            tokens_charged: 0,
            success: false,
        }
    }
}
