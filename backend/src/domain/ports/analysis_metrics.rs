//! Port for recording analysis outcomes.
//!
//! Lets operators watch how explanations are paid for and how often they are
//! refused or fail, without coupling the domain to a metrics backend.

use async_trait::async_trait;

use crate::domain::PaymentSource;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording analysis metrics.
    pub enum AnalysisMetricsError {
        /// Metric exporter rejected the write.
        Export { message: String } => "analysis metrics exporter failed: {message}",
    }
}

/// Final state of one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcomeKind {
    Succeeded,
    UpstreamFailed,
    Denied,
}

impl AnalysisOutcomeKind {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::UpstreamFailed => "upstream_failed",
            Self::Denied => "denied",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisMetrics: Send + Sync {
    /// Record one outcome. `source` is `None` when the request was denied.
    async fn record(
        &self,
        outcome: AnalysisOutcomeKind,
        source: Option<PaymentSource>,
        tokens_charged: i64,
    ) -> Result<(), AnalysisMetricsError>;
}

/// No-op implementation for when metrics are disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAnalysisMetrics;

#[async_trait]
impl AnalysisMetrics for NoOpAnalysisMetrics {
    async fn record(
        &self,
        _outcome: AnalysisOutcomeKind,
        _source: Option<PaymentSource>,
        _tokens_charged: i64,
    ) -> Result<(), AnalysisMetricsError> {
        Ok(())
    }
}
