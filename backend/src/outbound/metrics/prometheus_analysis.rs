//! Prometheus adapter for analysis outcome metrics.
//!
//! Counters are registered with the registry that backs `/metrics`.

use async_trait::async_trait;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::domain::PaymentSource;
use crate::domain::ports::{AnalysisMetrics, AnalysisMetricsError, AnalysisOutcomeKind};

/// Prometheus-backed analysis metrics recorder.
///
/// # Metrics
///
/// - `snapwise_analysis_requests_total` (counter), labels:
///   - `outcome`: `succeeded`, `upstream_failed`, or `denied`
///   - `payment_source`: `free_answer`, `tokens`, `subscription`, or `none`
/// - `snapwise_tokens_charged_total` (counter): tokens deducted for
///   successful token-paid explanations.
pub struct PrometheusAnalysisMetrics {
    requests_total: IntCounterVec,
    tokens_charged_total: IntCounter,
}

impl PrometheusAnalysisMetrics {
    /// Create and register the counters.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "snapwise_analysis_requests_total",
                "Analysis requests by outcome and payment source",
            ),
            &["outcome", "payment_source"],
        )?;
        let tokens_charged_total = IntCounter::new(
            "snapwise_tokens_charged_total",
            "Tokens charged for explanations",
        )?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(tokens_charged_total.clone()))?;
        Ok(Self {
            requests_total,
            tokens_charged_total,
        })
    }
}

#[async_trait]
impl AnalysisMetrics for PrometheusAnalysisMetrics {
    async fn record(
        &self,
        outcome: AnalysisOutcomeKind,
        source: Option<PaymentSource>,
        tokens_charged: i64,
    ) -> Result<(), AnalysisMetricsError> {
        let source = source.map_or("none", PaymentSource::as_str);
        self.requests_total
            .with_label_values(&[outcome.as_str(), source])
            .inc();
        if let Ok(tokens) = u64::try_from(tokens_charged) {
            self.tokens_charged_total.inc_by(tokens);
        }
        Ok(())
    }
}
