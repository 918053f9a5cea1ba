//! Driving port for image analysis.

use async_trait::async_trait;

use crate::domain::{AnalysisInput, AnalysisOutcome, Error, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisCommand: Send + Sync {
    /// Explain an image, paying from the first available entitlement.
    ///
    /// # Errors
    /// `payment_required` when nothing can pay; `internal` when the model
    /// fails, after the reservation has been released.
    async fn analyze(&self, user_id: &UserId, input: AnalysisInput)
    -> Result<AnalysisOutcome, Error>;
}
