//! Port for the analysis usage log.

use async_trait::async_trait;

use crate::domain::UsageRecord;

use super::define_port_error;

define_port_error! {
    /// Errors raised by usage log adapters.
    pub enum UsageLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "usage log connection failed: {message}",
        /// Insert failed during execution.
        Query { message: String } =>
            "usage log write failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageLogRepository: Send + Sync {
    /// Append one record.
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageLogRepositoryError>;
}
