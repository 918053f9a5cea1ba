//! PostgreSQL-backed `UsageLogRepository` implementation.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::UsageRecord;
use crate::domain::ports::{UsageLogRepository, UsageLogRepositoryError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewUsageLogRow;
use super::pool::DbPool;
use super::schema::usage_logs;

/// Diesel-backed implementation of the `UsageLogRepository` port.
#[derive(Clone)]
pub struct DieselUsageLogRepository {
    pool: DbPool,
}

impl DieselUsageLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl UsageLogRepository for DieselUsageLogRepository {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageLogRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| map_basic_pool_error(error, UsageLogRepositoryError::connection))?;
        let row = NewUsageLogRow {
            id: Uuid::new_v4(),
            user_id: *record.user_id.as_uuid(),
            payment_source: record.payment_source.as_str(),
            prompt_tokens: saturating_i64(record.usage.prompt_tokens),
            completion_tokens: saturating_i64(record.usage.completion_tokens),
            cost_micro_usd: saturating_i64(record.cost_micro_usd),
            tokens_charged: record.tokens_charged,
            success: record.success,
        };
        diesel::insert_into(usage_logs::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|error| {
                map_basic_diesel_error(
                    error,
                    UsageLogRepositoryError::query,
                    UsageLogRepositoryError::connection,
                )
            })
    }
}
