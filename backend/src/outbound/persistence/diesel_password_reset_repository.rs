//! PostgreSQL-backed `PasswordResetRepository` implementation.
//!
//! Tokens are stored as SHA-256 digests. Consumption is a single conditional
//! update, so a token redeems at most once even under concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::ports::{PasswordResetRepository, PasswordResetRepositoryError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewPasswordResetRow;
use super::pool::{DbPool, PoolError};
use super::schema::password_reset_tokens;

/// Diesel-backed implementation of the `PasswordResetRepository` port.
#[derive(Clone)]
pub struct DieselPasswordResetRepository {
    pool: DbPool,
}

impl DieselPasswordResetRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PasswordResetRepositoryError {
    map_basic_pool_error(error, PasswordResetRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> PasswordResetRepositoryError {
    map_basic_diesel_error(
        error,
        PasswordResetRepositoryError::query,
        PasswordResetRepositoryError::connection,
    )
}

#[async_trait]
impl PasswordResetRepository for DieselPasswordResetRepository {
    async fn store(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PasswordResetRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewPasswordResetRow {
            token_hash,
            user_id: *user_id.as_uuid(),
            expires_at,
        };
        diesel::insert_into(password_reset_tokens::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, PasswordResetRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let user_id: Option<Uuid> = diesel::update(
            password_reset_tokens::table
                .find(token_hash)
                .filter(password_reset_tokens::used_at.is_null())
                .filter(password_reset_tokens::expires_at.gt(now)),
        )
        .set(password_reset_tokens::used_at.eq(Some(now)))
        .returning(password_reset_tokens::user_id)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
        Ok(user_id.map(UserId::from_uuid))
    }
}
