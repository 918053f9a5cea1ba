//! PostgreSQL-backed `TokenPurchaseRepository` implementation.
//!
//! Recording and crediting happen in one transaction keyed on the unique
//! external payment id: a redelivered webhook inserts nothing and therefore
//! credits nothing.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{TokenPurchaseRepository, TokenPurchaseRepositoryError};
use crate::domain::{NewTokenPurchase, PurchaseOutcome, TokenPurchase, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewTokenPurchaseRow, TokenPurchaseRow};
use super::pool::{DbPool, PoolError};
use super::schema::{token_purchases, users};

/// Diesel-backed implementation of the `TokenPurchaseRepository` port.
#[derive(Clone)]
pub struct DieselTokenPurchaseRepository {
    pool: DbPool,
}

impl DieselTokenPurchaseRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> TokenPurchaseRepositoryError {
    map_basic_pool_error(error, TokenPurchaseRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> TokenPurchaseRepositoryError {
    map_basic_diesel_error(
        error,
        TokenPurchaseRepositoryError::query,
        TokenPurchaseRepositoryError::connection,
    )
}

impl From<TokenPurchaseRow> for TokenPurchase {
    fn from(row: TokenPurchaseRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            tokens: row.tokens,
            price_cents: row.price_cents,
            currency: row.currency,
            external_payment_id: row.external_payment_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TokenPurchaseRepository for DieselTokenPurchaseRepository {
    async fn record_purchase(
        &self,
        purchase: &NewTokenPurchase,
    ) -> Result<PurchaseOutcome, TokenPurchaseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let user_id = *purchase.user_id.as_uuid();
        let row = NewTokenPurchaseRow {
            id: Uuid::new_v4(),
            user_id,
            tokens: purchase.tokens,
            price_cents: purchase.price_cents,
            currency: &purchase.currency,
            external_payment_id: &purchase.external_payment_id,
        };
        let tokens = purchase.tokens;
        conn.transaction(|conn| {
            async move {
                let inserted = diesel::insert_into(token_purchases::table)
                    .values(&row)
                    .on_conflict(token_purchases::external_payment_id)
                    .do_nothing()
                    .execute(conn)
                    .await?;
                if inserted == 0 {
                    return Ok(PurchaseOutcome::AlreadyRecorded);
                }
                let balance: i64 = diesel::update(users::table.find(user_id))
                    .set(users::token_balance.eq(users::token_balance + tokens))
                    .returning(users::token_balance)
                    .get_result(conn)
                    .await?;
                Ok(PurchaseOutcome::Credited { balance })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TokenPurchase>, TokenPurchaseRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<TokenPurchaseRow> = token_purchases::table
            .filter(token_purchases::user_id.eq(user_id.as_uuid()))
            .order(token_purchases::created_at.desc())
            .select(TokenPurchaseRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(TokenPurchase::from).collect())
    }
}
