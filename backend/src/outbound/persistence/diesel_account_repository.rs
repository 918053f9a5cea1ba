//! PostgreSQL-backed `AccountRepository` implementation using Diesel ORM.
//!
//! Balance mutations are single conditional statements so concurrent requests
//! cannot overdraw: the `WHERE` clause re-checks the balance the domain
//! resolved against, and an unmatched row means the race was lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::warn;

use crate::domain::ports::{AccountRepository, AccountRepositoryError, TokenCharge};
use crate::domain::{Account, Email, NewAccount, PasswordHash, UserId};

use super::diesel_basic_error_mapping::{
    counter_from_db, counter_to_db, is_unique_violation, map_basic_diesel_error,
    map_basic_pool_error,
};
use super::models::{AccountRow, NewAccountRow};
use super::pool::{DbPool, PoolError};
use super::schema::users;

const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Diesel-backed implementation of the `AccountRepository` port.
#[derive(Clone)]
pub struct DieselAccountRepository {
    pool: DbPool,
}

impl DieselAccountRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> AccountRepositoryError {
    map_basic_pool_error(error, AccountRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> AccountRepositoryError {
    if is_unique_violation(&error, Some(EMAIL_CONSTRAINT)) {
        return AccountRepositoryError::duplicate_email();
    }
    map_basic_diesel_error(
        error,
        AccountRepositoryError::query,
        AccountRepositoryError::connection,
    )
}

fn row_to_account(row: AccountRow) -> Result<Account, AccountRepositoryError> {
    let email = Email::new(&row.email).map_err(|err| {
        warn!(user_id = %row.id, %err, "stored email failed validation");
        AccountRepositoryError::query("stored email is invalid")
    })?;
    Ok(Account {
        id: UserId::from_uuid(row.id),
        email,
        password_hash: PasswordHash::new(row.password_hash),
        token_balance: row.token_balance,
        free_answers_remaining: counter_from_db(row.free_answers_remaining),
        free_answers_reset_at: row.free_answers_reset_at,
        created_at: row.created_at,
    })
}

#[async_trait]
impl AccountRepository for DieselAccountRepository {
    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewAccountRow {
            id: *account.id.as_uuid(),
            email: account.email.as_ref(),
            password_hash: account.password_hash.as_str(),
            free_answers_remaining: counter_to_db(account.free_answers_remaining),
            free_answers_reset_at: account.free_answers_reset_at,
        };
        let stored: AccountRow = diesel::insert_into(users::table)
            .values(&row)
            .returning(AccountRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_account(stored)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .find(*id.as_uuid())
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_account)
            .transpose()
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::email.eq(email.as_ref()))
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_account)
            .transpose()
    }

    async fn update_email(&self, id: &UserId, email: &Email) -> Result<(), AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(users::table.find(*id.as_uuid()))
            .set(users::email.eq(email.as_ref()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn update_password_hash(
        &self,
        id: &UserId,
        hash: &PasswordHash,
    ) -> Result<(), AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(users::table.find(*id.as_uuid()))
            .set(users::password_hash.eq(hash.as_str()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn delete(&self, id: &UserId) -> Result<bool, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(users::table.find(*id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn reset_free_answers(
        &self,
        id: &UserId,
        allowance: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            users::table
                .find(*id.as_uuid())
                .filter(users::free_answers_reset_at.lt(period_start)),
        )
        .set((
            users::free_answers_remaining.eq(counter_to_db(allowance)),
            users::free_answers_reset_at.eq(now),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn consume_free_answer(&self, id: &UserId) -> Result<bool, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            users::table
                .find(*id.as_uuid())
                .filter(users::free_answers_remaining.gt(0)),
        )
        .set(users::free_answers_remaining.eq(users::free_answers_remaining - 1))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn restore_free_answer(
        &self,
        id: &UserId,
        allowance: u32,
    ) -> Result<(), AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            users::table
                .find(*id.as_uuid())
                .filter(users::free_answers_remaining.lt(counter_to_db(allowance))),
        )
        .set(users::free_answers_remaining.eq(users::free_answers_remaining + 1))
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }

    async fn deduct_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<Option<i64>, AccountRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            users::table
                .find(*id.as_uuid())
                .filter(users::token_balance.ge(amount)),
        )
        .set(users::token_balance.eq(users::token_balance - amount))
        .returning(users::token_balance)
        .get_result::<i64>(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)
    }

    async fn charge_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<TokenCharge, AccountRepositoryError> {
        let user_id = *id.as_uuid();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let balance: i64 = users::table
                    .find(user_id)
                    .select(users::token_balance)
                    .for_update()
                    .first(conn)
                    .await?;
                let charged = amount.clamp(0, balance.max(0));
                let balance: i64 = diesel::update(users::table.find(user_id))
                    .set(users::token_balance.eq(users::token_balance - charged))
                    .returning(users::token_balance)
                    .get_result(conn)
                    .await?;
                Ok(TokenCharge { charged, balance })
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}
