//! PostgreSQL-backed `SubscriptionRepository` implementation.
//!
//! The daily counter rolls over lazily: a reservation first zeroes a counter
//! that belongs to an earlier UTC day, then increments it only while it is
//! below the cap. Both statements run in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::warn;
use uuid::Uuid;

use crate::domain::ports::{SubscriptionRepository, SubscriptionRepositoryError};
use crate::domain::{
    Subscription, SubscriptionStatus, SubscriptionTier, SubscriptionUpsert, UserId,
};

use super::diesel_basic_error_mapping::{
    counter_from_db, counter_to_db, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{NewSubscriptionRow, SubscriptionRow};
use super::pool::{DbPool, PoolError};
use super::schema::subscriptions;

/// Diesel-backed implementation of the `SubscriptionRepository` port.
#[derive(Clone)]
pub struct DieselSubscriptionRepository {
    pool: DbPool,
}

impl DieselSubscriptionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SubscriptionRepositoryError {
    map_basic_pool_error(error, SubscriptionRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SubscriptionRepositoryError {
    map_basic_diesel_error(
        error,
        SubscriptionRepositoryError::query,
        SubscriptionRepositoryError::connection,
    )
}

fn row_to_subscription(row: SubscriptionRow) -> Result<Subscription, SubscriptionRepositoryError> {
    let tier = row.tier.parse::<SubscriptionTier>().map_err(|err| {
        warn!(subscription_id = %row.id, %err, "unrecognised stored tier");
        SubscriptionRepositoryError::query("stored subscription tier is invalid")
    })?;
    let status = row.status.parse::<SubscriptionStatus>().map_err(|err| {
        warn!(subscription_id = %row.id, %err, "unrecognised stored status");
        SubscriptionRepositoryError::query("stored subscription status is invalid")
    })?;
    Ok(Subscription {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        external_subscription_id: row.external_subscription_id,
        tier,
        status,
        current_period_start: row.current_period_start,
        current_period_end: row.current_period_end,
        daily_usage_count: counter_from_db(row.daily_usage_count),
        daily_usage_date: row.daily_usage_date,
        created_at: row.created_at,
    })
}

#[async_trait]
impl SubscriptionRepository for DieselSubscriptionRepository {
    async fn find_current(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SubscriptionRow> = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id.as_uuid()))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let stored = rows
            .into_iter()
            .map(row_to_subscription)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Subscription::select_current(stored, now))
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        subscriptions::table
            .filter(subscriptions::external_subscription_id.eq(external_subscription_id))
            .select(SubscriptionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_subscription)
            .transpose()
    }

    async fn upsert(
        &self,
        subscription: &SubscriptionUpsert,
    ) -> Result<Subscription, SubscriptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewSubscriptionRow {
            id: Uuid::new_v4(),
            user_id: *subscription.user_id.as_uuid(),
            external_subscription_id: &subscription.external_subscription_id,
            tier: subscription.tier.as_str(),
            status: subscription.status.as_str(),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
        };
        let stored: SubscriptionRow = diesel::insert_into(subscriptions::table)
            .values(&row)
            .on_conflict(subscriptions::external_subscription_id)
            .do_update()
            .set((
                subscriptions::tier.eq(excluded(subscriptions::tier)),
                subscriptions::status.eq(excluded(subscriptions::status)),
                subscriptions::current_period_start
                    .eq(excluded(subscriptions::current_period_start)),
                subscriptions::current_period_end.eq(excluded(subscriptions::current_period_end)),
            ))
            .returning(SubscriptionRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_subscription(stored)
    }

    async fn update_status(
        &self,
        external_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool, SubscriptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            subscriptions::table
                .filter(subscriptions::external_subscription_id.eq(external_subscription_id)),
        )
        .set(subscriptions::status.eq(status.as_str()))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn reserve_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
        cap: u32,
    ) -> Result<bool, SubscriptionRepositoryError> {
        let cap = counter_to_db(cap);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                diesel::update(
                    subscriptions::table.find(id).filter(
                        subscriptions::daily_usage_date
                            .is_null()
                            .or(subscriptions::daily_usage_date.ne(today)),
                    ),
                )
                .set((
                    subscriptions::daily_usage_count.eq(0),
                    subscriptions::daily_usage_date.eq(Some(today)),
                ))
                .execute(conn)
                .await?;

                let reserved = diesel::update(
                    subscriptions::table
                        .find(id)
                        .filter(subscriptions::daily_usage_date.eq(today))
                        .filter(subscriptions::daily_usage_count.lt(cap)),
                )
                .set(subscriptions::daily_usage_count.eq(subscriptions::daily_usage_count + 1))
                .execute(conn)
                .await?;
                Ok(reserved > 0)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn release_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<(), SubscriptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            subscriptions::table
                .find(id)
                .filter(subscriptions::daily_usage_date.eq(today))
                .filter(subscriptions::daily_usage_count.gt(0)),
        )
        .set(subscriptions::daily_usage_count.eq(subscriptions::daily_usage_count - 1))
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }
}
