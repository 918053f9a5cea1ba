//! PostgreSQL-backed `SavedAnswerRepository` implementation.
//!
//! Every lookup is scoped by owner, so a foreign id behaves exactly like a
//! missing one.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;
use uuid::Uuid;

use crate::domain::ports::{SavedAnswerRepository, SavedAnswerRepositoryError};
use crate::domain::{ContentType, NewSavedAnswer, SavedAnswer, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewSavedAnswerRow, SavedAnswerRow};
use super::pool::{DbPool, PoolError};
use super::schema::saved_answers;

/// Diesel-backed implementation of the `SavedAnswerRepository` port.
#[derive(Clone)]
pub struct DieselSavedAnswerRepository {
    pool: DbPool,
}

impl DieselSavedAnswerRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SavedAnswerRepositoryError {
    map_basic_pool_error(error, SavedAnswerRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SavedAnswerRepositoryError {
    map_basic_diesel_error(
        error,
        SavedAnswerRepositoryError::query,
        SavedAnswerRepositoryError::connection,
    )
}

fn row_to_saved_answer(row: SavedAnswerRow) -> Result<SavedAnswer, SavedAnswerRepositoryError> {
    let content_type = row.content_type.parse::<ContentType>().map_err(|err| {
        warn!(answer_id = %row.id, %err, "unrecognised stored content type");
        SavedAnswerRepositoryError::query("stored content type is invalid")
    })?;
    Ok(SavedAnswer {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        content_type,
        title: row.title,
        payload: row.payload,
        image_url: row.image_url,
        created_at: row.created_at,
    })
}

#[async_trait]
impl SavedAnswerRepository for DieselSavedAnswerRepository {
    async fn insert(
        &self,
        user_id: &UserId,
        answer: &NewSavedAnswer,
    ) -> Result<SavedAnswer, SavedAnswerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewSavedAnswerRow {
            id: Uuid::new_v4(),
            user_id: *user_id.as_uuid(),
            content_type: answer.content_type.as_str(),
            title: &answer.title,
            payload: &answer.payload,
            image_url: answer.image_url.as_deref(),
        };
        let stored: SavedAnswerRow = diesel::insert_into(saved_answers::table)
            .values(&row)
            .returning(SavedAnswerRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_saved_answer(stored)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SavedAnswer>, SavedAnswerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SavedAnswerRow> = saved_answers::table
            .filter(saved_answers::user_id.eq(user_id.as_uuid()))
            .order(saved_answers::created_at.desc())
            .select(SavedAnswerRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_saved_answer).collect()
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<Option<SavedAnswer>, SavedAnswerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        saved_answers::table
            .filter(saved_answers::id.eq(id))
            .filter(saved_answers::user_id.eq(user_id.as_uuid()))
            .select(SavedAnswerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(row_to_saved_answer)
            .transpose()
    }

    async fn delete_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<bool, SavedAnswerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            saved_answers::table
                .filter(saved_answers::id.eq(id))
                .filter(saved_answers::user_id.eq(user_id.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}
