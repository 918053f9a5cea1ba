//! Port for saved answer persistence.
//!
//! Every lookup is scoped by owner. Adapters never expose another user's
//! rows; a foreign id behaves exactly like a missing one.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewSavedAnswer, SavedAnswer, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by saved answer repository adapters.
    pub enum SavedAnswerRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "saved answer repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "saved answer repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SavedAnswerRepository: Send + Sync {
    async fn insert(
        &self,
        user_id: &UserId,
        answer: &NewSavedAnswer,
    ) -> Result<SavedAnswer, SavedAnswerRepositoryError>;

    /// Answers owned by the user, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SavedAnswer>, SavedAnswerRepositoryError>;

    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<Option<SavedAnswer>, SavedAnswerRepositoryError>;

    /// Delete an owned answer. Returns whether a row was removed.
    async fn delete_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<bool, SavedAnswerRepositoryError>;
}
