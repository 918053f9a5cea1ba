//! Driving ports for saved answers.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Error, NewSavedAnswer, SavedAnswer, UserId};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SavedAnswerCommand: Send + Sync {
    /// Save an answer.
    ///
    /// # Errors
    /// `forbidden` without premium access.
    async fn create(&self, user_id: &UserId, answer: NewSavedAnswer)
    -> Result<SavedAnswer, Error>;

    /// Delete an owned answer.
    ///
    /// # Errors
    /// `not_found` for missing or foreign answers.
    async fn delete(&self, user_id: &UserId, id: Uuid) -> Result<(), Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SavedAnswerQuery: Send + Sync {
    /// Owned answers, newest first.
    async fn list(&self, user_id: &UserId) -> Result<Vec<SavedAnswer>, Error>;

    /// One owned answer.
    ///
    /// # Errors
    /// `not_found` for missing or foreign answers.
    async fn get(&self, user_id: &UserId, id: Uuid) -> Result<SavedAnswer, Error>;
}
