//! Saved answer service.
//!
//! Creating a saved answer is a premium feature. Listing, reading and
//! deleting stay available to the owner after a subscription lapses so
//! previously saved work is not stranded.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    SavedAnswerCommand, SavedAnswerQuery, SavedAnswerRepository, SubscriptionRepository,
};
use crate::domain::service_support::{map_saved_answer_error, map_subscription_error};
use crate::domain::{Error, NewSavedAnswer, SavedAnswer, UserId};

/// Saved answer service implementing [`SavedAnswerCommand`] and
/// [`SavedAnswerQuery`].
#[derive(Clone)]
pub struct SavedAnswerService<R, S> {
    answers: Arc<R>,
    subscriptions: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<R, S> SavedAnswerService<R, S> {
    /// Create a new service with the given repositories.
    pub fn new(answers: Arc<R>, subscriptions: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            answers,
            subscriptions,
            clock,
        }
    }
}

fn not_found() -> Error {
    Error::not_found("saved answer not found")
}

#[async_trait]
impl<R, S> SavedAnswerCommand for SavedAnswerService<R, S>
where
    R: SavedAnswerRepository,
    S: SubscriptionRepository,
{
    async fn create(&self, user_id: &UserId, answer: NewSavedAnswer) -> Result<SavedAnswer, Error> {
        let now = self.clock.utc();
        let premium = self
            .subscriptions
            .find_current(user_id, now)
            .await
            .map_err(map_subscription_error)?
            .is_some_and(|subscription| subscription.is_premium(now));
        if !premium {
            return Err(Error::forbidden(
                "saving answers requires an active subscription",
            ));
        }
        let saved = self
            .answers
            .insert(user_id, &answer)
            .await
            .map_err(map_saved_answer_error)?;
        debug!(user_id = %user_id, answer_id = %saved.id, "saved answer created");
        Ok(saved)
    }

    async fn delete(&self, user_id: &UserId, id: Uuid) -> Result<(), Error> {
        let deleted = self
            .answers
            .delete_for_user(user_id, id)
            .await
            .map_err(map_saved_answer_error)?;
        if deleted { Ok(()) } else { Err(not_found()) }
    }
}

#[async_trait]
impl<R, S> SavedAnswerQuery for SavedAnswerService<R, S>
where
    R: SavedAnswerRepository,
    S: SubscriptionRepository,
{
    async fn list(&self, user_id: &UserId) -> Result<Vec<SavedAnswer>, Error> {
        self.answers
            .list_for_user(user_id)
            .await
            .map_err(map_saved_answer_error)
    }

    async fn get(&self, user_id: &UserId, id: Uuid) -> Result<SavedAnswer, Error> {
        self.answers
            .find_for_user(user_id, id)
            .await
            .map_err(map_saved_answer_error)?
            .ok_or_else(not_found)
    }
}
