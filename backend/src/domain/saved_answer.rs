//! Saved explanations kept by premium users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::UserId;

/// Longest accepted title, in characters.
pub const TITLE_MAX_LEN: usize = 200;

/// Kind of content a saved answer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// An explanation returned by `/api/analyze`.
    Analysis,
    /// Free-form user notes.
    Note,
}

impl ContentType {
    /// Stable storage identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Note => "note",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = super::UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(Self::Analysis),
            "note" => Ok(Self::Note),
            other => Err(super::UnknownLabel {
                kind: "content type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Validation errors for saved answers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SavedAnswerValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },
    #[error("payload must be a JSON object")]
    PayloadNotObject,
}

/// A stored explanation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswer {
    pub id: Uuid,
    #[serde(skip)]
    #[schema(ignore)]
    pub user_id: UserId,
    pub content_type: ContentType,
    pub title: String,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new saved answer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSavedAnswer {
    pub content_type: ContentType,
    pub title: String,
    pub payload: Value,
    pub image_url: Option<String>,
}

impl NewSavedAnswer {
    /// Validate raw inputs, trimming the title.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{ContentType, NewSavedAnswer};
    /// use serde_json::json;
    ///
    /// let answer = NewSavedAnswer::try_new(
    ///     ContentType::Analysis,
    ///     "  Heron  ",
    ///     json!({ "summary": "A grey heron" }),
    ///     None,
    /// )
    /// .expect("valid answer");
    /// assert_eq!(answer.title, "Heron");
    /// ```
    pub fn try_new(
        content_type: ContentType,
        title: &str,
        payload: Value,
        image_url: Option<String>,
    ) -> Result<Self, SavedAnswerValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SavedAnswerValidationError::EmptyTitle);
        }
        if title.chars().count() > TITLE_MAX_LEN {
            return Err(SavedAnswerValidationError::TitleTooLong { max: TITLE_MAX_LEN });
        }
        if !payload.is_object() {
            return Err(SavedAnswerValidationError::PayloadNotObject);
        }
        Ok(Self {
            content_type,
            title: title.to_owned(),
            payload,
            image_url: image_url.filter(|url| !url.trim().is_empty()),
        })
    }
}
