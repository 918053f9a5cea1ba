//! Account identity and balances.
//!
//! An [`Account`] owns the free-answer allowance and the token balance that
//! pay for explanations. Passwords never leave the domain in clear text: the
//! stored form is an opaque [`PasswordHash`] whose `Debug` output is redacted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Subscription, SubscriptionStatus, SubscriptionTier};

/// Maximum accepted email length, matching the SMTP path limit.
pub const EMAIL_MAX_LEN: usize = 254;

/// Validation errors raised while constructing account primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountValidationError {
    #[error("user id must be a valid UUID")]
    InvalidId,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email must be at most {max} characters")]
    EmailTooLong { max: usize },
    #[error("email must look like name@example.com")]
    MalformedEmail,
}

/// Stable user identifier stored as a UUID.
///
/// # Examples
/// ```
/// use backend::domain::UserId;
///
/// let id = UserId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");
/// assert_eq!(id.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, format = Uuid)]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from its string form.
    pub fn new(id: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let raw = id.as_ref();
        if raw.trim() != raw {
            return Err(AccountValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AccountValidationError::InvalidId)
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for UserId {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.to_string()
    }
}

/// Normalised email address used as the login identifier.
///
/// Input is trimmed and lower-cased so lookups are case-insensitive.
///
/// # Examples
/// ```
/// use backend::domain::Email;
///
/// let email = Email::new("  Ada@Example.COM ").expect("valid email");
/// assert_eq!(email.as_ref(), "ada@example.com");
/// assert!(Email::new("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, format = "email")]
pub struct Email(String);

impl Email {
    /// Validate and normalise an email address.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let normalised = raw.as_ref().trim().to_lowercase();
        if normalised.is_empty() {
            return Err(AccountValidationError::EmptyEmail);
        }
        if normalised.chars().count() > EMAIL_MAX_LEN {
            return Err(AccountValidationError::EmailTooLong { max: EMAIL_MAX_LEN });
        }
        if !is_plausible_email(&normalised) {
            return Err(AccountValidationError::MalformedEmail);
        }
        Ok(Self(normalised))
    }
}

fn is_plausible_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !host.starts_with('.') && tld.len() >= 2
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

/// Stored password hash in the `hex(salt):hex(key)` format.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an encoded hash produced by a [`crate::domain::ports::PasswordHasher`].
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded form for persistence and verification.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Registered account with its balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub email: Email,
    pub password_hash: PasswordHash,
    /// Prepaid tokens; never negative.
    pub token_balance: i64,
    /// Free answers left in the current calendar month.
    pub free_answers_remaining: u32,
    /// Instant of the most recent monthly free-answer reset.
    pub free_answers_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create an account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub id: UserId,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub free_answers_remaining: u32,
    pub free_answers_reset_at: DateTime<Utc>,
}

/// Client view of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: UserId,
    pub email: Email,
    pub token_balance: i64,
    pub free_answers_remaining: u32,
    pub free_answers_reset_at: DateTime<Utc>,
    pub is_premium: bool,
    pub subscription_tier: Option<SubscriptionTier>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub created_at: DateTime<Utc>,
}

impl AccountProfile {
    /// Combine an account with its current subscription at `now`.
    #[must_use]
    pub fn at(account: &Account, subscription: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            token_balance: account.token_balance,
            free_answers_remaining: account.free_answers_remaining,
            free_answers_reset_at: account.free_answers_reset_at,
            is_premium: subscription.is_some_and(|sub| sub.is_premium(now)),
            subscription_tier: subscription.map(|sub| sub.tier),
            subscription_status: subscription.map(|sub| sub.status),
            created_at: account.created_at,
        }
    }
}
