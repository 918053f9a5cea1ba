//! Driving ports for the account lifecycle.
//!
//! HTTP handlers call [`AccountCommand`] to register, sign in, change or
//! delete accounts and to run the password reset flow, and [`AccountQuery`]
//! to read the signed-in profile.

use async_trait::async_trait;

use crate::domain::{
    AccountProfile, Email, Error, LoginCredentials, NewPassword, ProfileUpdate, Registration,
    UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountCommand: Send + Sync {
    /// Create an account with the monthly free-answer allowance.
    ///
    /// # Errors
    /// `conflict` when the email is taken.
    async fn register(&self, registration: Registration) -> Result<AccountProfile, Error>;

    /// Check credentials and apply any due monthly reset.
    ///
    /// # Errors
    /// `unauthorized` for an unknown email or a wrong password alike.
    async fn authenticate(&self, credentials: LoginCredentials) -> Result<AccountProfile, Error>;

    /// Change email and/or password.
    ///
    /// # Errors
    /// `forbidden` when a new password is given without the correct current
    /// one; `conflict` when the new email is taken.
    async fn update_profile(
        &self,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<AccountProfile, Error>;

    /// Remove the account and everything it owns.
    async fn delete_account(&self, user_id: &UserId) -> Result<(), Error>;

    /// Email a single-use reset link if the address belongs to an account.
    ///
    /// Succeeds whether or not the address is known.
    async fn request_password_reset(&self, email: &Email) -> Result<(), Error>;

    /// Set a new password using a reset token.
    ///
    /// # Errors
    /// `invalid_request` for unknown, used or expired tokens.
    async fn reset_password(&self, token: &str, password: NewPassword) -> Result<(), Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountQuery: Send + Sync {
    /// Profile of the signed-in user.
    ///
    /// # Errors
    /// `unauthorized` when the account no longer exists.
    async fn current_user(&self, user_id: &UserId) -> Result<AccountProfile, Error>;
}
