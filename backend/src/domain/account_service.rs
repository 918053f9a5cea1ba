//! Account lifecycle service: registration, sign-in, profile changes,
//! deletion and password reset.
//!
//! Sign-in is also where the monthly free-answer allowance is topped up, so a
//! returning user sees a fresh allowance as soon as they log in.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use mockable::Clock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use crate::domain::ports::{
    AccountCommand, AccountQuery, AccountRepository, Mailer, PasswordHasher, PasswordHasherError,
    PasswordResetRepository, SubscriptionRepository,
};
use crate::domain::service_support::{
    load_account, map_account_error, map_reset_error, map_subscription_error,
    refresh_monthly_allowance,
};
use crate::domain::{
    Account, AccountProfile, Email, Error, FREE_ANSWERS_PER_MONTH, LoginCredentials,
    NewAccount, NewPassword, PasswordHash, ProfileUpdate, Registration, UserId,
};

/// Lifetime of a password reset link.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

const RESET_TOKEN_BYTES: usize = 32;
const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Account service implementing [`AccountCommand`] and [`AccountQuery`].
#[derive(Clone)]
pub struct AccountService<A, S, R> {
    accounts: Arc<A>,
    subscriptions: Arc<S>,
    resets: Arc<R>,
    hasher: Arc<dyn PasswordHasher>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    public_base_url: Url,
}

impl<A, S, R> AccountService<A, S, R> {
    /// Create a new service.
    ///
    /// `public_base_url` is the client origin used to build password reset
    /// links.
    pub fn new(
        accounts: Arc<A>,
        subscriptions: Arc<S>,
        resets: Arc<R>,
        hasher: Arc<dyn PasswordHasher>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        public_base_url: Url,
    ) -> Self {
        Self {
            accounts,
            subscriptions,
            resets,
            hasher,
            mailer,
            clock,
            public_base_url,
        }
    }
}

/// SHA-256 hex digest under which a reset token is stored.
#[must_use]
pub(crate) fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_reset_token() -> String {
    let mut bytes = [0_u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn map_hasher_error(error: PasswordHasherError) -> Error {
    Error::internal(format!("password hashing failed: {error}"))
}

impl<A, S, R> AccountService<A, S, R>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    R: PasswordResetRepository,
{
    async fn profile_for(&self, account: &Account) -> Result<AccountProfile, Error> {
        let now = self.clock.utc();
        let subscription = self
            .subscriptions
            .find_current(&account.id, now)
            .await
            .map_err(map_subscription_error)?;
        Ok(AccountProfile::at(account, subscription.as_ref(), now))
    }

    async fn hash_password(&self, password: &NewPassword) -> Result<PasswordHash, Error> {
        self.hasher
            .hash(password.expose())
            .await
            .map_err(map_hasher_error)
    }

    async fn verify_password(&self, password: &str, account: &Account) -> Result<bool, Error> {
        self.hasher
            .verify(password, &account.password_hash)
            .await
            .map_err(map_hasher_error)
    }

    fn reset_link(&self, token: &str) -> Result<Url, Error> {
        let mut link = self.public_base_url.clone();
        link.path_segments_mut()
            .map_err(|()| Error::internal("public base URL cannot carry a path"))?
            .pop_if_empty()
            .push("reset-password");
        link.query_pairs_mut().append_pair("token", token);
        Ok(link)
    }

    async fn change_password(
        &self,
        account: &Account,
        new_password: &NewPassword,
        current_password: Option<&str>,
    ) -> Result<(), Error> {
        let Some(current) = current_password else {
            return Err(Error::invalid_request(
                "current password is required to set a new password",
            ));
        };
        if !self.verify_password(current, account).await? {
            return Err(Error::forbidden("current password is incorrect"));
        }
        let hash = self.hash_password(new_password).await?;
        self.accounts
            .update_password_hash(&account.id, &hash)
            .await
            .map_err(map_account_error)
    }
}

#[async_trait]
impl<A, S, R> AccountCommand for AccountService<A, S, R>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    R: PasswordResetRepository,
{
    async fn register(&self, registration: Registration) -> Result<AccountProfile, Error> {
        let password_hash = self.hash_password(&registration.password).await?;
        let now = self.clock.utc();
        let account = self
            .accounts
            .insert(&NewAccount {
                id: UserId::random(),
                email: registration.email,
                password_hash,
                free_answers_remaining: FREE_ANSWERS_PER_MONTH,
                free_answers_reset_at: now,
            })
            .await
            .map_err(map_account_error)?;
        info!(user_id = %account.id, "account registered");
        Ok(AccountProfile::at(&account, None, now))
    }

    async fn authenticate(&self, credentials: LoginCredentials) -> Result<AccountProfile, Error> {
        let account = self
            .accounts
            .find_by_email(credentials.email())
            .await
            .map_err(map_account_error)?
            .ok_or_else(|| Error::unauthorized(INVALID_CREDENTIALS))?;
        if !self.verify_password(credentials.password(), &account).await? {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        }
        let account =
            refresh_monthly_allowance(self.accounts.as_ref(), account, self.clock.utc()).await?;
        self.profile_for(&account).await
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<AccountProfile, Error> {
        let account = load_account(self.accounts.as_ref(), user_id).await?;

        if let Some(new_password) = update.new_password.as_ref() {
            self.change_password(
                &account,
                new_password,
                update.current_password.as_deref().map(String::as_str),
            )
            .await?;
        }

        if let Some(email) = update.email.filter(|email| *email != account.email) {
            self.accounts
                .update_email(user_id, &email)
                .await
                .map_err(map_account_error)?;
        }

        let account = load_account(self.accounts.as_ref(), user_id).await?;
        self.profile_for(&account).await
    }

    async fn delete_account(&self, user_id: &UserId) -> Result<(), Error> {
        let deleted = self
            .accounts
            .delete(user_id)
            .await
            .map_err(map_account_error)?;
        if !deleted {
            return Err(Error::not_found("account not found"));
        }
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }

    async fn request_password_reset(&self, email: &Email) -> Result<(), Error> {
        let Some(account) = self
            .accounts
            .find_by_email(email)
            .await
            .map_err(map_account_error)?
        else {
            info!("password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = self.clock.utc() + RESET_TOKEN_TTL;
        self.resets
            .store(&hash_reset_token(&token), &account.id, expires_at)
            .await
            .map_err(map_reset_error)?;

        let link = self.reset_link(&token)?;
        if let Err(error) = self.mailer.send_password_reset(&account.email, &link).await {
            warn!(user_id = %account.id, %error, "failed to send password reset email");
        }
        Ok(())
    }

    async fn reset_password(&self, token: &str, password: NewPassword) -> Result<(), Error> {
        let user_id = self
            .resets
            .consume(&hash_reset_token(token.trim()), self.clock.utc())
            .await
            .map_err(map_reset_error)?
            .ok_or_else(|| Error::invalid_request("reset token is invalid or has expired"))?;
        let hash = self.hash_password(&password).await?;
        self.accounts
            .update_password_hash(&user_id, &hash)
            .await
            .map_err(map_account_error)?;
        info!(user_id = %user_id, "password reset completed");
        Ok(())
    }
}

#[async_trait]
impl<A, S, R> AccountQuery for AccountService<A, S, R>
where
    A: AccountRepository,
    S: SubscriptionRepository,
    R: PasswordResetRepository,
{
    async fn current_user(&self, user_id: &UserId) -> Result<AccountProfile, Error> {
        let account = load_account(self.accounts.as_ref(), user_id).await?;
        self.profile_for(&account).await
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
