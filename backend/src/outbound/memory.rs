//! In-process store implementing every repository port.
//!
//! Used when no database URL is configured and by the HTTP integration
//! tests. One mutex guards all tables so each port call is atomic, mirroring
//! the conditional statements of the Diesel adapters. Deleting an account
//! cascades to everything it owns, as the foreign keys do in PostgreSQL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use uuid::Uuid;

use crate::domain::ports::{
    AccountRepository, AccountRepositoryError, PasswordResetRepository,
    PasswordResetRepositoryError, SavedAnswerRepository, SavedAnswerRepositoryError,
    SubscriptionRepository, SubscriptionRepositoryError, TokenCharge, TokenPurchaseRepository,
    TokenPurchaseRepositoryError, UsageLogRepository, UsageLogRepositoryError,
};
use crate::domain::{
    Account, Email, NewAccount, NewSavedAnswer, NewTokenPurchase, PasswordHash, PurchaseOutcome,
    SavedAnswer, Subscription, SubscriptionStatus, SubscriptionUpsert, TokenPurchase,
    UsageRecord, UserId,
};

const POISONED: &str = "in-memory store lock poisoned";

#[derive(Debug, Clone)]
struct ResetEntry {
    user_id: UserId,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<UserId, Account>,
    subscriptions: HashMap<Uuid, Subscription>,
    purchases: Vec<TokenPurchase>,
    saved_answers: Vec<SavedAnswer>,
    usage: Vec<UsageRecord>,
    resets: HashMap<String, ResetEntry>,
}

impl Tables {
    fn account_mut(&mut self, id: &UserId) -> Option<&mut Account> {
        self.accounts.get_mut(id)
    }

    fn subscription_by_external_id(&mut self, external_id: &str) -> Option<&mut Subscription> {
        self.subscriptions
            .values_mut()
            .find(|sub| sub.external_subscription_id == external_id)
    }

    fn cascade_delete(&mut self, id: &UserId) -> bool {
        if self.accounts.remove(id).is_none() {
            return false;
        }
        self.subscriptions.retain(|_, sub| sub.user_id != *id);
        self.purchases.retain(|purchase| purchase.user_id != *id);
        self.saved_answers.retain(|answer| answer.user_id != *id);
        self.usage.retain(|record| record.user_id != *id);
        self.resets.retain(|_, entry| entry.user_id != *id);
        true
    }
}

/// Shared in-memory backing store.
///
/// Clone the `Arc` to hand the same store to every service:
///
/// ```
/// use std::sync::Arc;
/// use backend::outbound::memory::InMemoryStore;
/// use mockable::DefaultClock;
///
/// let store = Arc::new(InMemoryStore::new(Arc::new(DefaultClock)));
/// assert!(store.usage_records().is_empty());
/// ```
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Create an empty store stamping rows with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn lock<E>(&self, poisoned: impl FnOnce(&'static str) -> E) -> Result<MutexGuard<'_, Tables>, E> {
        self.tables.lock().map_err(|_| poisoned(POISONED))
    }

    /// Usage log entries written so far, oldest first.
    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.tables
            .lock()
            .map(|tables| tables.usage.clone())
            .unwrap_or_default()
    }

    /// Every subscription row owned by `user_id`, whatever its status.
    pub fn subscriptions_of(&self, user_id: &UserId) -> Vec<Subscription> {
        self.tables
            .lock()
            .map(|tables| {
                tables
                    .subscriptions
                    .values()
                    .filter(|sub| sub.user_id == *user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn insert(&self, account: &NewAccount) -> Result<Account, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        if tables
            .accounts
            .values()
            .any(|existing| existing.email == account.email)
        {
            return Err(AccountRepositoryError::duplicate_email());
        }
        let stored = Account {
            id: account.id,
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            token_balance: 0,
            free_answers_remaining: account.free_answers_remaining,
            free_answers_reset_at: account.free_answers_reset_at,
            created_at: self.clock.utc(),
        };
        tables.accounts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Account>, AccountRepositoryError> {
        let tables = self.lock(AccountRepositoryError::query)?;
        Ok(tables.accounts.get(id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        let tables = self.lock(AccountRepositoryError::query)?;
        Ok(tables
            .accounts
            .values()
            .find(|account| account.email == *email)
            .cloned())
    }

    async fn update_email(&self, id: &UserId, email: &Email) -> Result<(), AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        if tables
            .accounts
            .values()
            .any(|account| account.id != *id && account.email == *email)
        {
            return Err(AccountRepositoryError::duplicate_email());
        }
        if let Some(account) = tables.account_mut(id) {
            account.email = email.clone();
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: &UserId,
        hash: &PasswordHash,
    ) -> Result<(), AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        if let Some(account) = tables.account_mut(id) {
            account.password_hash = hash.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        Ok(tables.cascade_delete(id))
    }

    async fn reset_free_answers(
        &self,
        id: &UserId,
        allowance: u32,
        period_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        match tables.account_mut(id) {
            Some(account) if account.free_answers_reset_at < period_start => {
                account.free_answers_remaining = allowance;
                account.free_answers_reset_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_free_answer(&self, id: &UserId) -> Result<bool, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        match tables.account_mut(id) {
            Some(account) if account.free_answers_remaining > 0 => {
                account.free_answers_remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_free_answer(
        &self,
        id: &UserId,
        allowance: u32,
    ) -> Result<(), AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        if let Some(account) = tables.account_mut(id) {
            if account.free_answers_remaining < allowance {
                account.free_answers_remaining += 1;
            }
        }
        Ok(())
    }

    async fn deduct_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<Option<i64>, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        Ok(match tables.account_mut(id) {
            Some(account) if account.token_balance >= amount => {
                account.token_balance -= amount;
                Some(account.token_balance)
            }
            _ => None,
        })
    }

    async fn charge_tokens(
        &self,
        id: &UserId,
        amount: i64,
    ) -> Result<TokenCharge, AccountRepositoryError> {
        let mut tables = self.lock(AccountRepositoryError::query)?;
        let account = tables
            .account_mut(id)
            .ok_or_else(|| AccountRepositoryError::query("record not found"))?;
        let charged = amount.clamp(0, account.token_balance.max(0));
        account.token_balance -= charged;
        Ok(TokenCharge {
            charged,
            balance: account.token_balance,
        })
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_current(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError> {
        let tables = self.lock(SubscriptionRepositoryError::query)?;
        let owned = tables
            .subscriptions
            .values()
            .filter(|sub| sub.user_id == *user_id)
            .cloned();
        Ok(Subscription::select_current(owned, now))
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionRepositoryError> {
        let mut tables = self.lock(SubscriptionRepositoryError::query)?;
        Ok(tables
            .subscription_by_external_id(external_subscription_id)
            .cloned())
    }

    async fn upsert(
        &self,
        subscription: &SubscriptionUpsert,
    ) -> Result<Subscription, SubscriptionRepositoryError> {
        let now = self.clock.utc();
        let mut tables = self.lock(SubscriptionRepositoryError::query)?;
        if let Some(existing) =
            tables.subscription_by_external_id(&subscription.external_subscription_id)
        {
            existing.tier = subscription.tier;
            existing.status = subscription.status;
            existing.current_period_start = subscription.current_period_start;
            existing.current_period_end = subscription.current_period_end;
            return Ok(existing.clone());
        }
        if !tables.accounts.contains_key(&subscription.user_id) {
            return Err(SubscriptionRepositoryError::query(
                "subscription owner does not exist",
            ));
        }
        let stored = Subscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            external_subscription_id: subscription.external_subscription_id.clone(),
            tier: subscription.tier,
            status: subscription.status,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            daily_usage_count: 0,
            daily_usage_date: None,
            created_at: now,
        };
        tables.subscriptions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_status(
        &self,
        external_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool, SubscriptionRepositoryError> {
        let mut tables = self.lock(SubscriptionRepositoryError::query)?;
        Ok(match tables.subscription_by_external_id(external_subscription_id) {
            Some(existing) => {
                existing.status = status;
                true
            }
            None => false,
        })
    }

    async fn reserve_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
        cap: u32,
    ) -> Result<bool, SubscriptionRepositoryError> {
        let mut tables = self.lock(SubscriptionRepositoryError::query)?;
        let Some(sub) = tables.subscriptions.get_mut(&id) else {
            return Ok(false);
        };
        if sub.daily_usage_date != Some(today) {
            sub.daily_usage_count = 0;
            sub.daily_usage_date = Some(today);
        }
        if sub.daily_usage_count >= cap {
            return Ok(false);
        }
        sub.daily_usage_count += 1;
        Ok(true)
    }

    async fn release_daily_use(
        &self,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<(), SubscriptionRepositoryError> {
        let mut tables = self.lock(SubscriptionRepositoryError::query)?;
        if let Some(sub) = tables.subscriptions.get_mut(&id) {
            if sub.daily_usage_date == Some(today) {
                sub.daily_usage_count = sub.daily_usage_count.saturating_sub(1);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenPurchaseRepository for InMemoryStore {
    async fn record_purchase(
        &self,
        purchase: &NewTokenPurchase,
    ) -> Result<PurchaseOutcome, TokenPurchaseRepositoryError> {
        let now = self.clock.utc();
        let mut tables = self.lock(TokenPurchaseRepositoryError::query)?;
        if tables
            .purchases
            .iter()
            .any(|existing| existing.external_payment_id == purchase.external_payment_id)
        {
            return Ok(PurchaseOutcome::AlreadyRecorded);
        }
        let account = tables
            .account_mut(&purchase.user_id)
            .ok_or_else(|| TokenPurchaseRepositoryError::query("purchase owner does not exist"))?;
        account.token_balance += purchase.tokens;
        let balance = account.token_balance;
        tables.purchases.push(TokenPurchase {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            tokens: purchase.tokens,
            price_cents: purchase.price_cents,
            currency: purchase.currency.clone(),
            external_payment_id: purchase.external_payment_id.clone(),
            created_at: now,
        });
        Ok(PurchaseOutcome::Credited { balance })
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TokenPurchase>, TokenPurchaseRepositoryError> {
        let tables = self.lock(TokenPurchaseRepositoryError::query)?;
        Ok(tables
            .purchases
            .iter()
            .rev()
            .filter(|purchase| purchase.user_id == *user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SavedAnswerRepository for InMemoryStore {
    async fn insert(
        &self,
        user_id: &UserId,
        answer: &NewSavedAnswer,
    ) -> Result<SavedAnswer, SavedAnswerRepositoryError> {
        let now = self.clock.utc();
        let mut tables = self.lock(SavedAnswerRepositoryError::query)?;
        if !tables.accounts.contains_key(user_id) {
            return Err(SavedAnswerRepositoryError::query(
                "saved answer owner does not exist",
            ));
        }
        let stored = SavedAnswer {
            id: Uuid::new_v4(),
            user_id: *user_id,
            content_type: answer.content_type,
            title: answer.title.clone(),
            payload: answer.payload.clone(),
            image_url: answer.image_url.clone(),
            created_at: now,
        };
        tables.saved_answers.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SavedAnswer>, SavedAnswerRepositoryError> {
        let tables = self.lock(SavedAnswerRepositoryError::query)?;
        Ok(tables
            .saved_answers
            .iter()
            .rev()
            .filter(|answer| answer.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn find_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<Option<SavedAnswer>, SavedAnswerRepositoryError> {
        let tables = self.lock(SavedAnswerRepositoryError::query)?;
        Ok(tables
            .saved_answers
            .iter()
            .find(|answer| answer.id == id && answer.user_id == *user_id)
            .cloned())
    }

    async fn delete_for_user(
        &self,
        user_id: &UserId,
        id: Uuid,
    ) -> Result<bool, SavedAnswerRepositoryError> {
        let mut tables = self.lock(SavedAnswerRepositoryError::query)?;
        let before = tables.saved_answers.len();
        tables
            .saved_answers
            .retain(|answer| !(answer.id == id && answer.user_id == *user_id));
        Ok(tables.saved_answers.len() < before)
    }
}

#[async_trait]
impl UsageLogRepository for InMemoryStore {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageLogRepositoryError> {
        let mut tables = self.lock(UsageLogRepositoryError::query)?;
        tables.usage.push(*record);
        Ok(())
    }
}

#[async_trait]
impl PasswordResetRepository for InMemoryStore {
    async fn store(
        &self,
        token_hash: &str,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), PasswordResetRepositoryError> {
        let mut tables = self.lock(PasswordResetRepositoryError::query)?;
        if !tables.accounts.contains_key(user_id) {
            return Err(PasswordResetRepositoryError::query(
                "reset token owner does not exist",
            ));
        }
        tables.resets.insert(
            token_hash.to_owned(),
            ResetEntry {
                user_id: *user_id,
                expires_at,
                used_at: None,
            },
        );
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, PasswordResetRepositoryError> {
        let mut tables = self.lock(PasswordResetRepositoryError::query)?;
        Ok(match tables.resets.get_mut(token_hash) {
            Some(entry) if entry.used_at.is_none() && entry.expires_at > now => {
                entry.used_at = Some(now);
                Some(entry.user_id)
            }
            _ => None,
        })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
