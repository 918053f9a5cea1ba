//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain types live next to
//! the repositories that use them.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    password_reset_tokens, saved_answers, subscriptions, token_purchases, usage_logs, users,
};

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub token_balance: i64,
    pub free_answers_remaining: i32,
    pub free_answers_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insertable struct for creating account records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewAccountRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub free_answers_remaining: i32,
    pub free_answers_reset_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_subscription_id: String,
    pub tier: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub daily_usage_count: i32,
    pub daily_usage_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub(crate) struct NewSubscriptionRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_subscription_id: &'a str,
    pub tier: &'a str,
    pub status: &'a str,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Token purchases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = token_purchases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TokenPurchaseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tokens: i64,
    pub price_cents: i64,
    pub currency: String,
    pub external_payment_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = token_purchases)]
pub(crate) struct NewTokenPurchaseRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tokens: i64,
    pub price_cents: i64,
    pub currency: &'a str,
    pub external_payment_id: &'a str,
}

// ---------------------------------------------------------------------------
// Saved answers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = saved_answers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SavedAnswerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: String,
    pub title: String,
    pub payload: serde_json::Value,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = saved_answers)]
pub(crate) struct NewSavedAnswerRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_type: &'a str,
    pub title: &'a str,
    pub payload: &'a serde_json::Value,
    pub image_url: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Usage logs and reset tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_logs)]
pub(crate) struct NewUsageLogRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_source: &'a str,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_micro_usd: i64,
    pub tokens_charged: i64,
    pub success: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = password_reset_tokens)]
pub(crate) struct NewPasswordResetRow<'a> {
    pub token_hash: &'a str,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
