//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered accounts and their balances.
    users (id) {
        id -> Uuid,
        /// Lower-cased, unique.
        email -> Varchar,
        password_hash -> Text,
        /// Prepaid tokens; `CHECK (token_balance >= 0)`.
        token_balance -> Int8,
        free_answers_remaining -> Int4,
        free_answers_reset_at -> Timestamptz,
        created_at -> Timestamptz,
        /// Maintained by the `set_updated_at` trigger.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Provider subscriptions keyed by their external id.
    subscriptions (id) {
        id -> Uuid,
        user_id -> Uuid,
        external_subscription_id -> Text,
        tier -> Varchar,
        status -> Varchar,
        current_period_start -> Timestamptz,
        current_period_end -> Timestamptz,
        daily_usage_count -> Int4,
        /// UTC day the counter belongs to.
        daily_usage_date -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Credited token purchases; `external_payment_id` is unique.
    token_purchases (id) {
        id -> Uuid,
        user_id -> Uuid,
        tokens -> Int8,
        price_cents -> Int8,
        currency -> Varchar,
        external_payment_id -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    saved_answers (id) {
        id -> Uuid,
        user_id -> Uuid,
        content_type -> Varchar,
        title -> Varchar,
        payload -> Jsonb,
        image_url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per analysis attempt.
    usage_logs (id) {
        id -> Uuid,
        user_id -> Uuid,
        payment_source -> Varchar,
        prompt_tokens -> Int8,
        completion_tokens -> Int8,
        cost_micro_usd -> Int8,
        tokens_charged -> Int8,
        success -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Single-use password reset tokens, stored as SHA-256 hex digests.
    password_reset_tokens (token_hash) {
        token_hash -> Text,
        user_id -> Uuid,
        expires_at -> Timestamptz,
        used_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(subscriptions -> users (user_id));
diesel::joinable!(token_purchases -> users (user_id));
diesel::joinable!(saved_answers -> users (user_id));
diesel::joinable!(usage_logs -> users (user_id));
diesel::joinable!(password_reset_tokens -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    subscriptions,
    token_purchases,
    saved_answers,
    usage_logs,
    password_reset_tokens,
);
