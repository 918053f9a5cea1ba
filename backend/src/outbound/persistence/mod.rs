//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain repository ports, backed by
//! PostgreSQL through `diesel-async` and `bb8` pooling.
//!
//! Repositories only translate between Diesel rows and domain types. Row
//! structs (`models.rs`) and table definitions (`schema.rs`) stay private to
//! this module. Balance and quota mutations are conditional statements so the
//! database, not the caller, arbitrates concurrent requests.
//!
//! # Example
//!
//! ```ignore
//! use backend::outbound::persistence::{DbPool, DieselAccountRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/snapwise")).await?;
//! let accounts = DieselAccountRepository::new(pool);
//! ```

mod diesel_account_repository;
mod diesel_basic_error_mapping;
mod diesel_password_reset_repository;
mod diesel_saved_answer_repository;
mod diesel_subscription_repository;
mod diesel_token_purchase_repository;
mod diesel_usage_log_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_account_repository::DieselAccountRepository;
pub use diesel_password_reset_repository::DieselPasswordResetRepository;
pub use diesel_saved_answer_repository::DieselSavedAnswerRepository;
pub use diesel_subscription_repository::DieselSubscriptionRepository;
pub use diesel_token_purchase_repository::DieselTokenPurchaseRepository;
pub use diesel_usage_log_repository::DieselUsageLogRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
