//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **memory**: in-process repositories for development and tests
//! - **openai**: vision model over the chat completions API
//! - **stripe**: hosted checkout and signed webhooks
//! - **mail**: transactional email through Resend
//! - **crypto**: scrypt password hashing
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod crypto;
pub mod mail;
pub mod memory;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod openai;
pub mod persistence;
pub mod stripe;
