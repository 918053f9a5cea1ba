//! Stripe payment gateway adapter.
//!
//! Creates hosted checkout sessions over the REST API and turns signed
//! webhook deliveries into domain `PaymentEvent`s.

mod dto;
mod gateway;
mod signature;

pub use gateway::{StripeGateway, StripeSettings};
pub use signature::SIGNATURE_TOLERANCE_SECS;
