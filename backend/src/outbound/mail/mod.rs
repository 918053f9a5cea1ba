//! Transactional email adapters.

mod resend;

pub use resend::{ResendMailer, ResendSettings};
