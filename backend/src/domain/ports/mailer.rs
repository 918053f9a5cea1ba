//! Port for transactional email.

use async_trait::async_trait;
use tracing::info;
use url::Url;

use crate::domain::Email;

use super::define_port_error;

define_port_error! {
    /// Errors raised by mail adapters.
    pub enum MailerError {
        /// Transport-level failure or timeout.
        Transport { message: String } => "mail provider unreachable: {message}",
        /// The provider rejected the message.
        Rejected { status: u16, message: String } =>
            "mail provider returned {status}: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &Email, reset_link: &Url)
    -> Result<(), MailerError>;
}

/// Development mailer that writes the link to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send_password_reset(
        &self,
        to: &Email,
        reset_link: &Url,
    ) -> Result<(), MailerError> {
        info!(to = %to, link = %reset_link, "password reset email (not sent)");
        Ok(())
    }
}
