//! Resend HTTP API mailer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::info;

use crate::domain::Email;
use crate::domain::ports::{Mailer, MailerError};

const DEFAULT_ENDPOINT: &str = "https://api.resend.com/emails";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Resend credentials and sender identity.
#[derive(Clone)]
pub struct ResendSettings {
    pub api_key: String,
    /// `From` header, e.g. `Snapwise <no-reply@snapwise.app>`.
    pub from: String,
    pub endpoint: Url,
}

impl ResendSettings {
    /// Settings for the public Resend endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in endpoint fails to parse.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            api_key: api_key.into(),
            from: from.into(),
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendEmailDto<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'static str,
    html: String,
    text: String,
}

fn reset_email<'a>(from: &'a str, to: &'a Email, link: &Url) -> SendEmailDto<'a> {
    SendEmailDto {
        from,
        to: [to.as_ref()],
        subject: "Reset your Snapwise password",
        html: format!(
            "<p>Someone asked to reset the password for this Snapwise account.</p>\
             <p><a href=\"{link}\">Choose a new password</a>. The link expires in one hour.</p>\
             <p>If this wasn't you, ignore this email.</p>"
        ),
        text: format!(
            "Someone asked to reset the password for this Snapwise account.\n\n\
             Choose a new password: {link}\nThe link expires in one hour.\n\n\
             If this wasn't you, ignore this email."
        ),
    }
}

/// [`Mailer`] backed by the Resend API.
pub struct ResendMailer {
    client: Client,
    settings: ResendSettings,
}

impl ResendMailer {
    /// Build a mailer.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: ResendSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_password_reset(
        &self,
        to: &Email,
        reset_link: &Url,
    ) -> Result<(), MailerError> {
        let response = self
            .client
            .post(self.settings.endpoint.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&reset_email(&self.settings.from, to, reset_link))
            .send()
            .await
            .map_err(|err| MailerError::transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::rejected(
                status.as_u16(),
                body.chars().take(160).collect::<String>(),
            ));
        }
        info!(to = %to, "password reset email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_links_the_token() {
        let to = Email::new("ada@example.com").expect("email");
        let link = Url::parse("https://app.snapwise.test/reset-password?token=abc").expect("url");

        let body = serde_json::to_value(reset_email("Snapwise <no-reply@snapwise.test>", &to, &link))
            .expect("serialises");

        assert_eq!(body["to"][0], "ada@example.com");
        assert!(
            body["html"]
                .as_str()
                .expect("html")
                .contains("href=\"https://app.snapwise.test/reset-password?token=abc\"")
        );
        assert!(body["text"].as_str().expect("text").contains("token=abc"));
    }
}
