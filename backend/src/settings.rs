//! Application settings loaded via OrthoConfig.
//!
//! Every value can come from `SNAPWISE_*` environment variables, a config
//! file or the command line. Unset integrations fall back to development
//! adapters when the server is assembled.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::PricingPolicy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5173/";
const DEFAULT_MAIL_FROM: &str = "Snapwise <no-reply@snapwise.app>";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} is not a valid socket address: {value}")]
    InvalidAddress { name: &'static str, value: String },
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Server, integration and pricing settings.
#[derive(Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SNAPWISE")]
pub struct AppSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// Origin of the client application, used in emailed links and
    /// checkout redirects.
    pub public_base_url: Option<String>,
    /// PostgreSQL connection string. Without it the server keeps all state
    /// in memory.
    pub database_url: Option<String>,
    pub db_max_connections: Option<u32>,
    /// Skip embedded migrations at startup.
    #[ortho_config(default = false)]
    pub skip_migrations: bool,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_endpoint: Option<String>,
    pub openai_timeout_secs: Option<u64>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_basic_price_id: Option<String>,
    pub stripe_pro_price_id: Option<String>,
    pub resend_api_key: Option<String>,
    pub mail_from: Option<String>,
    /// scrypt cost parameter (`log2(N)`).
    pub scrypt_log_n: Option<u8>,
    /// Markup over provider cost, in percent of it.
    pub pricing_markup_percent: Option<u64>,
    /// Token balance required before a token-paid analysis starts.
    pub pricing_min_balance: Option<i64>,
}

fn redacted(value: Option<&String>) -> &'static str {
    if value.is_some() { "<set>" } else { "<unset>" }
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("bind_addr", &self.bind_addr)
            .field("public_base_url", &self.public_base_url)
            .field("database_url", &redacted(self.database_url.as_ref()))
            .field("openai_api_key", &redacted(self.openai_api_key.as_ref()))
            .field("openai_model", &self.openai_model)
            .field("stripe_secret_key", &redacted(self.stripe_secret_key.as_ref()))
            .field(
                "stripe_webhook_secret",
                &redacted(self.stripe_webhook_secret.as_ref()),
            )
            .field("resend_api_key", &redacted(self.resend_api_key.as_ref()))
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|raw| !raw.is_empty())
}

impl AppSettings {
    /// Listen address, defaulting to all interfaces on port 8080.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidAddress`] for unparsable values.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = non_empty(self.bind_addr.as_ref()).unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|_| SettingsError::InvalidAddress {
            name: "bind_addr",
            value: raw.to_owned(),
        })
    }

    /// Client origin with a trailing slash so relative joins keep its path.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidUrl`] for unparsable values.
    pub fn public_base_url(&self) -> Result<Url, SettingsError> {
        let raw = non_empty(self.public_base_url.as_ref()).unwrap_or(DEFAULT_PUBLIC_BASE_URL);
        let normalised = if raw.ends_with('/') {
            raw.to_owned()
        } else {
            format!("{raw}/")
        };
        Url::parse(&normalised).map_err(|_| SettingsError::InvalidUrl {
            name: "public_base_url",
            value: raw.to_owned(),
        })
    }

    pub fn database_url(&self) -> Option<&str> {
        non_empty(self.database_url.as_ref())
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        non_empty(self.openai_api_key.as_ref())
    }

    pub fn openai_timeout(&self) -> Duration {
        Duration::from_secs(
            self.openai_timeout_secs
                .unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
        )
    }

    /// Custom chat completions endpoint, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidUrl`] for unparsable values.
    pub fn openai_endpoint(&self) -> Result<Option<Url>, SettingsError> {
        non_empty(self.openai_endpoint.as_ref())
            .map(|raw| {
                Url::parse(raw).map_err(|_| SettingsError::InvalidUrl {
                    name: "openai_endpoint",
                    value: raw.to_owned(),
                })
            })
            .transpose()
    }

    pub fn stripe_secret_key(&self) -> Option<&str> {
        non_empty(self.stripe_secret_key.as_ref())
    }

    pub fn stripe_webhook_secret(&self) -> Option<&str> {
        non_empty(self.stripe_webhook_secret.as_ref())
    }

    pub fn stripe_price_ids(&self) -> (Option<String>, Option<String>) {
        (
            non_empty(self.stripe_basic_price_id.as_ref()).map(str::to_owned),
            non_empty(self.stripe_pro_price_id.as_ref()).map(str::to_owned),
        )
    }

    pub fn resend_api_key(&self) -> Option<&str> {
        non_empty(self.resend_api_key.as_ref())
    }

    pub fn mail_from(&self) -> &str {
        non_empty(self.mail_from.as_ref()).unwrap_or(DEFAULT_MAIL_FROM)
    }

    /// Pricing with any configured overrides applied.
    pub fn pricing(&self) -> PricingPolicy {
        let defaults = PricingPolicy::default();
        PricingPolicy {
            markup_percent: self.pricing_markup_percent.unwrap_or(defaults.markup_percent),
            min_balance_to_start: self
                .pricing_min_balance
                .unwrap_or(defaults.min_balance_to_start),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    //! Settings parsing against a locked environment.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "SNAPWISE_BIND_ADDR",
        "SNAPWISE_PUBLIC_BASE_URL",
        "SNAPWISE_DATABASE_URL",
        "SNAPWISE_STRIPE_SECRET_KEY",
        "SNAPWISE_STRIPE_PRO_PRICE_ID",
        "SNAPWISE_PRICING_MARKUP_PERCENT",
    ];

    fn load_with(values: &[(&str, &str)]) -> AppSettings {
        let _guard = lock_env(VARS.map(|name| {
            let value = values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned());
            (name, value)
        }));
        AppSettings::load_from_iter([OsString::from("snapwise")]).expect("settings load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let settings = load_with(&[]);
        assert_eq!(
            settings.bind_addr().expect("default address"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal")
        );
        assert_eq!(
            settings.public_base_url().expect("default url").as_str(),
            DEFAULT_PUBLIC_BASE_URL
        );
        assert!(settings.database_url().is_none());
        assert!(settings.stripe_secret_key().is_none());
        assert_eq!(settings.pricing(), PricingPolicy::default());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let settings = load_with(&[
            ("SNAPWISE_BIND_ADDR", "127.0.0.1:9000"),
            ("SNAPWISE_PUBLIC_BASE_URL", "https://snapwise.app/app"),
            ("SNAPWISE_DATABASE_URL", "postgres://localhost/snapwise"),
            ("SNAPWISE_STRIPE_SECRET_KEY", "sk_live_x"),
            ("SNAPWISE_STRIPE_PRO_PRICE_ID", "price_pro"),
            ("SNAPWISE_PRICING_MARKUP_PERCENT", "250"),
        ]);
        assert_eq!(
            settings.bind_addr().expect("address").port(),
            9000
        );
        assert_eq!(
            settings.public_base_url().expect("url").as_str(),
            "https://snapwise.app/app/"
        );
        assert_eq!(settings.database_url(), Some("postgres://localhost/snapwise"));
        assert_eq!(settings.stripe_price_ids(), (None, Some("price_pro".to_owned())));
        assert_eq!(settings.pricing().markup_percent, 250);
    }

    #[rstest]
    fn blank_values_count_as_unset() {
        let settings = load_with(&[("SNAPWISE_DATABASE_URL", "   ")]);
        assert!(settings.database_url().is_none());
    }

    #[rstest]
    fn invalid_bind_address_is_reported() {
        let settings = load_with(&[("SNAPWISE_BIND_ADDR", "localhost")]);
        assert_eq!(
            settings.bind_addr(),
            Err(SettingsError::InvalidAddress {
                name: "bind_addr",
                value: "localhost".to_owned(),
            })
        );
    }

    #[rstest]
    fn debug_output_hides_secrets() {
        let settings = load_with(&[("SNAPWISE_STRIPE_SECRET_KEY", "sk_live_x")]);
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk_live_x"));
        assert!(rendered.contains("<set>"));
    }
}
