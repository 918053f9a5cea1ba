//! Everything `create_server` needs, gathered by `main`.

use std::net::SocketAddr;

use backend::inbound::http::session_config::SessionSettings;
use backend::outbound::persistence::DbPool;
use backend::settings::{AppSettings, SettingsError};

#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetrics;

pub struct ServerConfig {
    pub(crate) session: SessionSettings,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) settings: AppSettings,
    pub(crate) db_pool: Option<DbPool>,
    #[cfg(feature = "metrics")]
    pub(crate) prometheus: Option<PrometheusMetrics>,
}

impl ServerConfig {
    /// Start from loaded settings; the listen address comes from
    /// `bind_addr`.
    ///
    /// # Errors
    /// [`SettingsError::InvalidAddress`] when `bind_addr` does not parse.
    pub fn from_settings(
        settings: AppSettings,
        session: SessionSettings,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            session,
            settings,
            db_pool: None,
            #[cfg(feature = "metrics")]
            prometheus: None,
        })
    }

    /// Storage backend. `None` keeps every repository in process memory.
    #[must_use]
    pub fn with_db_pool(self, db_pool: Option<DbPool>) -> Self {
        Self { db_pool, ..self }
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(self, prometheus: Option<PrometheusMetrics>) -> Self {
        Self { prometheus, ..self }
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
