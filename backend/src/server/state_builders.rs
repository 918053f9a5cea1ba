//! Builders for HTTP state: adapter selection and repository-backed services.
//!
//! Every integration is optional. A missing database keeps state in memory,
//! a missing model key serves fixture explanations, a missing payment key
//! refuses checkout and a missing mail key logs reset links.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use backend::domain::ports::{
    AccountRepository, AnalysisMetrics, FixtureVisionModel, LoggingMailer, Mailer,
    PasswordHasher, PasswordResetRepository, PaymentGateway, SavedAnswerRepository,
    SubscriptionRepository, TokenPurchaseRepository, UnconfiguredPaymentGateway,
    UsageLogRepository, VisionModel,
};
use backend::domain::{
    AccountService, AnalysisService, BillingService, CheckoutSettings, PricingPolicy,
    SavedAnswerService, SubscriptionService, TokenService,
};
use backend::inbound::http::state::HttpState;
use backend::outbound::crypto::{DEFAULT_LOG_N, ScryptPasswordHasher};
use backend::outbound::mail::{ResendMailer, ResendSettings};
use backend::outbound::memory::InMemoryStore;
use backend::outbound::openai::{OpenAiSettings, OpenAiVisionModel};
use backend::outbound::persistence::{
    DbPool, DieselAccountRepository, DieselPasswordResetRepository, DieselSavedAnswerRepository,
    DieselSubscriptionRepository, DieselTokenPurchaseRepository, DieselUsageLogRepository,
};
use backend::outbound::stripe::{StripeGateway, StripeSettings};
use backend::settings::AppSettings;
use url::Url;

use super::ServerConfig;

/// Driven adapters shared by every service.
pub(super) struct Adapters {
    hasher: Arc<dyn PasswordHasher>,
    mailer: Arc<dyn Mailer>,
    vision: Arc<dyn VisionModel>,
    metrics: Arc<dyn AnalysisMetrics>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    public_base_url: Url,
    checkout: CheckoutSettings,
    pricing: PricingPolicy,
}

/// One repository per port. The in-memory store fills every slot with the
/// same `Arc`.
struct Repositories<A, S, R, P, N, U> {
    accounts: Arc<A>,
    subscriptions: Arc<S>,
    resets: Arc<R>,
    purchases: Arc<P>,
    answers: Arc<N>,
    usage: Arc<U>,
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {err}"))
}

fn build_mailer(settings: &AppSettings) -> std::io::Result<Arc<dyn Mailer>> {
    let Some(api_key) = settings.resend_api_key() else {
        warn!("no mail API key configured; password reset links are logged instead");
        return Ok(Arc::new(LoggingMailer));
    };
    let resend = ResendSettings::new(api_key, settings.mail_from())
        .map_err(|err| io_error("mail endpoint", err))?;
    let mailer = ResendMailer::new(resend).map_err(|err| io_error("mail client", err))?;
    Ok(Arc::new(mailer))
}

fn build_vision_model(settings: &AppSettings) -> std::io::Result<Arc<dyn VisionModel>> {
    let Some(api_key) = settings.openai_api_key() else {
        warn!("no model API key configured; serving fixture explanations");
        return Ok(Arc::new(FixtureVisionModel));
    };
    let mut openai =
        OpenAiSettings::new(api_key).map_err(|err| io_error("model endpoint", err))?;
    if let Some(endpoint) = settings
        .openai_endpoint()
        .map_err(|err| io_error("model endpoint", err))?
    {
        openai.endpoint = endpoint;
    }
    if let Some(model) = settings
        .openai_model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
    {
        openai.model = model.to_owned();
    }
    openai.timeout = settings.openai_timeout();
    info!(model = %openai.model, "vision model configured");
    let vision = OpenAiVisionModel::new(openai).map_err(|err| io_error("model client", err))?;
    Ok(Arc::new(vision))
}

fn build_gateway(
    settings: &AppSettings,
    clock: Arc<dyn Clock>,
) -> std::io::Result<Arc<dyn PaymentGateway>> {
    let Some(secret_key) = settings.stripe_secret_key() else {
        warn!("no payment key configured; checkout is unavailable");
        return Ok(Arc::new(UnconfiguredPaymentGateway));
    };
    let webhook_secret = settings.stripe_webhook_secret().map(str::to_owned);
    if webhook_secret.is_none() {
        warn!("no webhook secret configured; payment events will be refused");
    }
    let stripe = StripeSettings::new(secret_key, webhook_secret)
        .map_err(|err| io_error("payment endpoint", err))?;
    let gateway = StripeGateway::new(stripe, clock).map_err(|err| io_error("payment client", err))?;
    Ok(Arc::new(gateway))
}

fn checkout_settings(settings: &AppSettings, public_base_url: &Url) -> std::io::Result<CheckoutSettings> {
    let success_url = public_base_url
        .join("billing/success")
        .map_err(|err| io_error("checkout success URL", err))?;
    let cancel_url = public_base_url
        .join("billing/cancel")
        .map_err(|err| io_error("checkout cancel URL", err))?;
    let (basic_price_id, pro_price_id) = settings.stripe_price_ids();
    Ok(CheckoutSettings {
        success_url,
        cancel_url,
        basic_price_id,
        pro_price_id,
    })
}

/// Select adapters from settings, falling back to development stand-ins
/// for anything unconfigured.
///
/// # Errors
/// Returns [`std::io::Error`] when a configured value is malformed or an
/// HTTP client cannot be built.
pub(super) fn build_adapters(
    settings: &AppSettings,
    metrics: Arc<dyn AnalysisMetrics>,
) -> std::io::Result<Adapters> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let public_base_url = settings
        .public_base_url()
        .map_err(|err| io_error("settings", err))?;
    let hasher = ScryptPasswordHasher::new(settings.scrypt_log_n.unwrap_or(DEFAULT_LOG_N))
        .map_err(|err| io_error("password hasher", err))?;

    Ok(Adapters {
        hasher: Arc::new(hasher),
        mailer: build_mailer(settings)?,
        vision: build_vision_model(settings)?,
        metrics,
        gateway: build_gateway(settings, clock.clone())?,
        checkout: checkout_settings(settings, &public_base_url)?,
        pricing: settings.pricing(),
        public_base_url,
        clock,
    })
}

fn assemble<A, S, R, P, N, U>(repos: Repositories<A, S, R, P, N, U>, adapters: Adapters) -> HttpState
where
    A: AccountRepository + 'static,
    S: SubscriptionRepository + 'static,
    R: PasswordResetRepository + 'static,
    P: TokenPurchaseRepository + 'static,
    N: SavedAnswerRepository + 'static,
    U: UsageLogRepository + 'static,
{
    let Repositories {
        accounts,
        subscriptions,
        resets,
        purchases,
        answers,
        usage,
    } = repos;
    let Adapters {
        hasher,
        mailer,
        vision,
        metrics,
        gateway,
        clock,
        public_base_url,
        checkout,
        pricing,
    } = adapters;

    let account_service = Arc::new(AccountService::new(
        accounts.clone(),
        subscriptions.clone(),
        resets,
        hasher,
        mailer,
        clock.clone(),
        public_base_url,
    ));
    let token_service = Arc::new(TokenService::new(accounts.clone(), purchases.clone()));
    let saved_answer_service = Arc::new(SavedAnswerService::new(
        answers,
        subscriptions.clone(),
        clock.clone(),
    ));
    let analysis = Arc::new(AnalysisService::new(
        accounts.clone(),
        subscriptions.clone(),
        usage,
        vision,
        metrics,
        pricing,
        clock.clone(),
    ));
    let billing = Arc::new(BillingService::new(
        accounts,
        subscriptions.clone(),
        purchases,
        gateway,
        checkout,
        clock.clone(),
    ));

    HttpState {
        accounts: account_service.clone(),
        accounts_query: account_service,
        tokens: token_service.clone(),
        tokens_query: token_service,
        subscriptions: Arc::new(SubscriptionService::new(subscriptions, clock)),
        saved_answers: saved_answer_service.clone(),
        saved_answers_query: saved_answer_service,
        analysis,
        billing,
    }
}

/// Wire services over Diesel repositories when a pool is present, otherwise
/// over a single in-memory store.
pub(super) fn state_for_pool(pool: Option<&DbPool>, adapters: Adapters) -> HttpState {
    match pool {
        Some(pool) => assemble(
            Repositories {
                accounts: Arc::new(DieselAccountRepository::new(pool.clone())),
                subscriptions: Arc::new(DieselSubscriptionRepository::new(pool.clone())),
                resets: Arc::new(DieselPasswordResetRepository::new(pool.clone())),
                purchases: Arc::new(DieselTokenPurchaseRepository::new(pool.clone())),
                answers: Arc::new(DieselSavedAnswerRepository::new(pool.clone())),
                usage: Arc::new(DieselUsageLogRepository::new(pool.clone())),
            },
            adapters,
        ),
        None => {
            warn!("no database configured; all state is held in memory and lost on restart");
            let store = Arc::new(InMemoryStore::new(adapters.clock.clone()));
            assemble(
                Repositories {
                    accounts: store.clone(),
                    subscriptions: store.clone(),
                    resets: store.clone(),
                    purchases: store.clone(),
                    answers: store.clone(),
                    usage: store,
                },
                adapters,
            )
        }
    }
}

#[cfg(feature = "metrics")]
fn build_analysis_metrics(config: &ServerConfig) -> std::io::Result<Arc<dyn AnalysisMetrics>> {
    use backend::domain::ports::NoOpAnalysisMetrics;
    use backend::outbound::metrics::PrometheusAnalysisMetrics;

    match &config.prometheus {
        Some(prom) => {
            let metrics = PrometheusAnalysisMetrics::new(&prom.registry)
                .map_err(|err| io_error("analysis metrics registration failed", err))?;
            Ok(Arc::new(metrics))
        }
        None => Ok(Arc::new(NoOpAnalysisMetrics)),
    }
}

#[cfg(not(feature = "metrics"))]
fn build_analysis_metrics(_config: &ServerConfig) -> std::io::Result<Arc<dyn AnalysisMetrics>> {
    Ok(Arc::new(backend::domain::ports::NoOpAnalysisMetrics))
}

/// Build the handler state for `config`.
///
/// # Errors
/// Returns [`std::io::Error`] if an adapter cannot be configured or metric
/// registration fails.
pub(super) fn build_http_state(config: &ServerConfig) -> std::io::Result<web::Data<HttpState>> {
    let metrics = build_analysis_metrics(config)?;
    let adapters = build_adapters(&config.settings, metrics)?;
    Ok(web::Data::new(state_for_pool(
        config.db_pool.as_ref(),
        adapters,
    )))
}
