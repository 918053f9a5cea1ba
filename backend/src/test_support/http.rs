//! In-memory wiring of every HTTP port for handler and end-to-end tests.
//!
//! Uses the real domain services over [`InMemoryStore`], a cheap scrypt
//! hasher, the Stripe signature verifier, and controllable fakes for the
//! vision model and mailer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use mockable::Clock;
use sha2::Sha256;
use url::Url;

use super::MutableClock;
use crate::domain::ports::{
    FixtureVisionModel, Mailer, MailerError, NoOpAnalysisMetrics, PaymentGateway,
    PaymentGatewayError, VisionModel, VisionModelError, VisionRequest, VisionResponse,
};
use crate::domain::ports::{SubscriptionRepository, TokenPurchaseRepository};
use crate::domain::{
    AccountService, AnalysisService, BillingService, CheckoutRequest, CheckoutSession,
    CheckoutSettings, Email, NewTokenPurchase, PaymentEvent, PricingPolicy, PurchaseOutcome,
    SavedAnswerService, SubscriptionService, SubscriptionStatus, SubscriptionTier,
    SubscriptionUpsert, TokenService, UserId,
};
use crate::inbound::http::configure_api;
use crate::inbound::http::session_config::SessionSettings;
use crate::inbound::http::state::HttpState;
use crate::outbound::crypto::ScryptPasswordHasher;
use crate::outbound::memory::InMemoryStore;
use crate::outbound::stripe::{StripeGateway, StripeSettings};

/// Endpoint secret accepted by [`TestPaymentGateway`].
pub const TEST_WEBHOOK_SECRET: &str = "whsec_snapwise_test";
/// Provider price ids configured for the two tiers.
pub const TEST_BASIC_PRICE: &str = "price_basic_test";
pub const TEST_PRO_PRICE: &str = "price_pro_test";
/// Client origin used in reset links and checkout redirects.
pub const TEST_PUBLIC_URL: &str = "https://app.snapwise.test/";
/// Cheapest scrypt cost the hasher accepts quickly.
const TEST_SCRYPT_LOG_N: u8 = 4;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn parse_url(raw: &str) -> Url {
    match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => panic!("invalid test url {raw}: {err}"),
    }
}

/// Mailer that remembers every reset link.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Email, Url)>>,
}

impl RecordingMailer {
    /// Most recent reset link sent to `to`.
    pub fn last_link_for(&self, to: &str) -> Option<Url> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|(email, _)| email.as_ref() == to)
            .map(|(_, link)| link.clone())
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, to: &Email, reset_link: &Url) -> Result<(), MailerError> {
        lock(&self.sent).push((to.clone(), reset_link.clone()));
        Ok(())
    }
}

/// Vision model that answers like [`FixtureVisionModel`] until told to fail.
#[derive(Debug, Default)]
pub struct SwitchableVisionModel {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl SwitchableVisionModel {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for SwitchableVisionModel {
    async fn explain(&self, request: &VisionRequest) -> Result<VisionResponse, VisionModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(VisionModelError::upstream(502_u16, "bad gateway"));
        }
        FixtureVisionModel.explain(request).await
    }
}

/// Payment gateway that verifies real Stripe signatures but fakes checkout.
pub struct TestPaymentGateway {
    verifier: StripeGateway,
    checkouts: Mutex<Vec<CheckoutRequest>>,
}

impl TestPaymentGateway {
    /// # Panics
    ///
    /// Panics if the Stripe client cannot be constructed.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let settings = match StripeSettings::new("sk_test_snapwise", Some(TEST_WEBHOOK_SECRET.to_owned())) {
            Ok(settings) => settings,
            Err(err) => panic!("stripe settings: {err}"),
        };
        let verifier = match StripeGateway::new(settings, clock) {
            Ok(gateway) => gateway,
            Err(err) => panic!("stripe client: {err}"),
        };
        Self {
            verifier,
            checkouts: Mutex::new(Vec::new()),
        }
    }

    /// Checkout requests received so far.
    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        lock(&self.checkouts).clone()
    }
}

#[async_trait]
impl PaymentGateway for TestPaymentGateway {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let mut checkouts = lock(&self.checkouts);
        checkouts.push(request.clone());
        let session_id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutSession {
            url: parse_url(&format!("https://checkout.stripe.test/pay/{session_id}")),
            session_id,
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError> {
        self.verifier.verify_event(payload, signature)
    }
}

/// `Stripe-Signature` header value for `payload` signed at `timestamp`.
///
/// # Panics
///
/// Never in practice; HMAC accepts keys of any length.
pub fn sign_webhook(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(err) => panic!("hmac key: {err}"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Fully wired in-memory application.
pub struct TestServices {
    pub state: HttpState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<MutableClock>,
    pub mailer: Arc<RecordingMailer>,
    pub vision: Arc<SwitchableVisionModel>,
    pub gateway: Arc<TestPaymentGateway>,
}

impl TestServices {
    /// Credit `tokens` as if a checkout for them had completed.
    ///
    /// # Panics
    ///
    /// Panics if the account does not exist.
    pub async fn credit_tokens(&self, user_id: &UserId, tokens: i64) -> i64 {
        let purchase = NewTokenPurchase {
            user_id: *user_id,
            tokens,
            price_cents: 0,
            currency: "usd".to_owned(),
            external_payment_id: format!("pi_test_{}", uuid::Uuid::new_v4().simple()),
        };
        match self.store.record_purchase(&purchase).await {
            Ok(PurchaseOutcome::Credited { balance }) => balance,
            other => panic!("credit tokens: {other:?}"),
        }
    }

    /// Give the user an active subscription for the current month.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the subscription.
    pub async fn subscribe(&self, user_id: &UserId, tier: SubscriptionTier) {
        let start = self.clock.utc();
        let upsert = SubscriptionUpsert {
            user_id: *user_id,
            external_subscription_id: format!("sub_test_{}", uuid::Uuid::new_v4().simple()),
            tier,
            status: SubscriptionStatus::Active,
            current_period_start: start,
            current_period_end: start + chrono::Duration::days(30),
        };
        if let Err(err) = self.store.upsert(&upsert).await {
            panic!("subscribe: {err}");
        }
    }
}

/// Build every service over a fresh store with the clock at `now`.
///
/// # Panics
///
/// Panics if the scrypt parameters or test URLs are rejected.
pub fn in_memory_services(now: DateTime<Utc>) -> TestServices {
    let clock = Arc::new(MutableClock::new(now));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(InMemoryStore::new(dyn_clock.clone()));
    let mailer = Arc::new(RecordingMailer::default());
    let vision = Arc::new(SwitchableVisionModel::default());
    let gateway = Arc::new(TestPaymentGateway::new(dyn_clock.clone()));
    let hasher = match ScryptPasswordHasher::new(TEST_SCRYPT_LOG_N) {
        Ok(hasher) => Arc::new(hasher),
        Err(err) => panic!("scrypt params: {err}"),
    };
    let public_url = parse_url(TEST_PUBLIC_URL);

    let accounts = Arc::new(AccountService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        hasher,
        mailer.clone(),
        dyn_clock.clone(),
        public_url.clone(),
    ));
    let tokens = Arc::new(TokenService::new(store.clone(), store.clone()));
    let subscriptions = Arc::new(SubscriptionService::new(store.clone(), dyn_clock.clone()));
    let saved_answers = Arc::new(SavedAnswerService::new(
        store.clone(),
        store.clone(),
        dyn_clock.clone(),
    ));
    let analysis = Arc::new(AnalysisService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        vision.clone(),
        Arc::new(NoOpAnalysisMetrics),
        PricingPolicy::default(),
        dyn_clock.clone(),
    ));
    let billing = Arc::new(BillingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        gateway.clone(),
        CheckoutSettings {
            success_url: public_url.join("billing/success").unwrap_or_else(|_| public_url.clone()),
            cancel_url: public_url.join("billing/cancel").unwrap_or_else(|_| public_url.clone()),
            basic_price_id: Some(TEST_BASIC_PRICE.to_owned()),
            pro_price_id: Some(TEST_PRO_PRICE.to_owned()),
        },
        dyn_clock,
    ));

    let state = HttpState {
        accounts: accounts.clone(),
        accounts_query: accounts,
        tokens: tokens.clone(),
        tokens_query: tokens,
        subscriptions,
        saved_answers: saved_answers.clone(),
        saved_answers_query: saved_answers,
        analysis,
        billing,
    };

    TestServices {
        state,
        store,
        clock,
        mailer,
        vision,
        gateway,
    }
}

/// Application exposing the full `/api` surface over `state`, with the
/// production session middleware on a throwaway key over plain HTTP.
pub fn test_app(
    state: HttpState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let sessions = SessionSettings {
        key: Key::generate(),
        cookie_secure: false,
        same_site: SameSite::Lax,
    }
    .middleware();
    App::new()
        .app_data(web::Data::new(state))
        .service(web::scope("/api").wrap(sessions).configure(configure_api))
}
