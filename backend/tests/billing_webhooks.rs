//! Payment provider events delivered through the signed webhook.
//!
//! The provider retries deliveries, so every event here is sent more than
//! once and must take effect exactly once.

#[expect(
    dead_code,
    reason = "Shared helpers include analysis calls this suite does not make."
)]
#[path = "support/api.rs"]
mod api;

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test as actix_test;
use api::{at, get_json, sign_up};
use backend::domain::{SubscriptionStatus, SubscriptionTier, UserId};
use backend::test_support::http::{
    TEST_WEBHOOK_SECRET, TestServices, in_memory_services, sign_webhook, test_app,
};
use chrono::{DateTime, Utc};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

fn now() -> DateTime<Utc> {
    at(2026, 9, 1, 12, 0)
}

#[fixture]
fn services() -> TestServices {
    in_memory_services(now())
}

fn event(id: &str, event_type: &str, object: Value) -> Vec<u8> {
    json!({ "id": id, "type": event_type, "data": { "object": object } })
        .to_string()
        .into_bytes()
}

async fn deliver<S>(app: &S, payload: &[u8]) -> StatusCode
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let signature = sign_webhook(payload, TEST_WEBHOOK_SECRET, now().timestamp());
    actix_test::call_service(
        app,
        actix_test::TestRequest::post()
            .uri("/api/stripe/webhook")
            .insert_header(("Stripe-Signature", signature))
            .insert_header(("content-type", "application/json"))
            .set_payload(payload.to_vec())
            .to_request(),
    )
    .await
    .status()
}

fn token_checkout(event_id: &str, user_id: &UserId, payment_intent: &str) -> Vec<u8> {
    event(
        event_id,
        "checkout.session.completed",
        json!({
            "id": format!("cs_{event_id}"),
            "mode": "payment",
            "payment_status": "paid",
            "payment_intent": payment_intent,
            "amount_total": 1999,
            "currency": "usd",
            "metadata": { "user_id": user_id.to_string(), "package_id": "bulk" }
        }),
    )
}

#[rstest]
#[actix_web::test]
async fn token_purchase_is_credited_once(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let (cookie, user_id) = sign_up(&app, "buyer@example.com").await;

    let first = token_checkout("evt_1", &user_id, "pi_1");
    assert_eq!(deliver(&app, &first).await, StatusCode::OK);
    assert_eq!(deliver(&app, &first).await, StatusCode::OK);
    let redelivered = token_checkout("evt_2", &user_id, "pi_1");
    assert_eq!(deliver(&app, &redelivered).await, StatusCode::OK);

    let balance = get_json(&app, &cookie, "/api/tokens/balance").await;
    let purchases = get_json(&app, &cookie, "/api/tokens/purchases").await;
    let purchases = purchases.as_array().expect("purchase list");
    assert_eq!(purchases.len(), 1);
    let credited = purchases[0]["tokens"].as_i64().expect("token count");
    assert!(credited > 0);
    assert_eq!(balance["tokenBalance"], credited);
}

#[rstest]
#[actix_web::test]
async fn unpaid_checkout_credits_nothing(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let (cookie, user_id) = sign_up(&app, "pending@example.com").await;
    let payload = event(
        "evt_3",
        "checkout.session.completed",
        json!({
            "id": "cs_pending",
            "mode": "payment",
            "payment_status": "unpaid",
            "metadata": { "user_id": user_id.to_string(), "package_id": "starter" }
        }),
    );
    assert_eq!(deliver(&app, &payload).await, StatusCode::OK);

    let balance = get_json(&app, &cookie, "/api/tokens/balance").await;
    assert_eq!(balance["tokenBalance"], 0);
}

#[rstest]
#[actix_web::test]
async fn subscription_lifecycle_keeps_a_single_row(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let (cookie, user_id) = sign_up(&app, "member@example.com").await;
    let metadata = json!({ "user_id": user_id.to_string(), "tier": "pro" });

    let completed = event(
        "evt_10",
        "checkout.session.completed",
        json!({
            "id": "cs_sub",
            "mode": "subscription",
            "subscription": "sub_42",
            "metadata": metadata
        }),
    );
    let period_start = now().timestamp();
    let period_end = period_start + 30 * 24 * 3600;
    let created = event(
        "evt_11",
        "customer.subscription.created",
        json!({
            "id": "sub_42",
            "status": "active",
            "items": { "data": [{
                "current_period_start": period_start,
                "current_period_end": period_end
            }]},
            "metadata": metadata
        }),
    );
    for payload in [&completed, &created, &completed, &created] {
        assert_eq!(deliver(&app, payload).await, StatusCode::OK);
    }

    let rows = services.store.subscriptions_of(&user_id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tier, SubscriptionTier::Pro);
    assert_eq!(rows[0].current_period_end.timestamp(), period_end);

    let current = get_json(&app, &cookie, "/api/subscription").await;
    assert_eq!(current["subscription"]["tier"], "pro");
    assert_eq!(current["subscription"]["dailyCap"], 150);
    let premium = get_json(&app, &cookie, "/api/subscription/check-premium").await;
    assert_eq!(premium["isPremium"], true);

    let failed = event(
        "evt_12",
        "invoice.payment_failed",
        json!({ "id": "in_1", "subscription": "sub_42" }),
    );
    assert_eq!(deliver(&app, &failed).await, StatusCode::OK);
    assert_eq!(
        services.store.subscriptions_of(&user_id)[0].status,
        SubscriptionStatus::PastDue
    );

    let deleted = event("evt_13", "customer.subscription.deleted", json!({ "id": "sub_42" }));
    assert_eq!(deliver(&app, &deleted).await, StatusCode::OK);
    let premium = get_json(&app, &cookie, "/api/subscription/check-premium").await;
    assert_eq!(premium["isPremium"], false);
    assert_eq!(services.store.subscriptions_of(&user_id).len(), 1);
}

fn subscription_created(event_id: &str, subscription_id: &str, user_id: &UserId, tier: &str) -> Vec<u8> {
    let period_start = now().timestamp();
    event(
        event_id,
        "customer.subscription.created",
        json!({
            "id": subscription_id,
            "status": "active",
            "items": { "data": [{
                "current_period_start": period_start,
                "current_period_end": period_start + 30 * 24 * 3600
            }]},
            "metadata": { "user_id": user_id.to_string(), "tier": tier }
        }),
    )
}

#[rstest]
#[actix_web::test]
async fn cancelling_the_old_plan_after_an_upgrade_keeps_premium(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let (cookie, user_id) = sign_up(&app, "upgrader@example.com").await;

    let basic = subscription_created("evt_50", "sub_basic", &user_id, "basic");
    assert_eq!(deliver(&app, &basic).await, StatusCode::OK);
    services.clock.advance(chrono::Duration::seconds(60));
    let pro = subscription_created("evt_51", "sub_pro", &user_id, "pro");
    assert_eq!(deliver(&app, &pro).await, StatusCode::OK);
    services.clock.advance(chrono::Duration::seconds(60));

    let cancel_old = event(
        "evt_52",
        "customer.subscription.deleted",
        json!({ "id": "sub_basic" }),
    );
    assert_eq!(deliver(&app, &cancel_old).await, StatusCode::OK);
    assert_eq!(services.store.subscriptions_of(&user_id).len(), 2);

    let current = get_json(&app, &cookie, "/api/subscription").await;
    assert_eq!(current["subscription"]["tier"], "pro");
    assert_eq!(current["subscription"]["status"], "active");
    let premium = get_json(&app, &cookie, "/api/subscription/check-premium").await;
    assert_eq!(premium["isPremium"], true);
}

#[rstest]
#[actix_web::test]
async fn events_for_unknown_accounts_are_acknowledged(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let stranger = UserId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");
    let payload = token_checkout("evt_20", &stranger, "pi_stranger");
    assert_eq!(deliver(&app, &payload).await, StatusCode::OK);
    assert!(services.store.subscriptions_of(&stranger).is_empty());
}

#[rstest]
#[actix_web::test]
async fn unhandled_event_types_are_acknowledged(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let payload = event("evt_30", "charge.refunded", json!({ "id": "ch_1" }));
    assert_eq!(deliver(&app, &payload).await, StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn stale_signatures_are_rejected(services: TestServices) {
    let app = actix_test::init_service(test_app(services.state.clone())).await;
    let (cookie, user_id) = sign_up(&app, "late@example.com").await;
    let payload = token_checkout("evt_40", &user_id, "pi_late");
    let signature = sign_webhook(&payload, TEST_WEBHOOK_SECRET, now().timestamp() - 3600);
    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/api/stripe/webhook")
            .insert_header(("Stripe-Signature", signature))
            .set_payload(payload)
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let balance = get_json(&app, &cookie, "/api/tokens/balance").await;
    assert_eq!(balance["tokenBalance"], 0);
}
