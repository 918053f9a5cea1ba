//! Tests for the in-memory store.

use chrono::{Duration, TimeZone};
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::domain::{ContentType, SubscriptionTier};
use crate::test_support::MutableClock;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 27, 23, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

struct Fixture {
    clock: Arc<MutableClock>,
    store: InMemoryStore,
}

#[fixture]
fn fixture() -> Fixture {
    let clock = Arc::new(MutableClock::new(start()));
    let store = InMemoryStore::new(clock.clone());
    Fixture { clock, store }
}

async fn register(store: &InMemoryStore, email: &str) -> Account {
    let new = NewAccount {
        id: UserId::random(),
        email: Email::new(email).expect("valid email"),
        password_hash: PasswordHash::new("00:00"),
        free_answers_remaining: 3,
        free_answers_reset_at: start(),
    };
    AccountRepository::insert(store, &new)
        .await
        .expect("account stored")
}

async fn subscribe(store: &InMemoryStore, user_id: UserId, external_id: &str) -> Subscription {
    store
        .upsert(&SubscriptionUpsert {
            user_id,
            external_subscription_id: external_id.to_owned(),
            tier: SubscriptionTier::Basic,
            status: SubscriptionStatus::Active,
            current_period_start: start(),
            current_period_end: start() + Duration::days(30),
        })
        .await
        .expect("subscription stored")
}

#[rstest]
#[tokio::test]
async fn emails_are_unique(fixture: Fixture) {
    register(&fixture.store, "ada@example.com").await;
    let clash = NewAccount {
        id: UserId::random(),
        email: Email::new("ADA@example.com").expect("valid email"),
        password_hash: PasswordHash::new("00:00"),
        free_answers_remaining: 3,
        free_answers_reset_at: start(),
    };

    let error = AccountRepository::insert(&fixture.store, &clash)
        .await
        .expect_err("duplicate");

    assert_eq!(error, AccountRepositoryError::DuplicateEmail);
}

#[rstest]
#[tokio::test]
async fn free_answers_cannot_go_negative(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;

    let mut consumed = 0;
    while fixture
        .store
        .consume_free_answer(&account.id)
        .await
        .expect("consume")
    {
        consumed += 1;
    }

    assert_eq!(consumed, 3);
}

#[rstest]
#[tokio::test]
async fn restoring_a_free_answer_stops_at_the_allowance(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    assert!(
        fixture
            .store
            .consume_free_answer(&account.id)
            .await
            .expect("consume")
    );
    // A monthly reset lands while the answer is held.
    let march = start() + Duration::days(2);
    assert!(
        fixture
            .store
            .reset_free_answers(&account.id, 3, march, march)
            .await
            .expect("reset")
    );

    fixture
        .store
        .restore_free_answer(&account.id, 3)
        .await
        .expect("restore");

    let stored = AccountRepository::find_by_id(&fixture.store, &account.id)
        .await
        .expect("lookup")
        .expect("account");
    assert_eq!(stored.free_answers_remaining, 3);
}

#[rstest]
#[tokio::test]
async fn reset_only_applies_before_the_period_start(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let march = start() + Duration::days(2);

    let stale = fixture
        .store
        .reset_free_answers(&account.id, 3, start(), march)
        .await
        .expect("reset");
    let fresh = fixture
        .store
        .reset_free_answers(&account.id, 3, march, march)
        .await
        .expect("reset");

    assert!(!stale);
    assert!(fresh);
}

#[rstest]
#[case::affordable(10, 4, Some(6))]
#[case::exact(10, 10, Some(0))]
#[case::short(10, 11, None)]
#[tokio::test]
async fn deduction_never_overdraws(
    fixture: Fixture,
    #[case] balance: i64,
    #[case] amount: i64,
    #[case] expected: Option<i64>,
) {
    let account = register(&fixture.store, "ada@example.com").await;
    fixture
        .store
        .record_purchase(&NewTokenPurchase {
            user_id: account.id,
            tokens: balance,
            price_cents: 100,
            currency: "usd".into(),
            external_payment_id: "pi_seed".into(),
        })
        .await
        .expect("seeded");

    let remaining = fixture
        .store
        .deduct_tokens(&account.id, amount)
        .await
        .expect("deduct");

    assert_eq!(remaining, expected);
}

#[rstest]
#[tokio::test]
async fn charges_saturate_at_zero(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;

    let charge = fixture
        .store
        .charge_tokens(&account.id, 25)
        .await
        .expect("charge");

    assert_eq!(
        charge,
        TokenCharge {
            charged: 0,
            balance: 0
        }
    );
}

#[rstest]
#[tokio::test]
async fn purchases_credit_once_per_payment_id(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let purchase = NewTokenPurchase {
        user_id: account.id,
        tokens: 500,
        price_cents: 799,
        currency: "usd".into(),
        external_payment_id: "pi_1".into(),
    };

    let first = fixture.store.record_purchase(&purchase).await.expect("first");
    let replay = fixture.store.record_purchase(&purchase).await.expect("replay");

    assert_eq!(first, PurchaseOutcome::Credited { balance: 500 });
    assert_eq!(replay, PurchaseOutcome::AlreadyRecorded);
    let listed = TokenPurchaseRepository::list_for_user(&fixture.store, &account.id)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[rstest]
#[tokio::test]
async fn daily_counter_rolls_over_at_utc_midnight(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let sub = subscribe(&fixture.store, account.id, "sub_1").await;
    let today = fixture.clock.utc().date_naive();

    assert!(fixture.store.reserve_daily_use(sub.id, today, 1).await.expect("reserve"));
    assert!(!fixture.store.reserve_daily_use(sub.id, today, 1).await.expect("reserve"));

    fixture.clock.advance(Duration::hours(2));
    let tomorrow = fixture.clock.utc().date_naive();
    assert_ne!(today, tomorrow);
    assert!(fixture.store.reserve_daily_use(sub.id, tomorrow, 1).await.expect("reserve"));
}

#[rstest]
#[tokio::test]
async fn release_ignores_counters_from_another_day(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let sub = subscribe(&fixture.store, account.id, "sub_1").await;
    let today = start().date_naive();
    fixture
        .store
        .reserve_daily_use(sub.id, today, 30)
        .await
        .expect("reserve");

    fixture
        .store
        .release_daily_use(sub.id, today.pred_opt().expect("yesterday"))
        .await
        .expect("release");

    let current = fixture
        .store
        .find_current(&account.id, start())
        .await
        .expect("lookup")
        .expect("subscription");
    assert_eq!(current.daily_usage_count, 1);
}

#[rstest]
#[tokio::test]
async fn upsert_keeps_one_row_per_external_id(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let first = subscribe(&fixture.store, account.id, "sub_1").await;
    fixture.clock.advance(Duration::minutes(1));

    let updated = fixture
        .store
        .upsert(&SubscriptionUpsert {
            user_id: account.id,
            external_subscription_id: "sub_1".into(),
            tier: SubscriptionTier::Pro,
            status: SubscriptionStatus::Active,
            current_period_start: start(),
            current_period_end: start() + Duration::days(30),
        })
        .await
        .expect("upsert");

    assert_eq!(updated.id, first.id);
    assert_eq!(updated.tier, SubscriptionTier::Pro);
    assert_eq!(updated.created_at, first.created_at);
}

#[rstest]
#[tokio::test]
async fn cancelling_a_superseded_plan_keeps_the_live_one_current(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    subscribe(&fixture.store, account.id, "sub_basic").await;
    fixture.clock.advance(Duration::minutes(5));
    let pro = subscribe(&fixture.store, account.id, "sub_pro").await;
    fixture.clock.advance(Duration::minutes(5));

    assert!(
        fixture
            .store
            .update_status("sub_basic", SubscriptionStatus::Canceled)
            .await
            .expect("status update")
    );

    let current = fixture
        .store
        .find_current(&account.id, fixture.clock.utc())
        .await
        .expect("lookup")
        .expect("subscription");
    assert_eq!(current.id, pro.id);
    assert_eq!(current.status, SubscriptionStatus::Active);
}

#[rstest]
#[tokio::test]
async fn saved_answers_are_scoped_to_their_owner(fixture: Fixture) {
    let owner = register(&fixture.store, "ada@example.com").await;
    let stranger = register(&fixture.store, "bob@example.com").await;
    let saved = SavedAnswerRepository::insert(
        &fixture.store,
        &owner.id,
        &NewSavedAnswer {
            content_type: ContentType::Analysis,
            title: "Kettle".into(),
            payload: json!({"summary": "Descale monthly."}),
            image_url: None,
        },
    )
    .await
    .expect("saved");

    let seen_by_stranger = fixture
        .store
        .find_for_user(&stranger.id, saved.id)
        .await
        .expect("lookup");
    let deleted_by_stranger = fixture
        .store
        .delete_for_user(&stranger.id, saved.id)
        .await
        .expect("delete");

    assert!(seen_by_stranger.is_none());
    assert!(!deleted_by_stranger);
    assert!(
        fixture
            .store
            .delete_for_user(&owner.id, saved.id)
            .await
            .expect("delete")
    );
}

#[rstest]
#[tokio::test]
async fn reset_tokens_redeem_once_before_expiry(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    let expires_at = start() + Duration::hours(1);
    fixture
        .store
        .store("digest", &account.id, expires_at)
        .await
        .expect("stored");

    let late = fixture
        .store
        .consume("digest", expires_at)
        .await
        .expect("consume");
    let redeemed = fixture.store.consume("digest", start()).await.expect("consume");
    let again = fixture.store.consume("digest", start()).await.expect("consume");

    assert_eq!(late, None);
    assert_eq!(redeemed, Some(account.id));
    assert_eq!(again, None);
}

#[rstest]
#[tokio::test]
async fn deleting_an_account_cascades(fixture: Fixture) {
    let account = register(&fixture.store, "ada@example.com").await;
    subscribe(&fixture.store, account.id, "sub_1").await;

    assert!(AccountRepository::delete(&fixture.store, &account.id).await.expect("delete"));

    let orphan = fixture
        .store
        .find_by_external_id("sub_1")
        .await
        .expect("lookup");
    assert!(orphan.is_none());
    assert!(!AccountRepository::delete(&fixture.store, &account.id).await.expect("delete"));
}
