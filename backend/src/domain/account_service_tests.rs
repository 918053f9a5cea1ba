//! Tests for the account service.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rstest::rstest;

use super::*;
use crate::domain::ports::{
    AccountRepositoryError, MockAccountRepository, MockMailer, MockPasswordHasher,
    MockPasswordResetRepository, MockSubscriptionRepository,
};
use crate::domain::{ErrorCode, month_start};
use crate::test_support::MutableClock;

type Service =
    AccountService<MockAccountRepository, MockSubscriptionRepository, MockPasswordResetRepository>;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid fixture timestamp")
}

fn account(free_answers: u32, reset_at: DateTime<Utc>) -> Account {
    Account {
        id: UserId::random(),
        email: Email::new("ada@example.com").expect("valid email"),
        password_hash: PasswordHash::new("stored-hash"),
        token_balance: 0,
        free_answers_remaining: free_answers,
        free_answers_reset_at: reset_at,
        created_at: reset_at,
    }
}

struct Mocks {
    accounts: MockAccountRepository,
    subscriptions: MockSubscriptionRepository,
    resets: MockPasswordResetRepository,
    hasher: MockPasswordHasher,
    mailer: MockMailer,
}

impl Mocks {
    fn new() -> Self {
        Self {
            accounts: MockAccountRepository::new(),
            subscriptions: MockSubscriptionRepository::new(),
            resets: MockPasswordResetRepository::new(),
            hasher: MockPasswordHasher::new(),
            mailer: MockMailer::new(),
        }
    }

    fn into_service(self) -> Service {
        AccountService::new(
            Arc::new(self.accounts),
            Arc::new(self.subscriptions),
            Arc::new(self.resets),
            Arc::new(self.hasher),
            Arc::new(self.mailer),
            Arc::new(MutableClock::new(now())),
            Url::parse("https://app.snapwise.test/").expect("valid url"),
        )
    }
}

fn password_accepted(hasher: &mut MockPasswordHasher, accepted: bool) {
    hasher
        .expect_verify()
        .return_once(move |_, _| Ok(accepted));
}

#[tokio::test]
async fn register_grants_monthly_allowance() {
    let mut mocks = Mocks::new();
    mocks
        .hasher
        .expect_hash()
        .withf(|password| password == "correct horse")
        .return_once(|_| Ok(PasswordHash::new("hashed")));
    mocks
        .accounts
        .expect_insert()
        .withf(|new| {
            new.free_answers_remaining == FREE_ANSWERS_PER_MONTH
                && new.free_answers_reset_at == now()
                && new.password_hash.as_str() == "hashed"
        })
        .return_once(|new| {
            Ok(Account {
                id: new.id,
                email: new.email.clone(),
                password_hash: new.password_hash.clone(),
                token_balance: 0,
                free_answers_remaining: new.free_answers_remaining,
                free_answers_reset_at: new.free_answers_reset_at,
                created_at: now(),
            })
        });

    let registration =
        Registration::try_from_parts("Ada@Example.com", "correct horse").expect("valid input");
    let profile = mocks
        .into_service()
        .register(registration)
        .await
        .expect("registered");

    assert_eq!(profile.email.as_ref(), "ada@example.com");
    assert_eq!(profile.free_answers_remaining, 3);
    assert_eq!(profile.token_balance, 0);
    assert!(!profile.is_premium);
}

#[tokio::test]
async fn register_reports_duplicate_email_as_conflict() {
    let mut mocks = Mocks::new();
    mocks
        .hasher
        .expect_hash()
        .return_once(|_| Ok(PasswordHash::new("hashed")));
    mocks
        .accounts
        .expect_insert()
        .return_once(|_| Err(AccountRepositoryError::duplicate_email()));

    let registration =
        Registration::try_from_parts("ada@example.com", "correct horse").expect("valid input");
    let error = mocks
        .into_service()
        .register(registration)
        .await
        .expect_err("duplicate");

    assert_eq!(error.code(), ErrorCode::Conflict);
}

#[rstest]
#[case::unknown_email(false)]
#[case::wrong_password(true)]
#[tokio::test]
async fn authenticate_hides_which_credential_failed(#[case] account_exists: bool) {
    let mut mocks = Mocks::new();
    let stored = account(3, now());
    mocks
        .accounts
        .expect_find_by_email()
        .return_once(move |_| Ok(account_exists.then_some(stored)));
    if account_exists {
        password_accepted(&mut mocks.hasher, false);
    }

    let credentials =
        LoginCredentials::try_from_parts("ada@example.com", "wrong-password").expect("valid");
    let error = mocks
        .into_service()
        .authenticate(credentials)
        .await
        .expect_err("rejected");

    assert_eq!(error.code(), ErrorCode::Unauthorized);
    assert_eq!(error.message(), INVALID_CREDENTIALS);
}

#[tokio::test]
async fn authenticate_tops_up_allowance_in_a_new_month() {
    let last_month = Utc
        .with_ymd_and_hms(2026, 2, 20, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    let stored = account(0, last_month);
    let user_id = stored.id;
    let mut refreshed = stored.clone();
    refreshed.free_answers_remaining = FREE_ANSWERS_PER_MONTH;
    refreshed.free_answers_reset_at = now();

    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(stored)));
    password_accepted(&mut mocks.hasher, true);
    mocks
        .accounts
        .expect_reset_free_answers()
        .withf(move |id, allowance, period_start, at| {
            *id == user_id
                && *allowance == FREE_ANSWERS_PER_MONTH
                && *period_start == month_start(now())
                && *at == now()
        })
        .times(1)
        .return_once(|_, _, _, _| Ok(true));
    mocks
        .accounts
        .expect_find_by_id()
        .return_once(move |_| Ok(Some(refreshed)));
    mocks
        .subscriptions
        .expect_find_current()
        .return_once(|_, _| Ok(None));

    let credentials =
        LoginCredentials::try_from_parts("ada@example.com", "correct horse").expect("valid");
    let profile = mocks
        .into_service()
        .authenticate(credentials)
        .await
        .expect("signed in");

    assert_eq!(profile.free_answers_remaining, FREE_ANSWERS_PER_MONTH);
}

#[tokio::test]
async fn authenticate_within_the_same_month_leaves_allowance_alone() {
    let stored = account(1, month_start(now()));
    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(stored)));
    password_accepted(&mut mocks.hasher, true);
    mocks.accounts.expect_reset_free_answers().times(0);
    mocks
        .subscriptions
        .expect_find_current()
        .return_once(|_, _| Ok(None));

    let credentials =
        LoginCredentials::try_from_parts("ada@example.com", "correct horse").expect("valid");
    let profile = mocks
        .into_service()
        .authenticate(credentials)
        .await
        .expect("signed in");

    assert_eq!(profile.free_answers_remaining, 1);
}

#[rstest]
#[case::missing_current(None, ErrorCode::InvalidRequest)]
#[case::wrong_current(Some("not-my-password"), ErrorCode::Forbidden)]
#[tokio::test]
async fn password_change_requires_the_current_password(
    #[case] current: Option<&'static str>,
    #[case] expected: ErrorCode,
) {
    let stored = account(3, now());
    let user_id = stored.id;
    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_find_by_id()
        .return_once(move |_| Ok(Some(stored)));
    if current.is_some() {
        password_accepted(&mut mocks.hasher, false);
    }
    mocks.accounts.expect_update_password_hash().times(0);

    let update = ProfileUpdate {
        new_password: Some(NewPassword::new("brand new secret").expect("valid")),
        current_password: current.map(|value| zeroize::Zeroizing::new(value.to_owned())),
        ..ProfileUpdate::default()
    };
    let error = mocks
        .into_service()
        .update_profile(&user_id, update)
        .await
        .expect_err("rejected");

    assert_eq!(error.code(), expected);
}

#[tokio::test]
async fn delete_account_reports_missing_rows() {
    let mut mocks = Mocks::new();
    mocks.accounts.expect_delete().return_once(|_| Ok(false));

    let error = mocks
        .into_service()
        .delete_account(&UserId::random())
        .await
        .expect_err("missing");

    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_silent() {
    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_find_by_email()
        .return_once(|_| Ok(None));
    mocks.resets.expect_store().times(0);
    mocks.mailer.expect_send_password_reset().times(0);

    let email = Email::new("nobody@example.com").expect("valid email");
    mocks
        .into_service()
        .request_password_reset(&email)
        .await
        .expect("accepted");
}

#[tokio::test]
async fn password_reset_stores_only_the_token_hash() {
    let stored = account(3, now());
    let stored_hash = Arc::new(Mutex::new(None::<String>));
    let sent_link = Arc::new(Mutex::new(None::<Url>));

    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(stored)));
    let hash_sink = Arc::clone(&stored_hash);
    mocks
        .resets
        .expect_store()
        .withf(|_, _, expires_at| *expires_at == now() + RESET_TOKEN_TTL)
        .return_once(move |hash, _, _| {
            *hash_sink.lock().expect("hash lock") = Some(hash.to_owned());
            Ok(())
        });
    let link_sink = Arc::clone(&sent_link);
    mocks
        .mailer
        .expect_send_password_reset()
        .return_once(move |_, link| {
            *link_sink.lock().expect("link lock") = Some(link.clone());
            Ok(())
        });

    let email = Email::new("ada@example.com").expect("valid email");
    mocks
        .into_service()
        .request_password_reset(&email)
        .await
        .expect("accepted");

    let link = sent_link
        .lock()
        .expect("link lock")
        .clone()
        .expect("link sent");
    assert_eq!(link.path(), "/reset-password");
    let token = link
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .expect("token in link");
    assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
    let stored = stored_hash.lock().expect("hash lock").clone();
    assert_eq!(stored, Some(hash_reset_token(&token)));
    assert_ne!(stored, Some(token));
}

#[tokio::test]
async fn reset_password_rejects_unknown_tokens() {
    let mut mocks = Mocks::new();
    mocks.resets.expect_consume().return_once(|_, _| Ok(None));
    mocks.accounts.expect_update_password_hash().times(0);

    let error = mocks
        .into_service()
        .reset_password("deadbeef", NewPassword::new("brand new secret").expect("valid"))
        .await
        .expect_err("rejected");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
}
