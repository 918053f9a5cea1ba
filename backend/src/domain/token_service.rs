//! Token ledger service: balances, purchase history and direct deductions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{
    AccountRepository, TokenBalance, TokenCommand, TokenPurchaseRepository, TokenQuery,
};
use crate::domain::service_support::{load_account, map_account_error, map_purchase_error};
use crate::domain::{Error, TOKEN_PACKAGES, TokenPackage, TokenPurchase, UserId};

/// Token service implementing [`TokenQuery`] and [`TokenCommand`].
#[derive(Clone)]
pub struct TokenService<A, P> {
    accounts: Arc<A>,
    purchases: Arc<P>,
}

impl<A, P> TokenService<A, P> {
    /// Create a new service with the given repositories.
    pub fn new(accounts: Arc<A>, purchases: Arc<P>) -> Self {
        Self {
            accounts,
            purchases,
        }
    }
}

#[async_trait]
impl<A, P> TokenQuery for TokenService<A, P>
where
    A: AccountRepository,
    P: TokenPurchaseRepository,
{
    async fn balance(&self, user_id: &UserId) -> Result<TokenBalance, Error> {
        let account = load_account(self.accounts.as_ref(), user_id).await?;
        Ok(TokenBalance {
            token_balance: account.token_balance,
            free_answers_remaining: account.free_answers_remaining,
        })
    }

    async fn purchases(&self, user_id: &UserId) -> Result<Vec<TokenPurchase>, Error> {
        self.purchases
            .list_for_user(user_id)
            .await
            .map_err(map_purchase_error)
    }

    fn packages(&self) -> Vec<TokenPackage> {
        TOKEN_PACKAGES.to_vec()
    }
}

#[async_trait]
impl<A, P> TokenCommand for TokenService<A, P>
where
    A: AccountRepository,
    P: TokenPurchaseRepository,
{
    async fn deduct(&self, user_id: &UserId, amount: i64) -> Result<TokenBalance, Error> {
        if amount <= 0 {
            return Err(Error::invalid_request("amount must be a positive integer"));
        }
        let account = load_account(self.accounts.as_ref(), user_id).await?;
        let balance = self
            .accounts
            .deduct_tokens(user_id, amount)
            .await
            .map_err(map_account_error)?
            .ok_or_else(|| {
                Error::payment_required("insufficient token balance").with_details(
                    serde_json::json!({ "tokenBalance": account.token_balance, "requested": amount }),
                )
            })?;
        Ok(TokenBalance {
            token_balance: balance,
            free_answers_remaining: account.free_answers_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockAccountRepository, MockTokenPurchaseRepository};
    use crate::domain::{Account, Email, ErrorCode, PasswordHash};
    use chrono::Utc;
    use rstest::rstest;

    fn account(balance: i64) -> Account {
        Account {
            id: UserId::random(),
            email: Email::new("ada@example.com").expect("valid email"),
            password_hash: PasswordHash::new("hash"),
            token_balance: balance,
            free_answers_remaining: 2,
            free_answers_reset_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn service(
        accounts: MockAccountRepository,
    ) -> TokenService<MockAccountRepository, MockTokenPurchaseRepository> {
        TokenService::new(
            Arc::new(accounts),
            Arc::new(MockTokenPurchaseRepository::new()),
        )
    }

    #[rstest]
    #[case(0)]
    #[case(-5)]
    #[tokio::test]
    async fn deduct_rejects_non_positive_amounts(#[case] amount: i64) {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_deduct_tokens().times(0);

        let error = service(accounts)
            .deduct(&UserId::random(), amount)
            .await
            .expect_err("invalid amount");

        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn deduct_refuses_to_overdraw() {
        let stored = account(3);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(stored)));
        accounts
            .expect_deduct_tokens()
            .withf(|_, amount| *amount == 10)
            .return_once(|_, _| Ok(None));

        let error = service(accounts)
            .deduct(&UserId::random(), 10)
            .await
            .expect_err("insufficient");

        assert_eq!(error.code(), ErrorCode::PaymentRequired);
    }

    #[tokio::test]
    async fn deduct_returns_the_new_balance() {
        let stored = account(30);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(stored)));
        accounts
            .expect_deduct_tokens()
            .return_once(|_, _| Ok(Some(20)));

        let balance = service(accounts)
            .deduct(&UserId::random(), 10)
            .await
            .expect("deducted");

        assert_eq!(balance.token_balance, 20);
        assert_eq!(balance.free_answers_remaining, 2);
    }

    #[test]
    fn packages_are_listed_in_price_order() {
        let packages = service(MockAccountRepository::new()).packages();
        let ids: Vec<_> = packages.iter().map(|package| package.id).collect();
        assert_eq!(ids, ["starter", "standard", "bulk"]);
    }
}
