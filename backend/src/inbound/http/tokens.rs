//! Token balance, purchase history and package catalogue.

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::TokenBalance;
use crate::domain::{Error, TokenPackage, TokenPurchase};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Direct deduction request.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeductRequest {
    #[schema(minimum = 1, example = 5)]
    pub amount: i64,
}

#[utoipa::path(
    get,
    path = "/api/tokens/balance",
    responses(
        (status = 200, description = "Spendable balances", body = TokenBalance),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "tokenBalance"
)]
#[get("/tokens/balance")]
pub async fn balance(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<TokenBalance>> {
    let user_id = session.current_user()?;
    Ok(web::Json(state.tokens_query.balance(&user_id).await?))
}

/// Purchases, newest first.
#[utoipa::path(
    get,
    path = "/api/tokens/purchases",
    responses(
        (status = 200, description = "Purchase history", body = [TokenPurchase]),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "tokenPurchases"
)]
#[get("/tokens/purchases")]
pub async fn purchases(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<TokenPurchase>>> {
    let user_id = session.current_user()?;
    Ok(web::Json(state.tokens_query.purchases(&user_id).await?))
}

/// Packages on sale. Public.
#[utoipa::path(
    get,
    path = "/api/tokens/packages",
    responses((status = 200, description = "Package catalogue", body = [TokenPackage])),
    tags = ["tokens"],
    operation_id = "tokenPackages",
    security([])
)]
#[get("/tokens/packages")]
pub async fn packages(state: web::Data<HttpState>) -> web::Json<Vec<TokenPackage>> {
    web::Json(state.tokens_query.packages())
}

/// Spend tokens outside of an analysis.
#[utoipa::path(
    post,
    path = "/api/tokens/deduct",
    request_body = DeductRequest,
    responses(
        (status = 200, description = "Remaining balances", body = TokenBalance),
        (status = 400, description = "Amount is not positive", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 402, description = "Balance too low", body = Error)
    ),
    tags = ["tokens"],
    operation_id = "deductTokens"
)]
#[post("/tokens/deduct")]
pub async fn deduct(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<DeductRequest>,
) -> ApiResult<web::Json<TokenBalance>> {
    let user_id = session.current_user()?;
    let remaining = state.tokens.deduct(&user_id, payload.amount).await?;
    Ok(web::Json(remaining))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::inbound::http::test_utils::sign_up;
    use crate::test_support::http::{TestServices, in_memory_services, test_app};

    fn services() -> TestServices {
        in_memory_services(
            Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    #[actix_web::test]
    async fn packages_are_public() {
        let services = services();
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let body: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/tokens/packages")
                .to_request(),
        )
        .await;
        let ids: Vec<&str> = body
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|package| package["id"].as_str())
            .collect();
        assert_eq!(ids, ["starter", "standard", "bulk"]);
        assert_eq!(body[0]["priceCents"], 199);
    }

    #[actix_web::test]
    async fn balance_and_history_reflect_purchases() {
        let services = services();
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, user_id) = sign_up(&app, "tok@example.com").await;
        services.credit_tokens(&user_id, 100).await;

        let balance: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/tokens/balance")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(balance, json!({ "tokenBalance": 100, "freeAnswersRemaining": 3 }));

        let history: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/tokens/purchases")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(history.as_array().map(Vec::len), Some(1));
        assert_eq!(history[0]["tokens"], 100);
        assert!(history[0].get("userId").is_none());
    }

    #[rstest]
    #[case::exact(10, StatusCode::OK)]
    #[case::too_many(11, StatusCode::PAYMENT_REQUIRED)]
    #[case::zero(0, StatusCode::BAD_REQUEST)]
    #[case::negative(-4, StatusCode::BAD_REQUEST)]
    #[actix_web::test]
    async fn deduct_checks_amount_and_balance(#[case] amount: i64, #[case] expected: StatusCode) {
        let services = services();
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, user_id) = sign_up(&app, "spend@example.com").await;
        services.credit_tokens(&user_id, 10).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/tokens/deduct")
                .cookie(cookie)
                .set_json(json!({ "amount": amount }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), expected);
    }

    #[actix_web::test]
    async fn balance_requires_login() {
        let services = services();
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/tokens/balance")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
