//! Subscription status endpoints.

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Error, SubscriptionSummary};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Latest subscription; `null` when the user never subscribed.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription: Option<SubscriptionSummary>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PremiumResponse {
    pub is_premium: bool,
}

#[utoipa::path(
    get,
    path = "/api/subscription",
    responses(
        (status = 200, description = "Current subscription", body = SubscriptionResponse),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["subscription"],
    operation_id = "currentSubscription"
)]
#[get("/subscription")]
pub async fn current(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<SubscriptionResponse>> {
    let user_id = session.current_user()?;
    let subscription = state.subscriptions.current(&user_id).await?;
    Ok(web::Json(SubscriptionResponse { subscription }))
}

#[utoipa::path(
    get,
    path = "/api/subscription/check-premium",
    responses(
        (status = 200, description = "Premium flag", body = PremiumResponse),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["subscription"],
    operation_id = "checkPremium"
)]
#[get("/subscription/check-premium")]
pub async fn check_premium(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<PremiumResponse>> {
    let user_id = session.current_user()?;
    let is_premium = state.subscriptions.is_premium(&user_id).await?;
    Ok(web::Json(PremiumResponse { is_premium }))
}
