//! Account lifecycle handlers.
//!
//! ```text
//! POST   /api/auth/register         {"email":"ada@example.com","password":"hunter22!"}
//! POST   /api/auth/login            {"email":"ada@example.com","password":"hunter22!"}
//! POST   /api/auth/logout
//! GET    /api/auth/user
//! PUT    /api/auth/profile          {"email":"new@example.com"}
//! DELETE /api/auth/account
//! POST   /api/auth/forgot-password  {"email":"ada@example.com"}
//! POST   /api/auth/reset-password   {"token":"...","password":"new-secret"}
//! ```

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::domain::{
    AccountProfile, Email, Error, ErrorCode, LoginCredentials, NewPassword, ProfileUpdate,
    Registration,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, NEW_PASSWORD, PASSWORD, account_error, credentials_error, missing_field_error,
};

/// Credentials for `register` and `login`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
}

/// Partial profile update; omitted fields stay unchanged.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Plain acknowledgement.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

const FORGOT_PASSWORD_ACK: &str = "If that email is registered, a reset link is on its way.";

fn parse_profile_request(payload: ProfileRequest) -> Result<ProfileUpdate, Error> {
    let email = payload
        .email
        .as_deref()
        .map(Email::new)
        .transpose()
        .map_err(account_error)?;
    let new_password = payload
        .new_password
        .as_deref()
        .map(NewPassword::new)
        .transpose()
        .map_err(|err| credentials_error(err, NEW_PASSWORD))?;
    if email.is_none() && new_password.is_none() {
        return Err(Error::invalid_request("nothing to update")
            .with_details(serde_json::json!({ "code": "empty_update" })));
    }
    Ok(ProfileUpdate {
        email,
        new_password,
        current_password: payload.current_password.map(Zeroizing::new),
    })
}

/// Create an account and sign it in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = AccountProfile,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid email or password", body = Error),
        (status = 409, description = "Email already registered", body = Error)
    ),
    tags = ["auth"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CredentialsRequest>,
) -> ApiResult<HttpResponse> {
    let CredentialsRequest { email, password } = payload.into_inner();
    let registration = Registration::try_from_parts(&email, &password)
        .map_err(|err| credentials_error(err, PASSWORD))?;
    let profile = state.accounts.register(registration).await?;
    session.sign_in(&profile.id)?;
    Ok(HttpResponse::Created().json(profile))
}

/// Authenticate and establish a session.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = AccountProfile,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Invalid credentials", body = Error)
    ),
    tags = ["auth"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CredentialsRequest>,
) -> ApiResult<web::Json<AccountProfile>> {
    let CredentialsRequest { email, password } = payload.into_inner();
    let credentials = LoginCredentials::try_from_parts(&email, &password)
        .map_err(|err| credentials_error(err, PASSWORD))?;
    let profile = state.accounts.authenticate(credentials).await?;
    session.sign_in(&profile.id)?;
    Ok(web::Json(profile))
}

/// End the session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Signed out")),
    tags = ["auth"],
    operation_id = "logout"
)]
#[post("/auth/logout")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.sign_out();
    HttpResponse::NoContent().finish()
}

/// Profile of the signed-in user.
#[utoipa::path(
    get,
    path = "/api/auth/user",
    responses(
        (status = 200, description = "Current account", body = AccountProfile),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["auth"],
    operation_id = "currentUser"
)]
#[get("/auth/user")]
pub async fn current_user(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<AccountProfile>> {
    let user_id = session.current_user()?;
    match state.accounts_query.current_user(&user_id).await {
        Ok(profile) => Ok(web::Json(profile)),
        Err(err) if err.code() == ErrorCode::Unauthorized => {
            // The account is gone; forget the stale cookie.
            session.sign_out();
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Change email and/or password.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountProfile),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 403, description = "Current password is wrong", body = Error),
        (status = 409, description = "Email already registered", body = Error)
    ),
    tags = ["auth"],
    operation_id = "updateProfile"
)]
#[put("/auth/profile")]
pub async fn update_profile(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<ProfileRequest>,
) -> ApiResult<web::Json<AccountProfile>> {
    let user_id = session.current_user()?;
    let update = parse_profile_request(payload.into_inner())?;
    let profile = state.accounts.update_profile(&user_id, update).await?;
    Ok(web::Json(profile))
}

/// Delete the signed-in account and everything it owns.
#[utoipa::path(
    delete,
    path = "/api/auth/account",
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["auth"],
    operation_id = "deleteAccount"
)]
#[delete("/auth/account")]
pub async fn delete_account(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.current_user()?;
    state.accounts.delete_account(&user_id).await?;
    session.sign_out();
    info!(user_id = %user_id, "session ended after account deletion");
    Ok(HttpResponse::NoContent().finish())
}

/// Email a password reset link. The answer never reveals whether the
/// address is registered.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Malformed email", body = Error)
    ),
    tags = ["auth"],
    operation_id = "forgotPassword",
    security([])
)]
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    state: web::Data<HttpState>,
    payload: web::Json<ForgotPasswordRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let email = Email::new(&payload.email).map_err(account_error)?;
    state.accounts.request_password_reset(&email).await?;
    Ok(web::Json(MessageResponse {
        message: FORGOT_PASSWORD_ACK.to_owned(),
    }))
}

/// Choose a new password with a reset token.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid, used or expired token", body = Error)
    ),
    tags = ["auth"],
    operation_id = "resetPassword",
    security([])
)]
#[post("/auth/reset-password")]
pub async fn reset_password(
    state: web::Data<HttpState>,
    payload: web::Json<ResetPasswordRequest>,
) -> ApiResult<web::Json<MessageResponse>> {
    let ResetPasswordRequest { token, password } = payload.into_inner();
    let token = token.trim();
    if token.is_empty() {
        return Err(missing_field_error(FieldName::new("token")));
    }
    let password = NewPassword::new(&password).map_err(|err| credentials_error(err, PASSWORD))?;
    state.accounts.reset_password(token, password).await?;
    Ok(web::Json(MessageResponse {
        message: "Password updated; sign in with the new password.".to_owned(),
    }))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
