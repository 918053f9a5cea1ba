//! Test helpers for inbound HTTP components.

use actix_http::Request;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{Value, json};

use crate::domain::UserId;
use crate::inbound::http::session_config::SESSION_COOKIE_NAME;

/// Cookie sessions over plain HTTP with a fresh key per call.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name(SESSION_COOKIE_NAME.to_owned())
        .cookie_secure(false)
        .build()
}

/// The `session` cookie set by a response.
pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .expect("session cookie set")
        .into_owned()
}

/// Register `email` and return its session cookie and id.
pub async fn sign_up<S>(app: &S, email: &str) -> (Cookie<'static>, UserId)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let response = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": email, "password": "correct horse" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "sign up {email}");
    let cookie = session_cookie(&response);
    let profile: Value = test::read_body_json(response).await;
    let id = profile["id"]
        .as_str()
        .and_then(|raw| UserId::new(raw).ok())
        .expect("profile carries a user id");
    (cookie, id)
}
