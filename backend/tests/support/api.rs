//! HTTP helpers shared by the end-to-end suites.
//!
//! Each suite drives the full `/api` surface built by
//! `backend::test_support::http::test_app` over in-memory storage.

use actix_http::Request;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use backend::domain::UserId;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

pub const PASSWORD: &str = "correct horse";

/// A 1x1 transparent PNG.
pub const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
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
            .set_json(json!({ "email": email, "password": PASSWORD }))
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

/// Log in with `password` and return the session cookie and profile.
pub async fn log_in<S>(app: &S, email: &str, password: &str) -> (Cookie<'static>, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let response = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "log in {email}");
    let cookie = session_cookie(&response);
    (cookie, test::read_body_json(response).await)
}

/// Request an explanation of [`PIXEL`].
pub async fn analyze<S>(app: &S, cookie: &Cookie<'static>) -> ServiceResponse
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    test::call_service(
        app,
        test::TestRequest::post()
            .uri("/api/analyze")
            .cookie(cookie.clone())
            .set_json(json!({ "source": "camera", "imageData": PIXEL }))
            .to_request(),
    )
    .await
}

/// `GET` a JSON resource as the session owner.
pub async fn get_json<S>(app: &S, cookie: &Cookie<'static>, uri: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    test::call_and_read_body_json(
        app,
        test::TestRequest::get()
            .uri(uri)
            .cookie(cookie.clone())
            .to_request(),
    )
    .await
}
