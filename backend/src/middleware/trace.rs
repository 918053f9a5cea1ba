//! Request correlation middleware.
//!
//! Every request is served inside a [`TraceId`] scope. A well-formed
//! `trace-id` sent by the client is kept; otherwise a new one is minted. The
//! identifier is echoed on the response and recorded on the request span,
//! together with the final status and latency.

use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, info, info_span, warn};

use crate::domain::{TRACE_ID_HEADER, TraceId};

/// Wraps an application so each request carries a [`TraceId`].
///
/// # Examples
/// ```
/// use actix_web::App;
/// use backend::Trace;
///
/// let app = App::new().wrap(Trace);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, inner: S) -> Self::Future {
        ready(Ok(TraceService { inner }))
    }
}

#[doc(hidden)]
pub struct TraceService<S> {
    inner: S,
}

fn echo_header<B>(response: &mut ServiceResponse<B>, trace_id: TraceId) {
    match HeaderValue::from_str(&trace_id.to_string()) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
        }
        Err(error) => warn!(%error, "trace id is not a valid header value"),
    }
}

impl<S, B> Service<ServiceRequest> for TraceService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let supplied = req
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        let trace_id = TraceId::adopt_or_generate(supplied);
        let span = info_span!(
            "request",
            trace_id = %trace_id,
            method = %req.method(),
            path = %req.path(),
        );
        let started = Instant::now();
        let pending = self.inner.call(req);

        let handled = async move {
            let mut response = pending.await?;
            echo_header(&mut response, trace_id);
            info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                "request completed"
            );
            Ok(response)
        };
        Box::pin(trace_id.scope(handled.instrument(span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::BoxBody;
    use actix_web::{App, HttpResponse, test, web};

    use crate::domain::{ApiResult, Error as DomainError};

    async fn echo_current() -> HttpResponse {
        let current = TraceId::current().map(|id| id.to_string());
        HttpResponse::Ok().body(current.unwrap_or_default())
    }

    async fn missing() -> ApiResult<HttpResponse> {
        Err(DomainError::not_found("no such answer"))
    }

    async fn call(request: test::TestRequest) -> ServiceResponse<BoxBody> {
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/echo", web::get().to(echo_current))
                .route("/missing", web::get().to(missing)),
        )
        .await;
        test::call_service(&app, request.to_request()).await
    }

    fn header(response: &ServiceResponse<BoxBody>) -> String {
        response
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .expect("trace id header")
            .to_owned()
    }

    #[actix_web::test]
    async fn handler_sees_the_echoed_identifier() {
        let response = call(test::TestRequest::get().uri("/echo")).await;
        let echoed = header(&response);
        let body = test::read_body(response).await;
        assert_eq!(body.as_ref(), echoed.as_bytes());
    }

    #[actix_web::test]
    async fn client_supplied_identifier_is_kept() {
        let supplied = "0f8fad5b-d9cb-469f-a165-70867728950e";
        let response = call(
            test::TestRequest::get()
                .uri("/echo")
                .insert_header((TRACE_ID_HEADER, supplied)),
        )
        .await;
        assert_eq!(header(&response), supplied);
    }

    #[actix_web::test]
    async fn malformed_client_identifier_is_replaced() {
        let response = call(
            test::TestRequest::get()
                .uri("/echo")
                .insert_header((TRACE_ID_HEADER, "abc")),
        )
        .await;
        let echoed = header(&response);
        assert_ne!(echoed, "abc");
        assert!(echoed.parse::<TraceId>().is_ok());
    }

    #[actix_web::test]
    async fn error_envelope_matches_the_header() {
        let response = call(test::TestRequest::get().uri("/missing")).await;
        let echoed = header(&response);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["traceId"], echoed.as_str());
    }
}
