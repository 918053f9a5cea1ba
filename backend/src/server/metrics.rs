//! Prometheus request metrics, switchable at start-up.
//!
//! `actix-web-prom` changes the response body type, so both arms box the
//! body and the app type stays the same whether or not metrics are on.

use std::sync::Arc;

use actix_service::boxed::{self, BoxService};
use actix_service::{Service, ServiceExt as _, Transform};
use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::PrometheusMetrics;
use futures_util::future::LocalBoxFuture;

type Boxed = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;

/// Records request counts and latencies when a collector is present.
#[derive(Clone, Default)]
pub(crate) struct MetricsLayer {
    collector: Option<Arc<PrometheusMetrics>>,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(collector: Option<PrometheusMetrics>) -> Self {
        Self {
            collector: collector.map(Arc::new),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = Boxed;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        let Some(collector) = self.collector.clone() else {
            let passthrough = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
            return Box::pin(async move { Ok(boxed::service(passthrough)) });
        };
        let wrapping = Compat::new(PrometheusMetrics::clone(&collector)).new_transform(service);
        Box::pin(async move { wrapping.await.map(boxed::service) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};
    use actix_web_prom::PrometheusMetricsBuilder;

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn disabled_layer_passes_requests_through() {
        let app = test::init_service(
            App::new()
                .wrap(MetricsLayer::default())
                .route("/api/tokens/packages", web::get().to(ok)),
        )
        .await;
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/tokens/packages").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let scrape =
            test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(scrape.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn enabled_layer_exposes_request_counts() {
        let collector = PrometheusMetricsBuilder::new("snapwise_test")
            .endpoint("/metrics")
            .build()
            .expect("metrics collector");
        let app = test::init_service(
            App::new()
                .wrap(MetricsLayer::from_option(Some(collector)))
                .route("/api/tokens/packages", web::get().to(ok)),
        )
        .await;
        test::call_service(
            &app,
            test::TestRequest::get().uri("/api/tokens/packages").to_request(),
        )
        .await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/metrics").to_request(),
        )
        .await;
        let text = String::from_utf8(body.to_vec()).expect("utf-8 exposition");
        assert!(text.contains("snapwise_test_http_requests_total"));
    }
}
