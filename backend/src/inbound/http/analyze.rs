//! Image explanation endpoint.
//!
//! Exactly one of `imageData` (a base64 `data:` URL) or `imageUrl` must be
//! present. The response reports which entitlement paid and what is left.

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::{AnalysisInput, AnalysisIntent, AnalysisOutcome, Error, ImageSource};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::analysis_error;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub source: ImageSource,
    /// `data:image/<type>;base64,<payload>`
    pub image_data: Option<String>,
    pub image_url: Option<String>,
    pub intent: Option<AnalysisIntent>,
    /// BCP 47 tag; defaults to `en`.
    #[schema(example = "en")]
    pub language: Option<String>,
}

impl TryFrom<&AnalyzeRequest> for AnalysisInput {
    type Error = Error;

    fn try_from(request: &AnalyzeRequest) -> Result<Self, Self::Error> {
        Self::try_new(
            request.source,
            request.image_data.as_deref(),
            request.image_url.as_deref(),
            request.intent,
            request.language.as_deref(),
        )
        .map_err(analysis_error)
    }
}

/// Explain an image.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Explanation", body = AnalysisOutcome),
        (status = 400, description = "Invalid image or options", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 402, description = "No entitlement can pay", body = Error),
        (status = 500, description = "Model failure; nothing was charged", body = Error)
    ),
    tags = ["analysis"],
    operation_id = "analyzeImage"
)]
#[post("/analyze")]
pub async fn analyze(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<AnalyzeRequest>,
) -> ApiResult<web::Json<AnalysisOutcome>> {
    let user_id = session.current_user()?;
    let input = AnalysisInput::try_from(&payload.0)?;
    debug!(user_id = %user_id, source = ?payload.source, "analysis requested");
    let outcome = state.analysis.analyze(&user_id, input).await?;
    Ok(web::Json(outcome))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use crate::inbound::http::test_utils::sign_up;
    use crate::test_support::http::{TestServices, in_memory_services, test_app};

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[fixture]
    fn services() -> TestServices {
        in_memory_services(
            Utc.with_ymd_and_hms(2026, 8, 20, 10, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    fn camera_shot() -> Value {
        json!({ "source": "camera", "imageData": PIXEL, "intent": "safety" })
    }

    #[rstest]
    #[actix_web::test]
    async fn free_answers_pay_first(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "snap@example.com").await;

        let outcome: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/analyze")
                .cookie(cookie)
                .set_json(camera_shot())
                .to_request(),
        )
        .await;
        assert_eq!(outcome["paymentSource"], "free_answer");
        assert_eq!(outcome["intent"], "safety");
        assert_eq!(outcome["language"], "en");
        assert_eq!(outcome["tokensCharged"], 0);
        assert_eq!(outcome["remaining"]["freeAnswersRemaining"], 2);
        assert!(outcome["summary"].is_string());
        assert_eq!(services.store.usage_records().len(), 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn exhausted_user_gets_payment_required(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "broke@example.com").await;
        for _ in 0..3 {
            let response = actix_test::call_service(
                &app,
                actix_test::TestRequest::post()
                    .uri("/api/analyze")
                    .cookie(cookie.clone())
                    .set_json(camera_shot())
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/analyze")
                .cookie(cookie)
                .set_json(camera_shot())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(services.vision.calls(), 3);
    }

    #[rstest]
    #[actix_web::test]
    async fn model_failure_refunds_the_free_answer(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "flaky@example.com").await;
        services.vision.set_failing(true);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/analyze")
                .cookie(cookie.clone())
                .set_json(camera_shot())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: Value = actix_test::read_body_json(response).await;
        assert_eq!(error["message"], "Internal server error");

        let balance: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/tokens/balance")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(balance["freeAnswersRemaining"], 3);
    }

    #[rstest]
    #[case::no_image(json!({ "source": "upload" }), "image")]
    #[case::both_images(json!({ "source": "upload", "imageData": PIXEL, "imageUrl": "https://x.test/a.png" }), "image")]
    #[case::not_a_data_url(json!({ "source": "upload", "imageData": "aGVsbG8=" }), "imageData")]
    #[case::ftp_url(json!({ "source": "url", "imageUrl": "ftp://x.test/a.png" }), "imageUrl")]
    #[case::bad_language(json!({ "source": "camera", "imageData": PIXEL, "language": "not a tag!" }), "language")]
    #[actix_web::test]
    async fn invalid_requests_name_the_field(
        services: TestServices,
        #[case] body: Value,
        #[case] field: &str,
    ) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "snap@example.com").await;
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/analyze")
                .cookie(cookie)
                .set_json(body)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = actix_test::read_body_json(response).await;
        assert_eq!(error["details"]["field"], field);
        assert_eq!(services.vision.calls(), 0);
    }

    #[rstest]
    #[actix_web::test]
    async fn unknown_source_is_a_bad_body(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "snap@example.com").await;
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/analyze")
                .cookie(cookie)
                .set_json(json!({ "source": "scanner", "imageData": PIXEL }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
