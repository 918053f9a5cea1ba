//! Saved answers. Creating one needs premium access; reading and deleting
//! only ever touch the caller's own answers.
//!
//! ```text
//! GET    /api/saved-answers
//! POST   /api/saved-answers       {"contentType":"analysis","title":"Heron","payload":{...}}
//! GET    /api/saved-answers/{id}
//! DELETE /api/saved-answers/{id}
//! ```

use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{ContentType, Error, NewSavedAnswer, SavedAnswer};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, parse_label, parse_uuid, saved_answer_error};

const ANSWER_ID: FieldName = FieldName::new("id");
const CONTENT_TYPE: FieldName = FieldName::new("contentType");

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    #[schema(example = "analysis")]
    pub content_type: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub payload: Value,
    pub image_url: Option<String>,
}

impl TryFrom<SaveAnswerRequest> for NewSavedAnswer {
    type Error = Error;

    fn try_from(request: SaveAnswerRequest) -> Result<Self, Self::Error> {
        let content_type: ContentType = parse_label(&request.content_type, CONTENT_TYPE)?;
        Self::try_new(
            content_type,
            &request.title,
            request.payload,
            request.image_url,
        )
        .map_err(saved_answer_error)
    }
}

#[utoipa::path(
    get,
    path = "/api/saved-answers",
    responses(
        (status = 200, description = "Saved answers, newest first", body = [SavedAnswer]),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["saved-answers"],
    operation_id = "listSavedAnswers"
)]
#[get("/saved-answers")]
pub async fn list(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<SavedAnswer>>> {
    let user_id = session.current_user()?;
    Ok(web::Json(state.saved_answers_query.list(&user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/saved-answers",
    request_body = SaveAnswerRequest,
    responses(
        (status = 201, description = "Answer saved", body = SavedAnswer),
        (status = 400, description = "Invalid answer", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 403, description = "Premium required", body = Error)
    ),
    tags = ["saved-answers"],
    operation_id = "createSavedAnswer"
)]
#[post("/saved-answers")]
pub async fn create(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<SaveAnswerRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.current_user()?;
    let answer = NewSavedAnswer::try_from(payload.into_inner())?;
    let saved = state.saved_answers.create(&user_id, answer).await?;
    Ok(HttpResponse::Created().json(saved))
}

#[utoipa::path(
    get,
    path = "/api/saved-answers/{id}",
    params(("id" = String, Path, description = "Saved answer id", format = Uuid)),
    responses(
        (status = 200, description = "Saved answer", body = SavedAnswer),
        (status = 400, description = "Malformed id", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 404, description = "No such answer for this user", body = Error)
    ),
    tags = ["saved-answers"],
    operation_id = "getSavedAnswer"
)]
#[get("/saved-answers/{id}")]
pub async fn get_one(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<SavedAnswer>> {
    let user_id = session.current_user()?;
    let id = parse_uuid(&path.into_inner(), ANSWER_ID)?;
    Ok(web::Json(state.saved_answers_query.get(&user_id, id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/saved-answers/{id}",
    params(("id" = String, Path, description = "Saved answer id", format = Uuid)),
    responses(
        (status = 204, description = "Answer deleted"),
        (status = 400, description = "Malformed id", body = Error),
        (status = 401, description = "Not signed in", body = Error),
        (status = 404, description = "No such answer for this user", body = Error)
    ),
    tags = ["saved-answers"],
    operation_id = "deleteSavedAnswer"
)]
#[delete("/saved-answers/{id}")]
pub async fn delete_one(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user_id = session.current_user()?;
    let id = parse_uuid(&path.into_inner(), ANSWER_ID)?;
    state.saved_answers.delete(&user_id, id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use crate::domain::SubscriptionTier;
    use crate::inbound::http::test_utils::sign_up;
    use crate::test_support::http::{TestServices, in_memory_services, test_app};

    #[fixture]
    fn services() -> TestServices {
        in_memory_services(
            Utc.with_ymd_and_hms(2026, 7, 9, 15, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    fn heron() -> Value {
        json!({
            "contentType": "analysis",
            "title": "  Grey heron  ",
            "payload": { "summary": "A wading bird" },
            "imageUrl": "https://img.example.com/heron.jpg"
        })
    }

    #[rstest]
    #[actix_web::test]
    async fn premium_user_round_trip(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, user_id) = sign_up(&app, "owner@example.com").await;
        services.subscribe(&user_id, SubscriptionTier::Pro).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/saved-answers")
                .cookie(cookie.clone())
                .set_json(heron())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let saved: Value = actix_test::read_body_json(response).await;
        assert_eq!(saved["title"], "Grey heron");
        let id = saved["id"].as_str().expect("id").to_owned();

        let listed: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/saved-answers")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::delete()
                .uri(&format!("/api/saved-answers/{id}"))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/api/saved-answers/{id}"))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[actix_web::test]
    async fn free_user_cannot_save(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "free@example.com").await;
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/saved-answers")
                .cookie(cookie)
                .set_json(heron())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[case::unknown_type(json!({ "contentType": "poem", "title": "t", "payload": {} }), "contentType")]
    #[case::blank_title(json!({ "contentType": "note", "title": "   ", "payload": {} }), "title")]
    #[case::array_payload(json!({ "contentType": "note", "title": "t", "payload": [1] }), "payload")]
    #[actix_web::test]
    async fn invalid_answers_name_the_field(
        services: TestServices,
        #[case] body: Value,
        #[case] field: &str,
    ) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, user_id) = sign_up(&app, "owner@example.com").await;
        services.subscribe(&user_id, SubscriptionTier::Basic).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/saved-answers")
                .cookie(cookie)
                .set_json(body)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = actix_test::read_body_json(response).await;
        assert_eq!(error["details"]["field"], field);
    }

    #[rstest]
    #[actix_web::test]
    async fn other_users_answers_are_invisible(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (owner, owner_id) = sign_up(&app, "owner@example.com").await;
        let (intruder, _) = sign_up(&app, "intruder@example.com").await;
        services.subscribe(&owner_id, SubscriptionTier::Basic).await;

        let saved: Value = actix_test::call_and_read_body_json(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/saved-answers")
                .cookie(owner.clone())
                .set_json(heron())
                .to_request(),
        )
        .await;
        let uri = format!("/api/saved-answers/{}", saved["id"].as_str().expect("id"));

        for request in [
            actix_test::TestRequest::get().uri(&uri),
            actix_test::TestRequest::delete().uri(&uri),
        ] {
            let response =
                actix_test::call_service(&app, request.cookie(intruder.clone()).to_request())
                    .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&uri)
                .cookie(owner)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[rstest]
    #[actix_web::test]
    async fn malformed_id_is_rejected(services: TestServices) {
        let app = actix_test::init_service(test_app(services.state.clone())).await;
        let (cookie, _) = sign_up(&app, "owner@example.com").await;
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/saved-answers/not-a-uuid")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: Value = actix_test::read_body_json(response).await;
        assert_eq!(error["details"]["code"], "invalid_uuid");
    }
}
