use crate::infra::AppState;
use altscore::error::AppError;
use altscore::report::{DashboardView, ScoreReport};
use altscore::scoring::RawApplicant;
use altscore::service::{ApplicantService, RegistrationOutcome};
use altscore::store::{RecordStore, StoredRecord};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct RegisterResponse {
    #[serde(flatten)]
    pub(crate) outcome: RegistrationOutcome,
    pub(crate) report: ScoreReport,
}

pub(crate) fn with_scoring_routes<S>(service: Arc<ApplicantService<S>>) -> axum::Router
where
    S: RecordStore + 'static,
{
    axum::Router::new()
        .route(
            "/api/v1/applicants",
            axum::routing::post(register_applicant::<S>).get(list_applicants::<S>),
        )
        .route(
            "/api/v1/applicants/last",
            axum::routing::delete(delete_last_applicant::<S>),
        )
        .route("/api/v1/dashboard", axum::routing::get(dashboard_endpoint::<S>))
        .with_state(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn register_applicant<S>(
    State(service): State<Arc<ApplicantService<S>>>,
    Json(payload): Json<RawApplicant>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError>
where
    S: RecordStore + 'static,
{
    let outcome = service.register(&payload).map_err(AppError::from)?;
    let report = ScoreReport::from_result(Some(outcome.user_id.clone()), &outcome.score);
    Ok((StatusCode::CREATED, Json(RegisterResponse { outcome, report })))
}

pub(crate) async fn list_applicants<S>(
    State(service): State<Arc<ApplicantService<S>>>,
) -> Result<Json<Vec<StoredRecord>>, AppError>
where
    S: RecordStore + 'static,
{
    let records = service.records().map_err(AppError::from)?;
    Ok(Json(records))
}

pub(crate) async fn dashboard_endpoint<S>(
    State(service): State<Arc<ApplicantService<S>>>,
) -> Result<Json<DashboardView>, AppError>
where
    S: RecordStore + 'static,
{
    let view = service.dashboard().map_err(AppError::from)?;
    Ok(Json(view))
}

pub(crate) async fn delete_last_applicant<S>(
    State(service): State<Arc<ApplicantService<S>>>,
) -> Result<impl IntoResponse, AppError>
where
    S: RecordStore + 'static,
{
    match service.remove_last().map_err(AppError::from)? {
        Some(user_id) => Ok((StatusCode::OK, Json(json!({ "removed": user_id })))),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "record store is empty" })),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::test_support::{stub_scorer, InMemoryRecordStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> axum::Router {
        let service = Arc::new(ApplicantService::new(
            Arc::new(stub_scorer()),
            Arc::new(InMemoryRecordStore::default()),
        ));
        with_scoring_routes(service)
    }

    fn applicant_json() -> serde_json::Value {
        json!({
            "employment_type": "salaried",
            "income_range": "30000-50000",
            "city_tier": "2",
            "bank_account_age_months": "36",
            "num_bank_accounts": "2",
            "monthly_income": "42000",
            "pays_rent": "yes",
            "rent_paid_on_time": "0.9",
            "utility_delay_days": "1.5",
            "upi_txn_count": "55",
            "avg_month_end_balance": "8000",
            "overdraft_event": "no"
        })
    }

    fn post_applicant(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/applicants")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is json")
    }

    #[tokio::test]
    async fn register_returns_created_with_assigned_id() {
        let app = test_app();
        let response = app
            .oneshot(post_applicant(applicant_json()))
            .await
            .expect("request handled");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["user_id"], "USER_0001");
        assert_eq!(body["score"]["final_score"], 68);
        assert_eq!(body["score"]["verdict"], "conditional");
        assert_eq!(body["report"]["verdict_label"], "CONDITIONAL");
        assert_eq!(body["report"]["rows"][0]["output"], "Low Risk");
    }

    #[tokio::test]
    async fn register_rejects_invalid_submission_as_unprocessable() {
        let app = test_app();
        let mut payload = applicant_json();
        payload["city_tier"] = json!("9");

        let response = app
            .oneshot(post_applicant(payload))
            .await
            .expect("request handled");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("message").contains("city_tier"));
    }

    #[tokio::test]
    async fn sequential_registrations_increment_the_user_id() {
        let app = test_app();
        let first = app
            .clone()
            .oneshot(post_applicant(applicant_json()))
            .await
            .expect("first request");
        assert_eq!(body_json(first).await["user_id"], "USER_0001");

        let second = app
            .oneshot(post_applicant(applicant_json()))
            .await
            .expect("second request");
        assert_eq!(body_json(second).await["user_id"], "USER_0002");
    }

    #[tokio::test]
    async fn dashboard_reflects_registered_records() {
        let app = test_app();
        app.clone()
            .oneshot(post_applicant(applicant_json()))
            .await
            .expect("register");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/dashboard")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("dashboard handled");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["summary"]["total_records"], 1);
        assert_eq!(body["recent"][0]["user_id"], "USER_0001");
        assert_eq!(body["live_predictions"][0]["classifier_label"], "Low Risk");
        assert_eq!(body["live_predictions"][0]["blended_score"], 68);
    }

    #[tokio::test]
    async fn delete_last_on_empty_store_is_not_found() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/applicants/last")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("delete handled");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_last_removes_the_newest_record() {
        let app = test_app();
        app.clone()
            .oneshot(post_applicant(applicant_json()))
            .await
            .expect("register");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/applicants/last")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("delete handled");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["removed"], "USER_0001");

        let listing = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/applicants")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("list handled");
        let body = body_json(listing).await;
        assert_eq!(body.as_array().expect("array").len(), 0);
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("health handled");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
