use crate::infra::{evaluate_event, AppState, EvaluationReport, JobEvent};
use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use print_policy::error::AppError;
use print_policy::workflows::print_job::PipelineStage;
use serde_json::json;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/jobs/pre-selection", post(pre_selection_endpoint))
        .route("/api/v1/jobs/post-selection", post(post_selection_endpoint))
        .layer(Extension(state))
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

pub(crate) async fn pre_selection_endpoint(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Json<EvaluationReport>, AppError> {
    evaluate_body(PipelineStage::PreSelection, &state, &body)
}

pub(crate) async fn post_selection_endpoint(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Json<EvaluationReport>, AppError> {
    evaluate_body(PipelineStage::PostSelection, &state, &body)
}

// Parsed by hand so malformed events surface as `AppError` 400s.
fn evaluate_body(
    stage: PipelineStage,
    state: &AppState,
    body: &[u8],
) -> Result<Json<EvaluationReport>, AppError> {
    let event: JobEvent = serde_json::from_slice(body)?;
    Ok(Json(evaluate_event(stage, event, &state.site_options)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use print_policy::config::PolicyOptionsPatch;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn build_router(ready: bool, site_options: PolicyOptionsPatch) -> Router {
        let recorder = PrometheusBuilder::new().build_recorder();
        router(AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            site_options: Arc::new(site_options),
        })
    }

    fn post_json(uri: &str, payload: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(payload).expect("serialize event"),
            ))
            .expect("request")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    fn site_user_event() -> Value {
        json!({
            "job": {
                "cost": 1.00,
                "totalGrayscalePages": 10,
                "isAnalysisComplete": true,
                "printerName": "ug-250-color",
                "documentName": "thesis.pdf",
                "username": "alice",
                "clientIp": "10.0.0.12"
            },
            "printer": { "name": "ug-250-color", "groups": ["Billing:Banner"] },
            "client": { "running": true },
            "user": { "groups": ["CITES-PaperCut-SiteUsers"] }
        })
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let response = build_router(false, PolicyOptionsPatch::default())
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_json(response).await["status"], json!("initializing"));
    }

    #[tokio::test]
    async fn post_selection_reports_cancellation_and_actions() {
        let response = build_router(true, PolicyOptionsPatch::default())
            .oneshot(post_json("/api/v1/jobs/post-selection", &site_user_event()))
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["stopped"], json!(true));
        let actions = payload["actions"].as_array().expect("actions array");
        assert!(actions.iter().any(|action| {
            action["action"] == json!("cancel_and_log")
                && action["reason"]
                    == json!("Site restricted user is not in group CITES-PaperCut-SiteUsers-UG")
        }));
    }

    #[tokio::test]
    async fn site_options_apply_to_every_request() {
        let site = PolicyOptionsPatch::from_json_str(r#"{ "siteRestrictUsers": false }"#)
            .expect("site options parse");

        let response = build_router(true, site)
            .oneshot(post_json("/api/v1/jobs/pre-selection", &site_user_event()))
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["stopped"], json!(false));
        assert_eq!(payload["outcome"]["stage"], json!("pre_selection"));
    }

    #[tokio::test]
    async fn malformed_event_is_a_bad_request() {
        let response = build_router(true, PolicyOptionsPatch::default())
            .oneshot(post_json("/api/v1/jobs/pre-selection", &json!({ "job": {} })))
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json(response).await;
        assert!(payload["error"]
            .as_str()
            .is_some_and(|message| message.starts_with("invalid job event")));
    }
}
