//! HTTP surface: repair submission endpoint and liveness probe.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyCors, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::PipelineError;
use crate::order::SubmitRequest;
use crate::pipeline::RepairPipeline;

const MSG_ACCEPTED: &str = "報修已送出，我們將盡快與您聯繫";
const MSG_REJECTED: &str = "驗證失敗，請重新完成驗證後再送出";
const MSG_BAD_REQUEST: &str = "表單格式錯誤，請重新整理後再試";
const MSG_UNAVAILABLE: &str = "系統暫時無法受理報修，請稍後再試或直接來電";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RepairPipeline>,
}

/// Client-visible status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Success,
    Fail,
    Error,
}

/// JSON body returned by `POST /submit_repair`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmitResponse {
    fn new(status: SubmitStatus, message: &str) -> Self {
        Self {
            status,
            message: Some(message.to_string()),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        // Fixed messages only; internal detail stays in the logs.
        let (code, body) = match self {
            PipelineError::VerificationRejected => (
                StatusCode::FORBIDDEN,
                SubmitResponse::new(SubmitStatus::Fail, MSG_REJECTED),
            ),
            PipelineError::VerificationUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                SubmitResponse::new(SubmitStatus::Error, MSG_UNAVAILABLE),
            ),
            PipelineError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                SubmitResponse::new(SubmitStatus::Error, MSG_UNAVAILABLE),
            ),
        };
        (code, Json(body)).into_response()
    }
}

/// Build the Axum router with the submission and health routes.
pub fn app_routes(pipeline: Arc<RepairPipeline>, cors_origins: &[String]) -> Router {
    let state = AppState { pipeline };

    let router = Router::new()
        .route("/", get(health))
        .route("/submit_repair", post(submit_repair))
        .with_state(state);
    with_layers(router, cors_origins)
}

/// Panic recovery sits inside CORS so a panic response still carries the
/// allow-origin headers a cross-origin form needs to read it.
fn with_layers(router: Router, cors_origins: &[String]) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AnyCors)
        .allow_headers(AnyCors)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "repair-dispatch"
    }))
}

// ── Submission ──────────────────────────────────────────────────────────

async fn submit_repair(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(json) => json,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed repair submission");
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitResponse::new(SubmitStatus::Fail, MSG_BAD_REQUEST)),
            )
                .into_response();
        }
    };

    match state.pipeline.submit(request).await {
        Ok(_accepted) => (
            StatusCode::OK,
            Json(SubmitResponse::new(SubmitStatus::Success, MSG_ACCEPTED)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Turn a handler panic into the generic `error` response.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Request handler panicked");
    PipelineError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_omits_missing_message() {
        let resp = SubmitResponse {
            status: SubmitStatus::Success,
            message: None,
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({"status": "success"})
        );
    }

    #[test]
    fn status_values_are_lowercase() {
        for (status, text) in [
            (SubmitStatus::Success, "success"),
            (SubmitStatus::Fail, "fail"),
            (SubmitStatus::Error, "error"),
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), text);
        }
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            PipelineError::VerificationRejected.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PipelineError::VerificationUnavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            PipelineError::Internal("secret detail".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn broken_handler() -> StatusCode {
        panic!("handler bug")
    }

    #[tokio::test]
    async fn panic_response_carries_cors_headers() {
        let app = with_layers(
            Router::new().route("/broken", get(broken_handler)),
            &["*".to_string()],
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let resp = reqwest::Client::new()
            .get(format!("http://{addr}/broken"))
            .header("Origin", "https://form.example")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }

    #[test]
    fn panic_payload_becomes_internal_error() {
        let resp = handle_panic(Box::new("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
