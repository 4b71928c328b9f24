//! Request handlers for the public API.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::request::RequestId;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::{CircuitState, RetryOverrides};

const FORMAT_ROUTE: &str = "/v1/format";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormatRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormatResponse {
    pub text: String,
    /// Upstream calls made, including the successful one.
    pub attempts: u32,
}

/// Format text through the upstream model, retrying per the executor policy.
pub async fn format_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<FormatRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let response = match payload {
        Err(rejection) => response::invalid_request(rejection.status(), rejection.body_text()),
        Ok(Json(body)) if body.text.trim().is_empty() => {
            response::bad_request("text must not be empty")
        }
        Ok(Json(body)) => format_text(&state, &request_id, body).await,
    };

    metrics::record_request("POST", FORMAT_ROUTE, response.status().as_u16(), start);
    response
}

async fn format_text(state: &AppState, request_id: &RequestId, body: FormatRequest) -> Response {
    let text: Arc<str> = Arc::from(body.text);
    let instructions: Option<Arc<str>> = body.instructions.map(Arc::from);
    let mut cancel = state.shutdown.subscribe();
    let mut attempts = 0u32;

    let result = state
        .executor
        .execute_with_cancel(
            || {
                attempts += 1;
                let upstream = state.upstream.clone();
                let text = text.clone();
                let instructions = instructions.clone();
                async move { upstream.format(&text, instructions.as_deref()).await }
            },
            // Log context only; executor metrics use the dependency label.
            request_id.as_str(),
            RetryOverrides::default(),
            async move {
                let _ = cancel.recv().await;
            },
        )
        .await;

    match result {
        Ok(text) => {
            tracing::debug!(request_id = %request_id, attempts, "Format request served");
            Json(FormatResponse { text, attempts }).into_response()
        }
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                attempts = err.attempts(),
                error = %err,
                "Format request failed"
            );
            response::execute_error(&err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub circuit: String,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_secs_ago: Option<u64>,
    pub version: String,
}

/// Liveness plus breaker state; 503 while the breaker is open.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let status = state.executor.status();
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let report = HealthReport {
        status: if status.state == CircuitState::Open { "degraded" } else { "ok" }.to_string(),
        circuit: status.state.as_str().to_string(),
        failure_count: status.failure_count,
        last_failure_secs_ago: status.last_failure_age().map(|age| age.as_secs()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    (code, Json(report))
}
