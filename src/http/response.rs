//! Error responses.
//!
//! # Status Mapping
//! ```text
//! rate limiter rejection                      → 429 + Retry-After
//! breaker open                                → 503 + Retry-After
//! exhausted retryable failure / cancellation  → 503
//! unauthorized, client fault, unknown         → 502
//! invalid request body                        → 400 (413/415/422 from the extractor)
//! ```

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resilience::{Classify, ExecuteError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Whole seconds for a `Retry-After` header, rounded up, never below one.
pub fn retry_after_secs(delay: Duration) -> u64 {
    let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
    secs.max(1)
}

fn error_response(
    status: StatusCode,
    error: &'static str,
    message: String,
    retry_after: Option<Duration>,
) -> Response {
    let retry_after_secs = retry_after.map(retry_after_secs);
    let body = ErrorBody {
        error,
        message,
        retry_after_secs,
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(secs) = retry_after_secs {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

pub fn too_many_requests(retry_after: Duration) -> Response {
    error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "Too many requests".to_string(),
        Some(retry_after),
    )
}

pub fn bad_request(message: impl Into<String>) -> Response {
    invalid_request(StatusCode::BAD_REQUEST, message)
}

/// Body-level rejection with the status the extractor chose (400, 413, 415, 422).
pub fn invalid_request(status: StatusCode, message: impl Into<String>) -> Response {
    error_response(status, "invalid_request", message.into(), None)
}

/// Map a terminal executor failure to the client-facing response.
pub fn execute_error<E: Classify>(err: &ExecuteError<E>) -> Response {
    match err {
        ExecuteError::CircuitOpen { retry_after, .. } => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "circuit_open",
            "Upstream temporarily unavailable".to_string(),
            Some(*retry_after),
        ),
        ExecuteError::Cancelled { .. } => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "cancelled",
            "Request cancelled during shutdown".to_string(),
            None,
        ),
        ExecuteError::Failed { attempts, source } => {
            let kind = source.failure_kind();
            let status = if kind.classify().retryable {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            };
            error_response(
                status,
                kind.as_str(),
                format!("Upstream call failed after {attempts} attempt(s)"),
                None,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::FailureKind;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1000)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1001)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(59)), 59);
    }

    #[test]
    fn test_status_per_failure() {
        let open: ExecuteError<FailureKind> = ExecuteError::CircuitOpen {
            failures: 5,
            retry_after: Duration::from_millis(2500),
        };
        let response = execute_error(&open);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");

        let cases = [
            (FailureKind::ServerUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (FailureKind::RateLimited, StatusCode::SERVICE_UNAVAILABLE),
            (FailureKind::NetworkFailure, StatusCode::SERVICE_UNAVAILABLE),
            (FailureKind::Unauthorized, StatusCode::BAD_GATEWAY),
            (FailureKind::ClientFault, StatusCode::BAD_GATEWAY),
            (FailureKind::Unknown, StatusCode::BAD_GATEWAY),
        ];
        for (kind, status) in cases {
            let err = ExecuteError::Failed {
                attempts: 1,
                source: kind,
            };
            assert_eq!(execute_error(&err).status(), status, "{kind}");
        }
    }
}
