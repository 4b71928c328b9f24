//! Error types for the upstream client.

use thiserror::Error;

use crate::resilience::{Classify, FailureKind};

/// Failure of a single call to the language-model API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport failure before a response arrived.
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("invalid upstream response: {0}")]
    Decode(String),

    /// The client could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl UpstreamError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Category for an upstream HTTP status.
pub fn kind_for_status(status: u16) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        401 | 403 => FailureKind::Unauthorized,
        400..=499 => FailureKind::ClientFault,
        500..=599 => FailureKind::ServerUnavailable,
        _ => FailureKind::Unknown,
    }
}

impl Classify for UpstreamError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Request(e) if e.is_timeout() || e.is_connect() => FailureKind::NetworkFailure,
            Self::Request(e) if e.is_decode() || e.is_body() => FailureKind::Unknown,
            Self::Request(e) => match e.status() {
                Some(status) => kind_for_status(status.as_u16()),
                None if e.is_request() => FailureKind::NetworkFailure,
                None => FailureKind::Unknown,
            },
            Self::Status { status, .. } => kind_for_status(*status),
            Self::Decode(_) => FailureKind::Unknown,
            Self::Config(_) => FailureKind::ClientFault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (429, FailureKind::RateLimited),
            (500, FailureKind::ServerUnavailable),
            (502, FailureKind::ServerUnavailable),
            (503, FailureKind::ServerUnavailable),
            (504, FailureKind::ServerUnavailable),
            (507, FailureKind::ServerUnavailable),
            (401, FailureKind::Unauthorized),
            (403, FailureKind::Unauthorized),
            (400, FailureKind::ClientFault),
            (404, FailureKind::ClientFault),
            (422, FailureKind::ClientFault),
            (302, FailureKind::Unknown),
        ];

        for (status, kind) in cases {
            assert_eq!(UpstreamError::from_status(status, "").failure_kind(), kind, "{status}");
        }
    }

    #[test]
    fn test_decode_is_not_retried() {
        let err = UpstreamError::Decode("missing field `text`".into());
        let c = err.classification();
        assert!(!c.retryable);
        assert!(!c.breaker_relevant);
    }
}
