//! Request metadata: correlation IDs and client identity.
//!
//! # Design Decisions
//! - Request ID is assigned by `SetRequestIdLayer` before any handler runs
//! - Clients are keyed by API key when present, peer IP otherwise
//! - Raw API keys never reach logs; `Display` masks them

use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap, Request};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_API_KEY: &str = "x-api-key";

/// Correlation ID of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_owned()))
            .unwrap_or_else(|| Self(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Who a request is charged to for rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientId {
    ApiKey(String),
    Ip(IpAddr),
    /// Neither header nor peer address was available.
    Anonymous,
}

impl ClientId {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let api_key = request
            .headers()
            .get(X_API_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(key) = api_key {
            return Self::ApiKey(key.to_owned());
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self::Ip(addr.ip()))
            .unwrap_or(Self::Anonymous)
    }

    /// Rate-limiter key. Namespaced so an API key can never collide with an IP.
    pub fn key(&self) -> String {
        match self {
            Self::ApiKey(key) => format!("key:{key}"),
            Self::Ip(ip) => format!("ip:{ip}"),
            Self::Anonymous => "anonymous".to_string(),
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api_key",
            Self::Ip(_) => "ip",
            Self::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(key) => {
                let tail: String = key
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                write!(f, "api-key:…{tail}")
            }
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_api_key_wins_over_peer_address() {
        let mut request = Request::builder()
            .header(X_API_KEY, "secret-abcd")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));

        let client = ClientId::from_request(&request);
        assert_eq!(client.key(), "key:secret-abcd");
        assert_eq!(client.to_string(), "api-key:…abcd");
    }

    #[test]
    fn test_falls_back_to_ip_then_anonymous() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(ClientId::from_request(&request), ClientId::Anonymous);

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        assert_eq!(ClientId::from_request(&request).key(), "ip:10.0.0.1");
    }

    #[test]
    fn test_request_id_from_header_or_fresh() {
        let mut headers = HeaderMap::new();
        let fresh = RequestId::from_headers(&headers);
        assert_eq!(fresh.as_str().len(), 36);

        headers.insert(X_REQUEST_ID, "abc-123".parse().unwrap());
        assert_eq!(RequestId::from_headers(&headers).as_str(), "abc-123");
    }
}
