//! HTTP client for the language-model formatting endpoint.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;
use crate::upstream::error::UpstreamError;

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct FormatRequest<'a> {
    model: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FormatResponse {
    text: String,
}

/// One attempt per call; retries belong to the executor.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    inner: Client,
    url: String,
    model: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("format-gateway/", env!("CARGO_PKG_VERSION"))),
        );
        if !config.api_key.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| UpstreamError::Config("api key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let inner = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(UpstreamError::Request)?;

        Ok(Self {
            inner,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the model to format `text`, optionally steered by `instructions`.
    pub async fn format(
        &self,
        text: &str,
        instructions: Option<&str>,
    ) -> Result<String, UpstreamError> {
        let body = FormatRequest {
            model: &self.model,
            text,
            instructions,
        };

        let response = self
            .inner
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(UpstreamError::from_status(status.as_u16(), message));
        }

        let bytes = response.bytes().await.map_err(UpstreamError::Request)?;
        let parsed: FormatResponse =
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(parsed.text)
    }
}
