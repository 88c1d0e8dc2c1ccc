//! HTTP transport to the generation service

use async_trait::async_trait;
use std::time::Duration;

use super::{GenerationRequest, MAX_RETRY_IN};
use crate::config::{GatewayConfig, TierConfig};
use crate::error::{Error, Result, TransportError};

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// Sends one prompt to one endpoint and returns the raw response body
///
/// Implementations do not retry, pace, or parse; the gateway does that.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request, returning the response body on a 2xx answer
    async fn send(&self, request: &GenerationRequest) -> std::result::Result<String, TransportError>;
}

/// Chat-completions transport over HTTPS using `reqwest`
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport for one tier
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(gateway: &GatewayConfig, tier: &TierConfig, endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(gateway.request_timeout)
            .user_agent(concat!("tirepress-gen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: gateway.api_key.clone(),
            model: tier.model.clone(),
            max_tokens: gateway.max_tokens,
            temperature: gateway.temperature,
            timeout: gateway.request_timeout,
        })
    }

    /// Model this transport asks for
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint this transport posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &GenerationRequest) -> std::result::Result<String, TransportError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            natural_key = %request.key,
            tier = %request.tier,
            model = %self.model,
            "sending generation request"
        );

        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(TransportError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            Err(_) => return Err(TransportError::Timeout(self.timeout)),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(TransportError::Throttled { retry_after });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        Ok(text)
    }
}

/// Parse a `Retry-After` value given in whole seconds, capped at [`MAX_RETRY_IN`]
///
/// HTTP-date values are not supported and yield `None`, in which case the
/// pacer falls back to its own interval.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_IN))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
