//! Rate-limited access to the generation service
//!
//! A [`ContentGateway`] is the only way the pipeline reaches the external
//! generation service. [`RateLimitedGateway`] enforces a minimum interval per
//! endpoint through a [`CallPacer`], bounds each call with a timeout, retries
//! transient transport failures a fixed number of times, and turns the
//! response body into a JSON payload.
//!
//! The gateway never waits for the pacer. A refused call returns
//! [`GatewayError::RateLimited`] at once and the caller decides whether to
//! defer the item or wait.

mod extract;
#[cfg(test)]
pub(crate) mod mock;
mod pacer;
mod transport;

pub use extract::{first_json_object, parse_payload, unwrap_envelope};
pub use pacer::CallPacer;
pub use transport::{HttpTransport, Transport};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{Config, RetryConfig};
use crate::error::{GatewayError, Result, TransportError};
use crate::retry::with_fixed_retry;
use crate::types::{NaturalKey, Tier};

/// Longest back-off an upstream throttle can impose on an endpoint
pub const MAX_RETRY_IN: Duration = Duration::from_secs(86_400);

/// One generation call
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Article the call is for
    pub key: NaturalKey,
    /// Tier being called
    pub tier: Tier,
    /// Opaque prompt text
    pub prompt: String,
}

/// Parsed payload of a successful call
#[derive(Clone, Debug)]
pub struct RawGeneration {
    /// JSON object extracted from the response
    pub payload: serde_json::Value,
    /// Wall time spent in the transport, retries included
    pub elapsed: Duration,
}

/// Access point to one generation endpoint
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Whether a call would be admitted right now
    fn can_call(&self) -> bool;

    /// Time until the next call would be admitted
    fn next_available_in(&self) -> Duration;

    /// Make one generation call without waiting for the pacer
    async fn call(&self, request: &GenerationRequest) -> std::result::Result<RawGeneration, GatewayError>;
}

/// Gateway for a single endpoint, paced by a [`CallPacer`]
pub struct RateLimitedGateway<T: Transport> {
    transport: T,
    pacer: CallPacer,
    retry: RetryConfig,
}

impl<T: Transport> RateLimitedGateway<T> {
    /// Wrap a transport with pacing and retries
    pub fn new(transport: T, min_interval: Duration, retry: RetryConfig) -> Self {
        Self {
            transport,
            pacer: CallPacer::new(min_interval),
            retry,
        }
    }

    /// The underlying pacer
    pub fn pacer(&self) -> &CallPacer {
        &self.pacer
    }
}

#[async_trait]
impl<T: Transport> ContentGateway for RateLimitedGateway<T> {
    fn can_call(&self) -> bool {
        self.pacer.can_call()
    }

    fn next_available_in(&self) -> Duration {
        self.pacer.next_available_in()
    }

    async fn call(&self, request: &GenerationRequest) -> std::result::Result<RawGeneration, GatewayError> {
        // Token is taken before anything goes on the wire
        if let Err(retry_in) = self.pacer.try_acquire() {
            tracing::debug!(
                natural_key = %request.key,
                tier = %request.tier,
                retry_in_ms = retry_in.as_millis(),
                "call refused by pacer"
            );
            return Err(GatewayError::RateLimited { retry_in });
        }

        let started = Instant::now();
        let result = with_fixed_retry(&self.retry, || self.transport.send(request)).await;
        let elapsed = started.elapsed();

        match result {
            Ok(body) => {
                let payload = parse_payload(&body)?;
                tracing::debug!(
                    natural_key = %request.key,
                    tier = %request.tier,
                    elapsed_ms = elapsed.as_millis(),
                    "generation call completed"
                );
                Ok(RawGeneration { payload, elapsed })
            }
            Err(TransportError::Throttled { retry_after }) => {
                let retry_in = retry_after
                    .unwrap_or(self.pacer.interval())
                    .min(MAX_RETRY_IN);
                if let Some(at) = Instant::now().checked_add(retry_in) {
                    self.pacer.release_at(at);
                }
                tracing::warn!(
                    natural_key = %request.key,
                    tier = %request.tier,
                    retry_in_secs = retry_in.as_secs(),
                    "upstream throttled generation call"
                );
                Err(GatewayError::RateLimited { retry_in })
            }
            Err(e) => Err(GatewayError::Transport(e)),
        }
    }
}

/// Gateways keyed by tier, cheapest first
pub type TierGateways = Vec<(Tier, Arc<dyn ContentGateway>)>;

/// Build one HTTP gateway per configured tier
///
/// Every tier gets its own pacer, so escalating to the next tier is never
/// blocked by the interval of the tier that just failed.
///
/// # Errors
/// Returns error if an HTTP client cannot be created
pub fn http_gateways(config: &Config) -> Result<TierGateways> {
    let mut gateways: TierGateways = Vec::new();

    for tier in config.sorted_tiers() {
        let endpoint = config.endpoint_for(&tier);
        let transport = HttpTransport::new(&config.gateway, &tier, endpoint)?;
        tracing::info!(
            tier = %tier.tier,
            model = %transport.model(),
            endpoint = %transport.endpoint(),
            "generation gateway configured"
        );
        let gateway: Arc<dyn ContentGateway> = Arc::new(RateLimitedGateway::new(
            transport,
            config.gateway.min_interval,
            config.gateway.retry.clone(),
        ));
        gateways.push((tier.tier, gateway));
    }

    Ok(gateways)
}
