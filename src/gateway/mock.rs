//! Scripted gateway for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::{ContentGateway, GenerationRequest, RawGeneration};
use crate::content::GeneratedContent;
use crate::error::GatewayError;

/// Gateway that replays a script of results, then repeats a fallback
pub(crate) struct ScriptedGateway {
    script: Mutex<VecDeque<Result<RawGeneration, GatewayError>>>,
    fallback: Result<RawGeneration, GatewayError>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub(crate) fn new(
        script: Vec<Result<RawGeneration, GatewayError>>,
        fallback: Result<RawGeneration, GatewayError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the given content
    pub(crate) fn succeeding(content: &GeneratedContent) -> Self {
        Self::new(Vec::new(), Ok(raw(content)))
    }

    /// Always fails with an unparsable response
    pub(crate) fn malformed() -> Self {
        Self::new(
            Vec::new(),
            Err(GatewayError::Malformed {
                reason: "no JSON object found in response".to_string(),
            }),
        )
    }

    /// Always refuses as if the pacer were closed
    pub(crate) fn rate_limited(retry_in: Duration) -> Self {
        Self::new(Vec::new(), Err(GatewayError::RateLimited { retry_in }))
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

/// Wrap content as a gateway payload
pub(crate) fn raw(content: &GeneratedContent) -> RawGeneration {
    RawGeneration {
        payload: serde_json::to_value(content).unwrap_or_default(),
        elapsed: Duration::from_millis(5),
    }
}

#[async_trait]
impl ContentGateway for ScriptedGateway {
    fn can_call(&self) -> bool {
        !matches!(self.fallback, Err(GatewayError::RateLimited { .. }))
    }

    fn next_available_in(&self) -> Duration {
        match &self.fallback {
            Err(GatewayError::RateLimited { retry_in }) => *retry_in,
            _ => Duration::ZERO,
        }
    }

    async fn call(&self, request: &GenerationRequest) -> Result<RawGeneration, GatewayError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        // Refusals are not calls that reached the service
        let result = next.unwrap_or_else(|| self.fallback.clone());
        if !matches!(result, Err(GatewayError::RateLimited { .. })) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}
