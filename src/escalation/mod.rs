//! Tier escalation
//!
//! [`EscalationStrategy`] decides which tier to call for an item and moves
//! up the tier order when a tier returns unusable content. Each tier has its
//! own [`ContentGateway`], so a failed cheap call never blocks the next,
//! more capable one on the same pacing interval.
//!
//! Outcome handling per call:
//! - usable content: done
//! - malformed or degenerate content: record a failure, escalate at once
//! - transport failure (after the gateway's retries): record a failure, stop
//! - rate limited: stop without recording anything; the item is deferred

mod history;
mod stats;

pub use history::AttemptHistory;
pub use stats::{EscalationStats, StatsSnapshot};

use std::sync::Arc;

use crate::config::Config;
use crate::content::GeneratedContent;
use crate::error::{EscalationError, GatewayError};
use crate::gateway::{ContentGateway, GenerationRequest, TierGateways};
use crate::types::{FailureCategory, GenerationAttempt, NaturalKey, Tier};

/// Usable content and how it was obtained
#[derive(Clone, Debug)]
pub struct Generation {
    /// Parsed content
    pub content: GeneratedContent,
    /// Tier that produced it
    pub tier_used: Tier,
    /// Calls made for this item in this run
    pub attempts: u32,
}

/// Tier selection and escalation over a set of per-tier gateways
pub struct EscalationStrategy {
    gateways: TierGateways,
    max_attempts: u32,
    stats: Arc<EscalationStats>,
}

impl EscalationStrategy {
    /// Build a strategy over the given gateways
    ///
    /// Gateways are sorted cheapest first. `max_attempts` defaults to the
    /// number of tiers.
    pub fn new(mut gateways: TierGateways, max_attempts: Option<u32>, stats: EscalationStats) -> Self {
        gateways.sort_by_key(|(tier, _)| *tier);
        let tier_count = u32::try_from(gateways.len()).unwrap_or(u32::MAX);
        Self {
            gateways,
            max_attempts: max_attempts.unwrap_or(tier_count),
            stats: Arc::new(stats),
        }
    }

    /// Build a strategy with limits and weights taken from `config`
    pub fn from_config(config: &Config, gateways: TierGateways) -> Self {
        Self::new(
            gateways,
            config.escalation.max_attempts,
            EscalationStats::from_tiers(&config.tiers),
        )
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<EscalationStats> {
        self.stats.clone()
    }

    /// Tier a new attempt would start at
    ///
    /// A forced tier wins; otherwise prior failures start one tier up.
    pub fn starting_tier(&self, history: &AttemptHistory, forced: Option<Tier>) -> Tier {
        forced.unwrap_or(if history.has_failures() {
            Tier::Intermediate
        } else {
            Tier::Standard
        })
    }

    /// Gateway that would serve the starting tier, if any tier is configured
    pub fn gateway_for(&self, tier: Tier) -> Option<&Arc<dyn ContentGateway>> {
        self.position_for(tier).map(|idx| &self.gateways[idx].1)
    }

    /// First configured tier at or above `tier`, else the top one
    fn position_for(&self, tier: Tier) -> Option<usize> {
        if self.gateways.is_empty() {
            return None;
        }
        Some(
            self.gateways
                .iter()
                .position(|(t, _)| *t >= tier)
                .unwrap_or(self.gateways.len() - 1),
        )
    }

    /// Generate content for one item, escalating across tiers as needed
    ///
    /// Every call that reaches the service is appended to `history`.
    pub async fn generate(
        &self,
        key: &NaturalKey,
        prompt: &str,
        history: &mut AttemptHistory,
        forced: Option<Tier>,
    ) -> Result<Generation, EscalationError> {
        let start = self.starting_tier(history, forced);
        let Some(first) = self.position_for(start) else {
            return Err(EscalationError::Exhausted { attempts: 0 });
        };

        let mut idx = first;
        let mut attempts = 0u32;

        loop {
            let (tier, gateway) = &self.gateways[idx];
            let tier = *tier;
            let request = GenerationRequest {
                key: key.clone(),
                tier,
                prompt: prompt.to_string(),
            };

            let failure = match gateway.call(&request).await {
                Ok(raw) => {
                    self.stats.record_call(tier);
                    attempts += 1;
                    match GeneratedContent::from_value(raw.payload) {
                        Ok(content) if !content.is_degenerate() => {
                            history.record(GenerationAttempt::success(tier));
                            self.stats.record_success(tier, idx > first);
                            tracing::debug!(
                                natural_key = %key,
                                tier = %tier,
                                attempts,
                                "generation succeeded"
                            );
                            return Ok(Generation {
                                content,
                                tier_used: tier,
                                attempts,
                            });
                        }
                        Ok(_) => FailureCategory::Degenerate,
                        Err(e) => {
                            tracing::debug!(natural_key = %key, tier = %tier, error = %e, "payload does not match content shape");
                            FailureCategory::Malformed
                        }
                    }
                }
                Err(GatewayError::RateLimited { retry_in }) => {
                    return Err(EscalationError::RateLimited { tier, retry_in });
                }
                Err(GatewayError::Transport(source)) => {
                    self.stats.record_call(tier);
                    attempts += 1;
                    history.record(GenerationAttempt::failure(tier, FailureCategory::Transport));
                    return Err(EscalationError::Transport { tier, source });
                }
                Err(GatewayError::Malformed { reason }) => {
                    self.stats.record_call(tier);
                    attempts += 1;
                    tracing::debug!(natural_key = %key, tier = %tier, reason = %reason, "malformed response");
                    FailureCategory::Malformed
                }
            };

            history.record(GenerationAttempt::failure(tier, failure));

            if attempts >= self.max_attempts || idx + 1 >= self.gateways.len() {
                tracing::warn!(
                    natural_key = %key,
                    tier = %tier,
                    attempts,
                    "escalation exhausted"
                );
                return Err(EscalationError::Exhausted { attempts });
            }

            idx += 1;
            self.stats.record_escalation();
            tracing::warn!(
                natural_key = %key,
                from = %tier,
                to = %self.gateways[idx].0,
                failure = failure.as_str(),
                "escalating to next tier"
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::complete_content;
    use crate::error::TransportError;
    use crate::gateway::mock::{ScriptedGateway, raw};
    use std::time::Duration;

    fn key() -> NaturalKey {
        NaturalKey::derive("Toyota", "Hilux", 2021, None)
    }

    fn strategy(
        standard: Arc<ScriptedGateway>,
        intermediate: Arc<ScriptedGateway>,
        premium: Arc<ScriptedGateway>,
    ) -> EscalationStrategy {
        let gateways: TierGateways = vec![
            (Tier::Premium, premium as Arc<dyn ContentGateway>),
            (Tier::Standard, standard as Arc<dyn ContentGateway>),
            (Tier::Intermediate, intermediate as Arc<dyn ContentGateway>),
        ];
        EscalationStrategy::new(gateways, None, EscalationStats::default())
    }

    #[tokio::test]
    async fn test_malformed_standard_escalates_to_intermediate() {
        let standard = Arc::new(ScriptedGateway::malformed());
        let intermediate = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let premium = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let strategy = strategy(standard.clone(), intermediate.clone(), premium.clone());

        let mut history = AttemptHistory::new(10);
        let generation = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap();

        assert_eq!(generation.tier_used, Tier::Intermediate);
        assert_eq!(generation.attempts, 2);
        assert_eq!(history.len(), 2);

        let recorded: Vec<_> = history.iter().collect();
        assert_eq!(recorded[0].tier, Tier::Standard);
        assert_eq!(recorded[0].failure, Some(FailureCategory::Malformed));
        assert_eq!(recorded[1].tier, Tier::Intermediate);
        assert!(!recorded[1].is_failure());

        assert_eq!(standard.calls(), 1);
        assert_eq!(intermediate.calls(), 1);
        assert_eq!(premium.calls(), 0);

        let snap = strategy.stats().snapshot();
        assert_eq!(snap.escalations, 1);
        assert_eq!(snap.successful_escalations, 1);
    }

    #[tokio::test]
    async fn test_prior_failures_start_at_intermediate() {
        let standard = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let intermediate = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let premium = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let strategy = strategy(standard.clone(), intermediate.clone(), premium);

        let mut history = AttemptHistory::from_attempts(
            vec![GenerationAttempt::failure(Tier::Standard, FailureCategory::Transport)],
            10,
        );
        let generation = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap();

        assert_eq!(generation.tier_used, Tier::Intermediate);
        assert_eq!(standard.calls(), 0);
        assert_eq!(history.take_unsaved().len(), 1);
    }

    #[tokio::test]
    async fn test_forced_tier_is_honored() {
        let standard = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let intermediate = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let premium = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let strategy = strategy(standard.clone(), intermediate.clone(), premium.clone());

        let mut history = AttemptHistory::new(10);
        let generation = strategy
            .generate(&key(), "prompt", &mut history, Some(Tier::Premium))
            .await
            .unwrap();

        assert_eq!(generation.tier_used, Tier::Premium);
        assert_eq!(standard.calls() + intermediate.calls(), 0);
        assert_eq!(premium.calls(), 1);
    }

    #[tokio::test]
    async fn test_degenerate_content_everywhere_exhausts() {
        let empty = crate::content::GeneratedContent::default();
        let standard = Arc::new(ScriptedGateway::succeeding(&empty));
        let intermediate = Arc::new(ScriptedGateway::malformed());
        let premium = Arc::new(ScriptedGateway::succeeding(&empty));
        let strategy = strategy(standard, intermediate, premium);

        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();

        assert!(matches!(err, EscalationError::Exhausted { attempts: 3 }));
        let categories: Vec<_> = history.iter().map(|a| a.failure).collect();
        assert_eq!(
            categories,
            vec![
                Some(FailureCategory::Degenerate),
                Some(FailureCategory::Malformed),
                Some(FailureCategory::Degenerate),
            ]
        );
    }

    #[tokio::test]
    async fn test_max_attempts_bounds_escalation() {
        let gateways: TierGateways = vec![
            (Tier::Standard, Arc::new(ScriptedGateway::malformed()) as Arc<dyn ContentGateway>),
            (Tier::Intermediate, Arc::new(ScriptedGateway::malformed()) as Arc<dyn ContentGateway>),
            (
                Tier::Premium,
                Arc::new(ScriptedGateway::succeeding(&complete_content())) as Arc<dyn ContentGateway>,
            ),
        ];
        let strategy = EscalationStrategy::new(gateways, Some(2), EscalationStats::default());

        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Exhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_rate_limited_defers_without_recording() {
        let standard = Arc::new(ScriptedGateway::rate_limited(Duration::from_secs(42)));
        let intermediate = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let premium = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let strategy = strategy(standard, intermediate.clone(), premium);

        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();

        match err {
            EscalationError::RateLimited { tier, retry_in } => {
                assert_eq!(tier, Tier::Standard);
                assert_eq!(retry_in, Duration::from_secs(42));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(history.is_empty());
        assert_eq!(intermediate.calls(), 0, "rate limiting must not escalate");
    }

    #[tokio::test]
    async fn test_transport_failure_records_and_stops() {
        let standard = Arc::new(ScriptedGateway::new(
            Vec::new(),
            Err(GatewayError::Transport(TransportError::Timeout(Duration::from_secs(120)))),
        ));
        let intermediate = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let premium = Arc::new(ScriptedGateway::succeeding(&complete_content()));
        let strategy = strategy(standard, intermediate.clone(), premium);

        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EscalationError::Transport {
                tier: Tier::Standard,
                source: TransportError::Timeout(_)
            }
        ));
        assert_eq!(history.len(), 1);
        assert_eq!(history.iter().next().unwrap().failure, Some(FailureCategory::Transport));
        assert_eq!(intermediate.calls(), 0);
    }

    #[tokio::test]
    async fn test_scripted_recovery_on_same_tier_list() {
        let standard = Arc::new(ScriptedGateway::new(
            vec![Ok(raw(&crate::content::GeneratedContent::default()))],
            Ok(raw(&complete_content())),
        ));
        let gateways: TierGateways = vec![(Tier::Standard, standard.clone() as Arc<dyn ContentGateway>)];
        let strategy = EscalationStrategy::new(gateways, None, EscalationStats::default());

        // Only one tier configured: a degenerate answer exhausts immediately
        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Exhausted { attempts: 1 }));

        // The next run starts "one tier up", which falls back to the only tier
        let generation = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap();
        assert_eq!(generation.tier_used, Tier::Standard);
        assert_eq!(standard.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_gateways_is_exhausted() {
        let strategy = EscalationStrategy::new(Vec::new(), None, EscalationStats::default());
        let mut history = AttemptHistory::new(10);
        let err = strategy
            .generate(&key(), "prompt", &mut history, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Exhausted { attempts: 0 }));
        assert!(strategy.gateway_for(Tier::Standard).is_none());
    }
}
