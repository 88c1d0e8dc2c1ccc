//! Configuration types for tirepress-gen

use crate::content::SectionKind;
use crate::error::{Error, Result};
use crate::types::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Generation service connection settings shared by every tier
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Default endpoint URL, used by tiers without their own endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token for the generation service
    #[serde(default)]
    pub api_key: Option<String>,

    /// Minimum interval between two calls to the same endpoint (default: 60 seconds)
    #[serde(default = "default_min_interval", with = "duration_serde")]
    pub min_interval: Duration,

    /// Per-call timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Transport retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Token budget forwarded to the service (default: 4000)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature forwarded to the service (default: 0.7)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            min_interval: default_min_interval(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Retry configuration for transient transport failures
///
/// Retries use a fixed delay between attempts, never exponential growth.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay: default_retry_delay(),
        }
    }
}

/// One service tier: which model to call, where, and its reporting weight
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier this entry configures
    pub tier: Tier,

    /// Model identifier sent to the service
    pub model: String,

    /// Endpoint override (falls back to [`GatewayConfig::endpoint`])
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Relative cost weight, used only for savings reporting
    pub cost_weight: f64,
}

/// Escalation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Maximum generation calls per item (None = one per configured tier)
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Attempts kept per natural key, oldest trimmed (default: 10)
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            history_cap: default_history_cap(),
        }
    }
}

/// Score thresholds for the discrete quality levels
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum score for "excellent" (default: 90)
    pub excellent: i32,
    /// Minimum score for "good" (default: 75)
    pub good: i32,
    /// Minimum score for "average" (default: 60)
    pub average: i32,
    /// Minimum score for "poor" (default: 40)
    pub poor: i32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 90,
            good: 75,
            average: 60,
            poor: 40,
        }
    }
}

/// Structural quality scoring settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Sections every article must carry
    #[serde(default = "default_required_sections")]
    pub required_sections: Vec<SectionKind>,

    /// Starting score (default: 100)
    #[serde(default = "default_max_score")]
    pub max_score: i32,

    /// Floor of the clamped score (default: 0)
    #[serde(default)]
    pub min_score: i32,

    /// Deduction per missing required section (default: 20)
    #[serde(default = "default_missing_section_penalty")]
    pub missing_section_penalty: i32,

    /// Soft limit on SEO title length in characters (default: 65)
    #[serde(default = "default_title_soft_limit")]
    pub title_soft_limit: usize,

    /// Soft limit on meta description length in characters (default: 165)
    #[serde(default = "default_description_soft_limit")]
    pub description_soft_limit: usize,

    /// Deduction for exceeding a soft limit (default: 5)
    #[serde(default = "default_small_penalty")]
    pub soft_limit_penalty: i32,

    /// Deduction for a missing SEO title or description (default: 10)
    #[serde(default = "default_missing_seo_penalty")]
    pub missing_seo_penalty: i32,

    /// Deduction for a missing canonical URL (default: 5)
    #[serde(default = "default_small_penalty")]
    pub canonical_penalty: i32,

    /// Deduction for an undersized keyword set (default: 5)
    #[serde(default = "default_small_penalty")]
    pub keyword_penalty: i32,

    /// Keywords expected at minimum (default: 3)
    #[serde(default = "default_min_keywords")]
    pub min_keywords: usize,

    /// Scores below this are flagged as low quality (default: 60)
    #[serde(default = "default_min_acceptable_score")]
    pub min_acceptable_score: i32,

    /// Level thresholds
    #[serde(default)]
    pub thresholds: QualityThresholds,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            required_sections: default_required_sections(),
            max_score: default_max_score(),
            min_score: 0,
            missing_section_penalty: default_missing_section_penalty(),
            title_soft_limit: default_title_soft_limit(),
            description_soft_limit: default_description_soft_limit(),
            soft_limit_penalty: default_small_penalty(),
            missing_seo_penalty: default_missing_seo_penalty(),
            canonical_penalty: default_small_penalty(),
            keyword_penalty: default_small_penalty(),
            min_keywords: default_min_keywords(),
            min_acceptable_score: default_min_acceptable_score(),
            thresholds: QualityThresholds::default(),
        }
    }
}

/// Input record validation bounds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Lowest plausible pressure (default: 10)
    #[serde(default = "default_min_pressure")]
    pub min_pressure: f64,

    /// Highest plausible pressure (default: 60)
    #[serde(default = "default_max_pressure")]
    pub max_pressure: f64,

    /// Oldest accepted model year (default: 1990)
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Model years accepted beyond the current year (default: 2)
    #[serde(default = "default_years_ahead")]
    pub years_ahead: i32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_pressure: default_min_pressure(),
            max_pressure: default_max_pressure(),
            min_year: default_min_year(),
            years_ahead: default_years_ahead(),
        }
    }
}

/// What the orchestrator does when an item's endpoint is still pacing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Report the item as deferred and move on (default)
    #[default]
    Defer,
    /// Sleep until the endpoint frees up, if that is within `max_wait`
    Wait {
        /// Longest acceptable wait per item
        #[serde(with = "duration_serde")]
        max_wait: Duration,
    },
}

/// Batch execution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per chunk (default: 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause inserted between chunks (default: 2 seconds)
    #[serde(default = "default_chunk_pause", with = "duration_serde")]
    pub chunk_pause: Duration,

    /// Handling of rate-limited items
    #[serde(default)]
    pub rate_limit_policy: RateLimitPolicy,

    /// Success rate (percent) under which the summary recommends inspecting input (default: 70)
    #[serde(default = "default_success_rate_warning")]
    pub success_rate_warning: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            chunk_pause: default_chunk_pause(),
            rate_limit_policy: RateLimitPolicy::default(),
            success_rate_warning: default_success_rate_warning(),
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./tirepress.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for the pipeline
///
/// Fields are organized into sub-configs:
/// - [`gateway`](GatewayConfig) - endpoint, credentials, pacing, retries
/// - [`tiers`](TierConfig) - model and cost weight per tier
/// - [`escalation`](EscalationConfig) - attempt bounds and history length
/// - [`quality`](QualityConfig) - required sections and penalties
/// - [`validation`](ValidationConfig) - plausible pressure and year bands
/// - [`batch`](BatchConfig) - chunking and rate-limit handling
/// - [`persistence`](PersistenceConfig) - database location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Generation service settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tier table, one entry per tier in use
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,

    /// Escalation settings
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Quality scoring settings
    #[serde(default)]
    pub quality: QualityConfig,

    /// Input validation bounds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch execution settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            tiers: default_tiers(),
            escalation: EscalationConfig::default(),
            quality: QualityConfig::default(),
            validation: ValidationConfig::default(),
            batch: BatchConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(Error::config("tiers", "at least one tier is required"));
        }

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.tier) {
                return Err(Error::config(
                    "tiers",
                    format!("tier {} configured more than once", tier.tier),
                ));
            }
            if !(tier.cost_weight.is_finite() && tier.cost_weight > 0.0) {
                return Err(Error::config(
                    "tiers.cost_weight",
                    format!("tier {} has non-positive cost weight", tier.tier),
                ));
            }
            if tier.model.trim().is_empty() {
                return Err(Error::config(
                    "tiers.model",
                    format!("tier {} has no model", tier.tier),
                ));
            }
            let endpoint = self.endpoint_for(tier);
            url::Url::parse(endpoint).map_err(|e| {
                Error::config(
                    "tiers.endpoint",
                    format!("tier {} endpoint '{}' is invalid: {}", tier.tier, endpoint, e),
                )
            })?;
        }

        if self.batch.batch_size == 0 {
            return Err(Error::config("batch.batch_size", "must be at least 1"));
        }
        if self.escalation.history_cap == 0 {
            return Err(Error::config("escalation.history_cap", "must be at least 1"));
        }
        if self.escalation.max_attempts == Some(0) {
            return Err(Error::config("escalation.max_attempts", "must be at least 1"));
        }
        if self.validation.min_pressure >= self.validation.max_pressure {
            return Err(Error::config(
                "validation.min_pressure",
                "must be below validation.max_pressure",
            ));
        }
        if self.quality.min_score > self.quality.max_score {
            return Err(Error::config(
                "quality.min_score",
                "must not exceed quality.max_score",
            ));
        }

        Ok(())
    }

    /// Tier table sorted cheapest first
    pub fn sorted_tiers(&self) -> Vec<TierConfig> {
        let mut tiers = self.tiers.clone();
        tiers.sort_by_key(|t| t.tier);
        tiers
    }

    /// Endpoint a tier should call
    pub fn endpoint_for<'a>(&'a self, tier: &'a TierConfig) -> &'a str {
        tier.endpoint.as_deref().unwrap_or(&self.gateway.endpoint)
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_min_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            tier: Tier::Standard,
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            cost_weight: 1.0,
        },
        TierConfig {
            tier: Tier::Intermediate,
            model: "gpt-4o".to_string(),
            endpoint: None,
            cost_weight: 3.0,
        },
        TierConfig {
            tier: Tier::Premium,
            model: "gpt-4-turbo".to_string(),
            endpoint: None,
            cost_weight: 10.0,
        },
    ]
}

fn default_history_cap() -> usize {
    10
}

fn default_required_sections() -> Vec<SectionKind> {
    vec![
        SectionKind::Introduction,
        SectionKind::PressureTable,
        SectionKind::Conclusion,
    ]
}

fn default_max_score() -> i32 {
    100
}

fn default_missing_section_penalty() -> i32 {
    20
}

fn default_title_soft_limit() -> usize {
    65
}

fn default_description_soft_limit() -> usize {
    165
}

fn default_small_penalty() -> i32 {
    5
}

fn default_missing_seo_penalty() -> i32 {
    10
}

fn default_min_keywords() -> usize {
    3
}

fn default_min_acceptable_score() -> i32 {
    60
}

fn default_min_pressure() -> f64 {
    10.0
}

fn default_max_pressure() -> f64 {
    60.0
}

fn default_min_year() -> i32 {
    1990
}

fn default_years_ahead() -> i32 {
    2
}

fn default_batch_size() -> usize {
    50
}

fn default_chunk_pause() -> Duration {
    Duration::from_secs(2)
}

fn default_success_rate_warning() -> f64 {
    70.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./tirepress.db")
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
