//! Core types for tirepress-gen

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // static pattern
    Regex::new(r"[^a-z0-9]+").unwrap()
});

/// Deterministic identity of an article, derived from vehicle identity
///
/// Built from make, model and year, plus the variant when one is present.
/// Two records with the same key describe the same logical article.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    /// Derive a key from vehicle identity
    ///
    /// ```
    /// use tirepress_gen::types::NaturalKey;
    ///
    /// let key = NaturalKey::derive("Toyota", "Hilux", 2021, None);
    /// assert_eq!(key.as_str(), "toyota-hilux-2021");
    ///
    /// let key = NaturalKey::derive("Honda", "Civic", 2020, Some("Type R"));
    /// assert_eq!(key.as_str(), "honda-civic-2020-type-r");
    /// ```
    pub fn derive(make: &str, model: &str, year: i32, variant: Option<&str>) -> Self {
        let mut raw = format!("{make} {model} {year}");
        if let Some(variant) = variant.map(str::trim).filter(|v| !v.is_empty()) {
            raw.push(' ');
            raw.push_str(variant);
        }
        Self(slugify(&raw))
    }

    /// Wrap an already-slugged key (e.g. read back from storage)
    pub fn from_slug(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// The slug
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn slugify(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for NaturalKey {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for NaturalKey {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for NaturalKey {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let slug = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(slug))
    }
}

/// Service tier of the generation endpoint, cheapest first
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Cheapest, tried first
    Standard,
    /// Used after prior failures or one escalation
    Intermediate,
    /// Most capable and most expensive
    Premium,
}

impl Tier {
    /// All tiers in escalation order
    pub const ALL: [Tier; 3] = [Tier::Standard, Tier::Intermediate, Tier::Premium];

    /// Position in the escalation order (0 = cheapest)
    pub fn index(&self) -> usize {
        match self {
            Tier::Standard => 0,
            Tier::Intermediate => 1,
            Tier::Premium => 2,
        }
    }

    /// The next more capable tier, if any
    pub fn next(&self) -> Option<Tier> {
        Tier::ALL.get(self.index() + 1).copied()
    }

    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Intermediate => "intermediate",
            Tier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Tier::Standard),
            "intermediate" => Ok(Tier::Intermediate),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Vehicle type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    /// Combustion passenger car, SUV, van or pickup
    Car,
    /// Motorcycle or scooter
    Motorcycle,
    /// Battery electric vehicle
    Electric,
    /// Hybrid or plug-in hybrid
    Hybrid,
}

impl VehicleType {
    /// Parse a dataset value, accepting common aliases
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "car" | "auto" | "suv" | "van" | "pickup" | "truck" => Some(VehicleType::Car),
            "motorcycle" | "moto" | "motorbike" | "scooter" => Some(VehicleType::Motorcycle),
            "electric" | "ev" | "bev" => Some(VehicleType::Electric),
            "hybrid" | "phev" | "hev" => Some(VehicleType::Hybrid),
            _ => None,
        }
    }

    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Electric => "electric",
            VehicleType::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Reserved before content exists
    Pending,
    /// Content generated and persisted
    Generated,
    /// Refined by the downstream pass
    Enhanced,
    /// Live on the site
    Published,
}

impl ArticleStatus {
    /// Convert integer status code to ArticleStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            1 => ArticleStatus::Generated,
            2 => ArticleStatus::Enhanced,
            3 => ArticleStatus::Published,
            _ => ArticleStatus::Pending,
        }
    }

    /// Convert ArticleStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            ArticleStatus::Pending => 0,
            ArticleStatus::Generated => 1,
            ArticleStatus::Enhanced => 2,
            ArticleStatus::Published => 3,
        }
    }

    /// Whether moving from `self` to `next` follows the lifecycle
    ///
    /// `pending -> generated -> enhanced -> published`, one step at a time.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        next.to_i32() == self.to_i32() + 1
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Generated => "generated",
            ArticleStatus::Enhanced => "enhanced",
            ArticleStatus::Published => "published",
        };
        f.write_str(s)
    }
}

/// Discrete quality level derived from the numeric score
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Below the poor threshold
    VeryPoor,
    /// Usable only after refinement
    Poor,
    /// Acceptable
    Average,
    /// Minor issues only
    Good,
    /// Structurally complete
    Excellent,
}

impl QualityLevel {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::VeryPoor => "very_poor",
            QualityLevel::Poor => "poor",
            QualityLevel::Average => "average",
            QualityLevel::Good => "good",
            QualityLevel::Excellent => "excellent",
        }
    }

    /// Parse the stored string form, defaulting to `VeryPoor`
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "excellent" => QualityLevel::Excellent,
            "good" => QualityLevel::Good,
            "average" => QualityLevel::Average,
            "poor" => QualityLevel::Poor,
            _ => QualityLevel::VeryPoor,
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a generation attempt failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Payload could not be extracted or parsed
    Malformed,
    /// Payload parsed but carried no usable content
    Degenerate,
    /// Timeout or network failure after retries
    Transport,
}

impl FailureCategory {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Malformed => "malformed",
            FailureCategory::Degenerate => "degenerate",
            FailureCategory::Transport => "transport",
        }
    }

    /// Parse the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "malformed" => Some(FailureCategory::Malformed),
            "degenerate" => Some(FailureCategory::Degenerate),
            "transport" => Some(FailureCategory::Transport),
            _ => None,
        }
    }
}

/// Outcome of a single generation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// Usable content returned
    Success,
    /// Attempt failed; see the failure category
    Failure,
}

/// One call to the generation service, recorded in an attempt history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationAttempt {
    /// Tier that was called
    pub tier: Tier,
    /// When the attempt was made
    pub attempted_at: DateTime<Utc>,
    /// Success or failure
    pub outcome: AttemptOutcome,
    /// Failure category, present only for failures
    pub failure: Option<FailureCategory>,
}

impl GenerationAttempt {
    /// Successful attempt at `tier`, timestamped now
    pub fn success(tier: Tier) -> Self {
        Self {
            tier,
            attempted_at: Utc::now(),
            outcome: AttemptOutcome::Success,
            failure: None,
        }
    }

    /// Failed attempt at `tier`, timestamped now
    pub fn failure(tier: Tier, category: FailureCategory) -> Self {
        Self {
            tier,
            attempted_at: Utc::now(),
            outcome: AttemptOutcome::Failure,
            failure: Some(category),
        }
    }

    /// Whether this attempt failed
    pub fn is_failure(&self) -> bool {
        self.outcome == AttemptOutcome::Failure
    }
}

/// Progress events emitted by the batch orchestrator
///
/// Subscribe via [`BatchOrchestrator::subscribe`](crate::orchestrator::BatchOrchestrator::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch run started
    BatchStarted {
        /// Run identifier
        run_id: uuid::Uuid,
        /// Number of input records after filtering and limiting
        total: usize,
    },
    /// A record was rejected by validation
    ItemRejected {
        /// Source row, if known
        row: Option<usize>,
        /// Rejection category
        category: String,
    },
    /// An item already had an article and was skipped
    ItemSkipped {
        /// Natural key
        key: NaturalKey,
    },
    /// An article was generated (and persisted unless dry-run)
    ItemGenerated {
        /// Natural key
        key: NaturalKey,
        /// Tier that produced the content
        tier: Tier,
        /// Quality score
        score: i32,
    },
    /// An item was deferred because its endpoint was still pacing
    ItemDeferred {
        /// Natural key
        key: NaturalKey,
        /// Seconds until the endpoint accepts calls
        retry_in_secs: u64,
    },
    /// An item failed
    ItemFailed {
        /// Natural key
        key: NaturalKey,
        /// Failure category
        category: String,
    },
    /// A chunk finished
    ChunkCompleted {
        /// Zero-based chunk index
        index: usize,
        /// Number of chunks
        of: usize,
    },
    /// The run finished
    BatchCompleted {
        /// Run identifier
        run_id: uuid::Uuid,
        /// Articles generated
        generated: usize,
        /// Items failed
        failed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_is_deterministic_and_slugged() {
        let a = NaturalKey::derive("  Mercedes-Benz ", "C 200", 2019, None);
        let b = NaturalKey::derive("mercedes benz", "c-200", 2019, Some("   "));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "mercedes-benz-c-200-2019");
    }

    #[test]
    fn test_natural_key_includes_variant() {
        let base = NaturalKey::derive("Yamaha", "MT-07", 2022, None);
        let variant = NaturalKey::derive("Yamaha", "MT-07", 2022, Some("Pure"));
        assert_ne!(base, variant);
        assert_eq!(variant.as_str(), "yamaha-mt-07-2022-pure");
    }

    #[test]
    fn test_tier_order_and_next() {
        assert!(Tier::Standard < Tier::Intermediate);
        assert!(Tier::Intermediate < Tier::Premium);
        assert_eq!(Tier::Standard.next(), Some(Tier::Intermediate));
        assert_eq!(Tier::Intermediate.next(), Some(Tier::Premium));
        assert_eq!(Tier::Premium.next(), None);
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn test_status_transitions_are_single_step() {
        assert!(ArticleStatus::Pending.can_transition_to(ArticleStatus::Generated));
        assert!(ArticleStatus::Generated.can_transition_to(ArticleStatus::Enhanced));
        assert!(ArticleStatus::Enhanced.can_transition_to(ArticleStatus::Published));
        assert!(!ArticleStatus::Generated.can_transition_to(ArticleStatus::Published));
        assert!(!ArticleStatus::Published.can_transition_to(ArticleStatus::Generated));
        for status in [
            ArticleStatus::Pending,
            ArticleStatus::Generated,
            ArticleStatus::Enhanced,
            ArticleStatus::Published,
        ] {
            assert_eq!(ArticleStatus::from_i32(status.to_i32()), status);
        }
    }

    #[test]
    fn test_vehicle_type_aliases() {
        assert_eq!(VehicleType::parse("Pickup"), Some(VehicleType::Car));
        assert_eq!(VehicleType::parse(" moto "), Some(VehicleType::Motorcycle));
        assert_eq!(VehicleType::parse("EV"), Some(VehicleType::Electric));
        assert_eq!(VehicleType::parse("phev"), Some(VehicleType::Hybrid));
        assert_eq!(VehicleType::parse("hovercraft"), None);
    }
}
