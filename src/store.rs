//! Article persistence interface
//!
//! [`ArticleStore`] is the seam between the pipeline and storage. The SQLite
//! implementation lives in [`crate::db`]; the trait keeps the orchestrator
//! testable against any backend that honors the same contract:
//!
//! - at most one article per natural key
//! - `save` is atomic: it either creates, overwrites, or skips, never a
//!   partial row
//! - status only moves `generated -> enhanced -> published`

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::content::GeneratedContent;
use crate::error::Result;
use crate::quality::{QualityIssue, QualityReport};
use crate::types::{ArticleStatus, GenerationAttempt, NaturalKey, QualityLevel, Tier};

/// Article ready to be written
#[derive(Clone, Debug)]
pub struct NewArticle {
    /// Identity
    pub key: NaturalKey,
    /// Manufacturer
    pub make: String,
    /// Model
    pub model: String,
    /// Model year
    pub year: i32,
    /// Variant, when part of the key
    pub variant: Option<String>,
    /// Generated content
    pub content: GeneratedContent,
    /// Tier that produced the content
    pub tier_used: Tier,
    /// Calls made in the run that produced it
    pub generation_attempts: u32,
    /// Structural quality
    pub quality: QualityReport,
}

/// Stored article
#[derive(Clone, Debug)]
pub struct Article {
    /// Row id
    pub id: i64,
    /// Identity
    pub key: NaturalKey,
    /// Manufacturer
    pub make: String,
    /// Model
    pub model: String,
    /// Model year
    pub year: i32,
    /// Variant
    pub variant: Option<String>,
    /// Lifecycle status
    pub status: ArticleStatus,
    /// Content
    pub content: GeneratedContent,
    /// SHA-256 of the serialized content
    pub content_hash: String,
    /// Prose word count
    pub word_count: u32,
    /// Tier that produced the content
    pub tier_used: Tier,
    /// Calls made in the run that produced it
    pub generation_attempts: u32,
    /// Quality score
    pub quality_score: i32,
    /// Quality level
    pub quality_level: QualityLevel,
    /// Quality issues
    pub quality_issues: Vec<QualityIssue>,
    /// First written
    pub created_at: DateTime<Utc>,
    /// Last written
    pub updated_at: DateTime<Utc>,
}

/// What `save` did
#[derive(Clone, Debug)]
pub enum SaveOutcome {
    /// No article existed; one was inserted
    Created(Article),
    /// An article existed and was replaced
    Overwritten(Article),
    /// An article existed and overwrite was off; nothing was written
    Skipped,
}

impl SaveOutcome {
    /// The written article, unless skipped
    pub fn article(&self) -> Option<&Article> {
        match self {
            SaveOutcome::Created(a) | SaveOutcome::Overwritten(a) => Some(a),
            SaveOutcome::Skipped => None,
        }
    }
}

/// Storage for articles and their generation attempts
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article exists for `key`
    async fn exists(&self, key: &NaturalKey) -> Result<bool>;

    /// Write an article in one transaction
    ///
    /// Without `overwrite` an existing article is left untouched and
    /// [`SaveOutcome::Skipped`] is returned, even if it appeared between an
    /// earlier `exists` check and this call.
    async fn save(&self, article: &NewArticle, overwrite: bool) -> Result<SaveOutcome>;

    /// Read an article by key
    async fn get(&self, key: &NaturalKey) -> Result<Option<Article>>;

    /// Move an article one step along its lifecycle
    async fn update_status(&self, key: &NaturalKey, status: ArticleStatus) -> Result<Article>;

    /// Most recent `cap` attempts for `key`, oldest first
    async fn attempt_history(&self, key: &NaturalKey, cap: usize) -> Result<Vec<GenerationAttempt>>;

    /// Append attempts for `key`, keeping only the newest `cap`
    async fn append_attempts(
        &self,
        key: &NaturalKey,
        attempts: &[GenerationAttempt],
        cap: usize,
    ) -> Result<()>;

    /// Article count per status
    async fn count_by_status(&self) -> Result<Vec<(ArticleStatus, u64)>>;
}
