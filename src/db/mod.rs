//! Database layer for tirepress-gen
//!
//! Handles SQLite persistence for articles and their generation attempts.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`articles`] - Article CRUD and lifecycle transitions
//! - [`attempts`] - Capped per-key generation attempt history
//!
//! [`Database`] implements [`ArticleStore`](crate::store::ArticleStore) by
//! delegating to those methods.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

use crate::content::GeneratedContent;
use crate::error::{DatabaseError, Error, Result};
use crate::quality::QualityIssue;
use crate::store::{Article, ArticleStore, NewArticle, SaveOutcome};
use crate::types::{
    ArticleStatus, AttemptOutcome, FailureCategory, GenerationAttempt, NaturalKey, QualityLevel, Tier,
};

mod articles;
mod attempts;
mod migrations;

/// Article record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    /// Unique database ID
    pub id: i64,
    /// Natural key slug
    pub natural_key: NaturalKey,
    /// Manufacturer
    pub make: String,
    /// Model
    pub model: String,
    /// Model year
    pub year: i32,
    /// Variant
    pub variant: Option<String>,
    /// Lifecycle status (0=pending, 1=generated, 2=enhanced, 3=published)
    pub status: i32,
    /// Content as JSON
    pub content: String,
    /// SHA-256 of the content JSON
    pub content_hash: String,
    /// Prose word count
    pub word_count: i64,
    /// Tier name
    pub tier_used: String,
    /// Calls made in the producing run
    pub generation_attempts: i64,
    /// Quality score
    pub quality_score: i32,
    /// Quality level name
    pub quality_level: String,
    /// Quality issues as JSON
    pub quality_issues: String,
    /// Unix timestamp when first written
    pub created_at: i64,
    /// Unix timestamp when last written
    pub updated_at: i64,
}

impl TryFrom<ArticleRow> for Article {
    type Error = Error;

    fn try_from(row: ArticleRow) -> Result<Self> {
        let content = serde_json::from_str::<GeneratedContent>(&row.content).map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Stored content for {} is not valid JSON: {}",
                row.natural_key, e
            )))
        })?;
        let quality_issues = serde_json::from_str::<Vec<QualityIssue>>(&row.quality_issues).unwrap_or_default();
        let tier_used = row.tier_used.parse::<Tier>().map_err(|e: String| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Stored tier for {}: {}",
                row.natural_key, e
            )))
        })?;

        Ok(Article {
            id: row.id,
            key: row.natural_key,
            make: row.make,
            model: row.model,
            year: row.year,
            variant: row.variant,
            status: ArticleStatus::from_i32(row.status),
            content,
            content_hash: row.content_hash,
            word_count: u32::try_from(row.word_count).unwrap_or(0),
            tier_used,
            generation_attempts: u32::try_from(row.generation_attempts).unwrap_or(0),
            quality_score: row.quality_score,
            quality_level: QualityLevel::from_str_lossy(&row.quality_level),
            quality_issues,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        })
    }
}

/// Generation attempt record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    /// Unique database ID
    pub id: i64,
    /// Natural key slug
    pub natural_key: NaturalKey,
    /// Tier name
    pub tier: String,
    /// "success" or "failure"
    pub outcome: String,
    /// Failure category name, for failures
    pub failure: Option<String>,
    /// Unix timestamp of the attempt
    pub attempted_at: i64,
}

impl AttemptRow {
    /// Convert to the domain type, skipping rows with an unknown tier
    fn into_attempt(self) -> Option<GenerationAttempt> {
        let tier = self.tier.parse::<Tier>().ok()?;
        let outcome = if self.outcome == "success" {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        Some(GenerationAttempt {
            tier,
            attempted_at: timestamp(self.attempted_at),
            outcome,
            failure: self.failure.as_deref().and_then(FailureCategory::parse),
        })
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Database handle for tirepress-gen
pub struct Database {
    pool: SqlitePool,
}

#[async_trait]
impl ArticleStore for Database {
    async fn exists(&self, key: &NaturalKey) -> Result<bool> {
        self.article_exists(key).await
    }

    async fn save(&self, article: &NewArticle, overwrite: bool) -> Result<SaveOutcome> {
        self.save_article(article, overwrite).await
    }

    async fn get(&self, key: &NaturalKey) -> Result<Option<Article>> {
        self.get_article(key).await
    }

    async fn update_status(&self, key: &NaturalKey, status: ArticleStatus) -> Result<Article> {
        self.update_article_status(key, status).await
    }

    async fn attempt_history(&self, key: &NaturalKey, cap: usize) -> Result<Vec<GenerationAttempt>> {
        self.get_attempts(key, cap).await
    }

    async fn append_attempts(
        &self,
        key: &NaturalKey,
        attempts: &[GenerationAttempt],
        cap: usize,
    ) -> Result<()> {
        self.insert_attempts(key, attempts, cap).await
    }

    async fn count_by_status(&self) -> Result<Vec<(ArticleStatus, u64)>> {
        self.count_articles_by_status().await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
