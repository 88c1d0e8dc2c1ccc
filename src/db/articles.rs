//! Article persistence and lifecycle transitions.

use crate::error::DatabaseError;
use crate::store::{Article, NewArticle, SaveOutcome};
use crate::types::{ArticleStatus, NaturalKey};
use crate::{Error, Result};

use super::{ArticleRow, Database};

const SELECT_ARTICLE: &str = r#"
    SELECT
        id, natural_key, make, model, year, variant, status,
        content, content_hash, word_count, tier_used, generation_attempts,
        quality_score, quality_level, quality_issues, created_at, updated_at
    FROM articles
    WHERE natural_key = ?
"#;

const INSERT_ARTICLE: &str = r#"
    INSERT INTO articles (
        natural_key, make, model, year, variant, status,
        content, content_hash, word_count, tier_used, generation_attempts,
        quality_score, quality_level, quality_issues, created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

impl Database {
    /// Whether an article exists for the key
    pub async fn article_exists(&self, key: &NaturalKey) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE natural_key = ?")
                .bind(key)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check article existence: {}",
                        e
                    )))
                })?;

        Ok(count > 0)
    }

    /// Insert or replace an article in a single transaction
    ///
    /// Without `overwrite` the insert is `ON CONFLICT DO NOTHING`, so a row
    /// written by someone else since the caller's existence check is kept and
    /// the outcome is [`SaveOutcome::Skipped`].
    pub async fn save_article(&self, article: &NewArticle, overwrite: bool) -> Result<SaveOutcome> {
        let content = serde_json::to_string(&article.content)?;
        let issues = serde_json::to_string(&article.quality.issues)?;
        let content_hash = article.content.content_hash();
        let word_count = i64::try_from(article.content.word_count()).unwrap_or(i64::MAX);
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE natural_key = ?")
                .bind(&article.key)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check article existence: {}",
                        e
                    )))
                })?;

        let conflict = if overwrite {
            r#"
            ON CONFLICT(natural_key) DO UPDATE SET
                make = excluded.make,
                model = excluded.model,
                year = excluded.year,
                variant = excluded.variant,
                status = excluded.status,
                content = excluded.content,
                content_hash = excluded.content_hash,
                word_count = excluded.word_count,
                tier_used = excluded.tier_used,
                generation_attempts = excluded.generation_attempts,
                quality_score = excluded.quality_score,
                quality_level = excluded.quality_level,
                quality_issues = excluded.quality_issues,
                updated_at = excluded.updated_at
            "#
        } else {
            "ON CONFLICT(natural_key) DO NOTHING"
        };
        let sql = format!("{INSERT_ARTICLE} {conflict}");

        let result = sqlx::query(&sql)
            .bind(&article.key)
            .bind(&article.make)
            .bind(&article.model)
            .bind(article.year)
            .bind(&article.variant)
            .bind(ArticleStatus::Generated.to_i32())
            .bind(&content)
            .bind(&content_hash)
            .bind(word_count)
            .bind(article.tier_used.as_str())
            .bind(i64::from(article.generation_attempts))
            .bind(article.quality.score)
            .bind(article.quality.level.as_str())
            .bind(&issues)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to save article: {}",
                    e
                )))
            })?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to roll back transaction: {}",
                    e
                )))
            })?;
            tracing::debug!(natural_key = %article.key, "article exists, save skipped");
            return Ok(SaveOutcome::Skipped);
        }

        let row = sqlx::query_as::<_, ArticleRow>(SELECT_ARTICLE)
            .bind(&article.key)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read back article: {}",
                    e
                )))
            })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit article: {}",
                e
            )))
        })?;

        let saved = Article::try_from(row)?;
        Ok(if existing > 0 {
            SaveOutcome::Overwritten(saved)
        } else {
            SaveOutcome::Created(saved)
        })
    }

    /// Get an article by natural key
    pub async fn get_article(&self, key: &NaturalKey) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(SELECT_ARTICLE)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get article: {}",
                    e
                )))
            })?;

        row.map(Article::try_from).transpose()
    }

    /// Move an article one step along `generated -> enhanced -> published`
    pub async fn update_article_status(
        &self,
        key: &NaturalKey,
        status: ArticleStatus,
    ) -> Result<Article> {
        let current = self
            .get_article(key)
            .await?
            .ok_or_else(|| Error::Database(DatabaseError::NotFound(format!("article {}", key))))?;

        if !current.status.can_transition_to(status) {
            return Err(Error::Database(DatabaseError::InvalidTransition {
                key: key.to_string(),
                from: current.status.to_string(),
                to: status.to_string(),
            }));
        }

        // Guard on the observed status so a concurrent transition cannot be skipped over
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET status = ?, updated_at = ?
            WHERE natural_key = ? AND status = ?
            "#,
        )
        .bind(status.to_i32())
        .bind(chrono::Utc::now().timestamp())
        .bind(key)
        .bind(current.status.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update article status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::InvalidTransition {
                key: key.to_string(),
                from: current.status.to_string(),
                to: status.to_string(),
            }));
        }

        tracing::info!(natural_key = %key, from = %current.status, to = %status, "article status updated");

        self.get_article(key)
            .await?
            .ok_or_else(|| Error::Database(DatabaseError::NotFound(format!("article {}", key))))
    }

    /// Article count per status, in lifecycle order
    pub async fn count_articles_by_status(&self) -> Result<Vec<(ArticleStatus, u64)>> {
        let rows: Vec<(i32, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM articles GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count articles: {}",
                        e
                    )))
                })?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| {
                (
                    ArticleStatus::from_i32(status),
                    u64::try_from(count).unwrap_or(0),
                )
            })
            .collect())
    }
}
