//! Capped generation attempt history per natural key.

use crate::error::DatabaseError;
use crate::types::{AttemptOutcome, GenerationAttempt, NaturalKey};
use crate::{Error, Result};

use super::{AttemptRow, Database};

impl Database {
    /// Newest `cap` attempts for the key, returned oldest first
    pub async fn get_attempts(&self, key: &NaturalKey, cap: usize) -> Result<Vec<GenerationAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, natural_key, tier, outcome, failure, attempted_at
            FROM generation_attempts
            WHERE natural_key = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(key)
        .bind(i64::try_from(cap).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get generation attempts: {}",
                e
            )))
        })?;

        Ok(rows
            .into_iter()
            .rev()
            .filter_map(AttemptRow::into_attempt)
            .collect())
    }

    /// Append attempts and trim the key's history to the newest `cap`
    pub async fn insert_attempts(
        &self,
        key: &NaturalKey,
        attempts: &[GenerationAttempt],
        cap: usize,
    ) -> Result<()> {
        if attempts.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let mut query_builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "INSERT INTO generation_attempts (natural_key, tier, outcome, failure, attempted_at) ",
        );
        query_builder.push_values(attempts, |mut b, attempt| {
            let outcome = match attempt.outcome {
                AttemptOutcome::Success => "success",
                AttemptOutcome::Failure => "failure",
            };
            b.push_bind(key.clone())
                .push_bind(attempt.tier.as_str())
                .push_bind(outcome)
                .push_bind(attempt.failure.map(|f| f.as_str()))
                .push_bind(attempt.attempted_at.timestamp());
        });
        query_builder.build().execute(&mut *tx).await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert generation attempts: {}",
                e
            )))
        })?;

        let trimmed = sqlx::query(
            r#"
            DELETE FROM generation_attempts
            WHERE natural_key = ?
              AND id NOT IN (
                SELECT id FROM generation_attempts
                WHERE natural_key = ?
                ORDER BY id DESC
                LIMIT ?
              )
            "#,
        )
        .bind(key)
        .bind(key)
        .bind(i64::try_from(cap).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to trim generation attempts: {}",
                e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit generation attempts: {}",
                e
            )))
        })?;

        if trimmed.rows_affected() > 0 {
            tracing::debug!(
                natural_key = %key,
                removed = trimmed.rows_affected(),
                "trimmed attempt history"
            );
        }

        Ok(())
    }
}
