//! Batch orchestration
//!
//! [`BatchOrchestrator`] drives one batch run end to end:
//!
//! 1. filter and limit the input, then validate every record
//! 2. split the valid records into fixed-size chunks, processed one after another
//! 3. per item, skip it when an article already exists (unless overwriting),
//!    before any call to the generation service is made
//! 4. generate through the [`EscalationStrategy`], score, and save
//! 5. summarize
//!
//! One item's failure never stops the run. A finished run always yields a
//! full [`BatchResult`], even when every item failed.

mod result;
mod simulate;

pub use result::{BatchError, BatchResult, BatchSummary};
pub use simulate::simulated_content;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{Config, RateLimitPolicy};
use crate::db::Database;
use crate::error::{Categorized, EscalationError, Error, Result};
use crate::escalation::{AttemptHistory, EscalationStrategy, Generation};
use crate::gateway::{MAX_RETRY_IN, http_gateways};
use crate::ingest::{self, Dataset};
use crate::prompt::PromptBuilder;
use crate::quality::ContentQualityScorer;
use crate::store::{ArticleStore, NewArticle, SaveOutcome};
use crate::types::{Event, NaturalKey, Tier, VehicleType};
use crate::validation::{NormalizedRecord, VehicleRecord, VehicleRecordValidator};

/// Shortest sleep under [`RateLimitPolicy::Wait`]
const MIN_WAIT: Duration = Duration::from_millis(10);

/// Predicate over raw records, applied before validation
///
/// Every populated field must match; text comparisons ignore case and
/// surrounding whitespace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordFilter {
    /// Manufacturer
    pub make: Option<String>,
    /// Model
    pub model: Option<String>,
    /// Vehicle type
    pub vehicle_type: Option<VehicleType>,
    /// Earliest model year
    pub year_from: Option<i32>,
    /// Latest model year
    pub year_to: Option<i32>,
}

impl RecordFilter {
    /// Whether `record` passes the filter
    pub fn matches(&self, record: &VehicleRecord) -> bool {
        fn same(wanted: &Option<String>, actual: &Option<String>) -> bool {
            match wanted {
                None => true,
                Some(w) => actual
                    .as_deref()
                    .is_some_and(|a| a.trim().eq_ignore_ascii_case(w.trim())),
            }
        }

        if !same(&self.make, &record.make) || !same(&self.model, &record.model) {
            return false;
        }
        if let Some(wanted) = self.vehicle_type
            && record.vehicle_type.as_deref().and_then(VehicleType::parse) != Some(wanted)
        {
            return false;
        }
        if self.year_from.is_some() || self.year_to.is_some() {
            let Some(year) = record.year else {
                return false;
            };
            if self.year_from.is_some_and(|from| year < from)
                || self.year_to.is_some_and(|to| year > to)
            {
                return false;
            }
        }
        true
    }
}

/// Per-run options
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Items per chunk
    pub batch_size: usize,
    /// Simulate generation; nothing is sent or written
    pub dry_run: bool,
    /// Regenerate and replace existing articles
    pub overwrite: bool,
    /// Process at most this many records (after filtering)
    pub limit: Option<usize>,
    /// Start every item at this tier
    pub forced_tier: Option<Tier>,
    /// Only process matching records
    pub filter: Option<RecordFilter>,
    /// What to do with items whose endpoint is still pacing
    pub rate_limit_policy: RateLimitPolicy,
}

impl BatchOptions {
    /// Options with chunking and rate-limit handling taken from `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch.batch_size,
            dry_run: false,
            overwrite: false,
            limit: None,
            forced_tier: None,
            filter: None,
            rate_limit_policy: config.batch.rate_limit_policy.clone(),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Sequential batch driver
pub struct BatchOrchestrator {
    config: Arc<Config>,
    validator: VehicleRecordValidator,
    strategy: EscalationStrategy,
    scorer: ContentQualityScorer,
    prompts: PromptBuilder,
    store: Arc<dyn ArticleStore>,
    event_tx: broadcast::Sender<Event>,
}

impl BatchOrchestrator {
    /// Assemble an orchestrator from its parts
    ///
    /// Validator, scorer and prompt builder are derived from `config`.
    pub fn new(config: Config, strategy: EscalationStrategy, store: Arc<dyn ArticleStore>) -> Self {
        let validator = VehicleRecordValidator::new(config.validation.clone());
        let scorer = ContentQualityScorer::new(config.quality.clone());
        let prompts = PromptBuilder::new(
            config.quality.required_sections.clone(),
            config.quality.title_soft_limit,
            config.quality.description_soft_limit,
        );
        let (event_tx, _rx) = broadcast::channel(1000);

        Self {
            config: Arc::new(config),
            validator,
            strategy,
            scorer,
            prompts,
            store,
            event_tx,
        }
    }

    /// Open the database and build HTTP gateways from `config`
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        let gateways = http_gateways(&config)?;
        let strategy = EscalationStrategy::from_config(&config, gateways);
        Ok(Self::new(config, strategy, Arc::new(db)))
    }

    /// Subscribe to progress events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The escalation strategy in use
    pub fn strategy(&self) -> &EscalationStrategy {
        &self.strategy
    }

    fn emit_event(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Load a CSV dataset and run it
    ///
    /// Rows that fail to parse are reported as failures alongside the
    /// validation rejects.
    pub async fn run_source(&self, path: &Path, options: &BatchOptions) -> Result<BatchResult> {
        let dataset = ingest::load_csv(path)?;
        self.run_dataset(dataset, options).await
    }

    /// Run a batch over in-memory records
    pub async fn run(&self, records: Vec<VehicleRecord>, options: &BatchOptions) -> Result<BatchResult> {
        self.run_dataset(
            Dataset {
                records,
                rejected: Vec::new(),
            },
            options,
        )
        .await
    }

    async fn run_dataset(&self, dataset: Dataset, options: &BatchOptions) -> Result<BatchResult> {
        if options.batch_size == 0 {
            return Err(Error::config("batch_size", "must be at least 1"));
        }

        let mut result = BatchResult::new(uuid::Uuid::new_v4(), options.dry_run);

        let records: Vec<VehicleRecord> = dataset
            .records
            .into_iter()
            .filter(|r| options.filter.as_ref().is_none_or(|f| f.matches(r)))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        result.processed = records.len() + dataset.rejected.len();
        self.emit_event(Event::BatchStarted {
            run_id: result.run_id,
            total: result.processed,
        });
        tracing::info!(
            run_id = %result.run_id,
            total = result.processed,
            dry_run = options.dry_run,
            overwrite = options.overwrite,
            "batch started"
        );

        for (row, error) in dataset.rejected {
            self.reject(&mut result, Some(row), error.category(), &error.message);
        }

        let mut valid = Vec::with_capacity(records.len());
        for record in &records {
            match self.validator.validate(record) {
                Ok(normalized) => valid.push(normalized),
                Err(error) => self.reject(&mut result, record.row, error.category(), &error.message),
            }
        }

        let chunks: Vec<&[NormalizedRecord]> = valid.chunks(options.batch_size).collect();
        let chunk_count = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            tracing::info!(
                run_id = %result.run_id,
                chunk = index + 1,
                of = chunk_count,
                items = chunk.len(),
                "processing chunk"
            );

            for record in chunk {
                self.process_item(record, options, &mut result).await;
            }

            self.emit_event(Event::ChunkCompleted {
                index,
                of: chunk_count,
            });

            let pause = self.config.batch.chunk_pause;
            if !options.dry_run && !pause.is_zero() && index + 1 < chunk_count {
                tokio::time::sleep(pause).await;
            }
        }

        result.finish(
            self.strategy.stats().snapshot(),
            self.config.batch.success_rate_warning,
        );

        self.emit_event(Event::BatchCompleted {
            run_id: result.run_id,
            generated: result.generated,
            failed: result.failed,
        });
        tracing::info!(
            run_id = %result.run_id,
            processed = result.processed,
            generated = result.generated,
            skipped = result.skipped,
            failed = result.failed,
            deferred = result.deferred,
            success_rate = result.summary.success_rate,
            "batch completed"
        );

        Ok(result)
    }

    fn reject(&self, result: &mut BatchResult, row: Option<usize>, category: &str, message: &str) {
        result.record_failure(None, row, category, message);
        self.emit_event(Event::ItemRejected {
            row,
            category: category.to_string(),
        });
    }

    fn fail(&self, result: &mut BatchResult, record: &NormalizedRecord, category: &str, message: String) {
        tracing::error!(
            natural_key = %record.key,
            row = ?record.row,
            category,
            error = %message,
            "item failed"
        );
        result.record_failure(Some(record.key.clone()), record.row, category, message);
        self.emit_event(Event::ItemFailed {
            key: record.key.clone(),
            category: category.to_string(),
        });
    }

    async fn process_item(&self, record: &NormalizedRecord, options: &BatchOptions, result: &mut BatchResult) {
        let key = &record.key;

        // Existence check comes before any generation cost
        if !options.overwrite {
            match self.store.exists(key).await {
                Ok(true) => {
                    tracing::debug!(natural_key = %key, "article exists, skipping");
                    result.skipped += 1;
                    self.emit_event(Event::ItemSkipped { key: key.clone() });
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    self.fail(result, record, e.category(), e.to_string());
                    return;
                }
            }
        }

        if options.dry_run {
            let generation = Generation {
                content: simulated_content(record),
                tier_used: options.forced_tier.unwrap_or(Tier::Standard),
                attempts: 1,
            };
            let quality = self.scorer.score(&generation.content);
            if quality.below_threshold() {
                result.low_quality += 1;
            }
            result.generated += 1;
            self.emit_event(Event::ItemGenerated {
                key: key.clone(),
                tier: generation.tier_used,
                score: quality.score,
            });
            return;
        }

        let cap = self.config.escalation.history_cap;
        let prior = match self.store.attempt_history(key, cap).await {
            Ok(prior) => prior,
            Err(e) => {
                self.fail(result, record, e.category(), e.to_string());
                return;
            }
        };
        let mut history = AttemptHistory::from_attempts(prior, cap);
        let prompt = self.prompts.build(record);

        let outcome = self
            .generate(key, &prompt, &mut history, options)
            .await;

        let unsaved = history.take_unsaved();
        if let Err(e) = self.store.append_attempts(key, &unsaved, cap).await {
            tracing::warn!(natural_key = %key, error = %e, "failed to persist attempt history");
        }

        let generation = match outcome {
            Ok(generation) => generation,
            Err(EscalationError::RateLimited { tier, retry_in }) => {
                tracing::warn!(
                    natural_key = %key,
                    tier = %tier,
                    retry_in_secs = retry_in.as_secs(),
                    "endpoint pacing, item deferred"
                );
                result.record_deferral(key.clone());
                self.emit_event(Event::ItemDeferred {
                    key: key.clone(),
                    retry_in_secs: retry_in.as_secs(),
                });
                return;
            }
            Err(e) => {
                self.fail(result, record, e.category(), e.to_string());
                return;
            }
        };

        let quality = self.scorer.score(&generation.content);
        let score = quality.score;
        let low_quality = quality.below_threshold();
        if low_quality {
            tracing::warn!(
                natural_key = %key,
                score,
                level = quality.level.as_str(),
                issues = quality.issues.len(),
                "article below quality threshold, saving with issues"
            );
        }

        let article = NewArticle {
            key: key.clone(),
            make: record.make.clone(),
            model: record.model.clone(),
            year: record.year,
            variant: record.variant.clone(),
            content: generation.content,
            tier_used: generation.tier_used,
            generation_attempts: generation.attempts,
            quality,
        };

        match self.store.save(&article, options.overwrite).await {
            Ok(SaveOutcome::Skipped) => {
                // Written by someone else since the existence check
                tracing::debug!(natural_key = %key, "article appeared concurrently, skipping");
                result.skipped += 1;
                self.emit_event(Event::ItemSkipped { key: key.clone() });
            }
            Ok(outcome) => {
                result.generated += 1;
                if low_quality {
                    result.low_quality += 1;
                }
                tracing::info!(
                    natural_key = %key,
                    tier = %generation.tier_used,
                    attempts = generation.attempts,
                    score,
                    overwritten = matches!(outcome, SaveOutcome::Overwritten(_)),
                    "article saved"
                );
                self.emit_event(Event::ItemGenerated {
                    key: key.clone(),
                    tier: generation.tier_used,
                    score,
                });
            }
            Err(e) => self.fail(result, record, e.category(), e.to_string()),
        }
    }

    /// Generate under the run's rate-limit policy
    ///
    /// With [`RateLimitPolicy::Wait`] the orchestrator sleeps on a refusal and
    /// tries again, as long as the total wait for the item stays within
    /// `max_wait`. The gateway itself never waits.
    async fn generate(
        &self,
        key: &NaturalKey,
        prompt: &str,
        history: &mut AttemptHistory,
        options: &BatchOptions,
    ) -> std::result::Result<Generation, EscalationError> {
        let RateLimitPolicy::Wait { max_wait } = options.rate_limit_policy else {
            return self
                .strategy
                .generate(key, prompt, history, options.forced_tier)
                .await;
        };

        let mut waited = Duration::ZERO;
        loop {
            match self
                .strategy
                .generate(key, prompt, history, options.forced_tier)
                .await
            {
                Err(EscalationError::RateLimited { tier, retry_in }) => {
                    let pause = retry_in.clamp(MIN_WAIT, MAX_RETRY_IN);
                    if waited.saturating_add(pause) > max_wait {
                        return Err(EscalationError::RateLimited { tier, retry_in });
                    }
                    tracing::debug!(
                        natural_key = %key,
                        tier = %tier,
                        wait_ms = pause.as_millis() as u64,
                        "waiting for endpoint"
                    );
                    tokio::time::sleep(pause).await;
                    waited = waited.saturating_add(pause);
                }
                other => return other,
            }
        }
    }
}
