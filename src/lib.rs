//! # tirepress-gen
//!
//! Batch content-generation pipeline for vehicle tyre-pressure articles.
//!
//! Vehicle records are validated, turned into prompts, and sent to an
//! external generation service under a strict per-endpoint rate budget. When
//! a cheap tier returns unusable content the pipeline escalates to a more
//! capable one. Results are scored for structural quality and stored
//! idempotently by natural key, so re-running a batch never duplicates work.
//!
//! ## Design Philosophy
//!
//! - **Never block on the rate limit** - a pacing endpoint refuses at once; the caller defers or waits
//! - **Fail per item, not per batch** - every run returns a full [`BatchResult`]
//! - **Idempotent by default** - existing articles are skipped before any API cost
//! - **Library-first** - no CLI; progress is published as [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use tirepress_gen::{BatchOptions, BatchOrchestrator, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json_file(Path::new("tirepress.json"))?;
//!     let options = BatchOptions::from_config(&config);
//!     let orchestrator = BatchOrchestrator::from_config(config).await?;
//!
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let result = orchestrator
//!         .run_source(Path::new("vehicles.csv"), &options)
//!         .await?;
//!     println!(
//!         "generated {} skipped {} failed {} ({:.1}% success)",
//!         result.generated, result.skipped, result.failed, result.summary.success_rate
//!     );
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Typed article content
pub mod content;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Tier escalation strategy
pub mod escalation;
/// Rate-limited generation gateway
pub mod gateway;
/// CSV dataset ingest
pub mod ingest;
/// Batch orchestration
pub mod orchestrator;
/// Prompt construction
pub mod prompt;
/// Structural quality scoring
pub mod quality;
/// Retry logic with fixed delay
pub mod retry;
/// Article persistence interface
pub mod store;
/// Core types and events
pub mod types;
/// Record validation and normalization
pub mod validation;

// Re-export commonly used types
pub use config::{Config, RateLimitPolicy, TierConfig};
pub use content::{GeneratedContent, SectionKind};
pub use db::Database;
pub use error::{
    Categorized, DatabaseError, EscalationError, Error, GatewayError, Result, TransportError,
    ValidationError,
};
pub use escalation::{AttemptHistory, EscalationStrategy, Generation, StatsSnapshot};
pub use gateway::{CallPacer, ContentGateway, HttpTransport, RateLimitedGateway, Transport};
pub use orchestrator::{BatchError, BatchOptions, BatchOrchestrator, BatchResult, RecordFilter};
pub use quality::{ContentQualityScorer, QualityIssue, QualityReport};
pub use store::{Article, ArticleStore, NewArticle, SaveOutcome};
pub use types::{ArticleStatus, Event, GenerationAttempt, NaturalKey, Tier, VehicleType};
pub use validation::{NormalizedRecord, VehicleRecord, VehicleRecordValidator};
