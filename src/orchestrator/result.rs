//! Batch run reporting

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::escalation::StatsSnapshot;
use crate::types::NaturalKey;

/// One item that did not make it to a stored article
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchError {
    /// Natural key, when the record got far enough to have one
    pub key: Option<NaturalKey>,
    /// Source row, when known
    pub row: Option<usize>,
    /// Machine-readable category (e.g. "out_of_range", "exhausted")
    pub category: String,
    /// Human-readable reason
    pub message: String,
}

/// Advisory summary computed once a run finishes
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchSummary {
    /// Generated as a percentage of items that needed work
    pub success_rate: f64,
    /// Failures per category
    pub error_counts: BTreeMap<String, usize>,
    /// Heuristic follow-ups; never used for control flow
    pub recommendations: Vec<String>,
}

/// Outcome of one orchestrator run
///
/// Created fresh per run and only reported, never stored.
#[derive(Clone, Debug, Serialize)]
pub struct BatchResult {
    /// Run identifier
    pub run_id: Uuid,
    /// Whether the run was simulated
    pub dry_run: bool,
    /// Records considered after filtering and limiting, including rejects
    pub processed: usize,
    /// Articles written (or simulated, in a dry run)
    pub generated: usize,
    /// Items that already had an article
    pub skipped: usize,
    /// Items rejected or failed
    pub failed: usize,
    /// Items left for a later run because their endpoint was pacing
    pub deferred: usize,
    /// Generated articles scoring under the acceptable minimum
    pub low_quality: usize,
    /// Per-item failures, in processing order
    pub errors: Vec<BatchError>,
    /// Keys of deferred items
    pub deferred_keys: Vec<NaturalKey>,
    /// Escalation statistics of the orchestrator at the end of the run
    pub escalation: StatsSnapshot,
    /// Derived summary
    pub summary: BatchSummary,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    pub(crate) fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            processed: 0,
            generated: 0,
            skipped: 0,
            failed: 0,
            deferred: 0,
            low_quality: 0,
            errors: Vec::new(),
            deferred_keys: Vec::new(),
            escalation: StatsSnapshot::default(),
            summary: BatchSummary::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        key: Option<NaturalKey>,
        row: Option<usize>,
        category: &str,
        message: impl Into<String>,
    ) {
        self.failed += 1;
        self.errors.push(BatchError {
            key,
            row,
            category: category.to_string(),
            message: message.into(),
        });
    }

    pub(crate) fn record_deferral(&mut self, key: NaturalKey) {
        self.deferred += 1;
        self.deferred_keys.push(key);
    }

    /// Generated over items that needed work, as a percentage
    ///
    /// A run where every item was skipped (or nothing was processed) is
    /// 100% successful.
    pub fn success_rate(&self) -> f64 {
        let needed = self.processed.saturating_sub(self.skipped);
        if needed == 0 {
            return 100.0;
        }
        self.generated as f64 / needed as f64 * 100.0
    }

    /// Failures per category
    pub fn error_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for error in &self.errors {
            *counts.entry(error.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Stamp the finish time and compute the summary
    pub(crate) fn finish(&mut self, escalation: StatsSnapshot, success_rate_warning: f64) {
        self.escalation = escalation;
        self.finished_at = Some(Utc::now());

        let success_rate = self.success_rate();
        let error_counts = self.error_counts();
        let recommendations = self.recommendations(success_rate, &error_counts, success_rate_warning);
        self.summary = BatchSummary {
            success_rate,
            error_counts,
            recommendations,
        };
    }

    fn recommendations(
        &self,
        success_rate: f64,
        error_counts: &BTreeMap<String, usize>,
        success_rate_warning: f64,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if success_rate < success_rate_warning {
            out.push(format!(
                "success rate below {success_rate_warning:.0}%: inspect input quality"
            ));
        }

        let rejected: usize = error_counts
            .iter()
            .filter(|(category, _)| is_validation_category(category))
            .map(|(_, count)| count)
            .sum();
        if rejected > 0 {
            out.push(format!(
                "{rejected} records rejected by validation: fix the source rows listed in errors"
            ));
        }

        if let Some(count) = error_counts.get("exhausted") {
            out.push(format!(
                "{count} items exhausted every tier: review the prompt or the tier models"
            ));
        }

        let transport: usize = ["transport", "timeout", "connection", "upstream_status"]
            .iter()
            .filter_map(|c| error_counts.get(*c))
            .sum();
        if transport > 0 {
            out.push(format!(
                "{transport} transport failures: check endpoint availability and request timeout"
            ));
        }

        if let Some(count) = error_counts.get("persistence") {
            out.push(format!(
                "{count} persistence failures: check the database path and disk space"
            ));
        }

        if self.deferred > 0 {
            out.push(format!(
                "{} items deferred by rate limiting: run the batch again later",
                self.deferred
            ));
        }

        if self.low_quality > 0 {
            out.push(format!(
                "{} articles scored below the quality threshold: review before publishing",
                self.low_quality
            ));
        }

        let e = &self.escalation;
        if e.escalations > 0 && e.escalations * 2 > e.calls.iter().sum::<u64>() {
            out.push(
                "most calls escalated: the standard tier model may be unsuitable".to_string(),
            );
        }

        out
    }
}

fn is_validation_category(category: &str) -> bool {
    matches!(
        category,
        "missing_field" | "out_of_range" | "invalid_year" | "inconsistent_pressure" | "invalid_value"
    )
}
