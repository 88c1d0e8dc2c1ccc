//! Bounded per-key attempt history

use std::collections::VecDeque;

use crate::types::GenerationAttempt;

/// Ordered generation attempts for one natural key, oldest first
///
/// Holds at most `cap` entries; recording past the cap drops the oldest.
/// Attempts recorded since the history was loaded are tracked separately so
/// the caller can persist only what is new.
#[derive(Clone, Debug)]
pub struct AttemptHistory {
    attempts: VecDeque<GenerationAttempt>,
    cap: usize,
    unsaved: usize,
}

impl AttemptHistory {
    /// Empty history with the given cap
    pub fn new(cap: usize) -> Self {
        Self {
            attempts: VecDeque::with_capacity(cap),
            cap: cap.max(1),
            unsaved: 0,
        }
    }

    /// History loaded from storage; loaded attempts count as saved
    pub fn from_attempts(attempts: impl IntoIterator<Item = GenerationAttempt>, cap: usize) -> Self {
        let mut history = Self::new(cap);
        for attempt in attempts {
            history.push(attempt);
        }
        history
    }

    /// Append an attempt, evicting the oldest beyond the cap
    pub fn record(&mut self, attempt: GenerationAttempt) {
        self.push(attempt);
        self.unsaved = (self.unsaved + 1).min(self.attempts.len());
    }

    fn push(&mut self, attempt: GenerationAttempt) {
        if self.attempts.len() == self.cap {
            self.attempts.pop_front();
        }
        self.attempts.push_back(attempt);
    }

    /// Whether any retained attempt failed
    pub fn has_failures(&self) -> bool {
        self.attempts.iter().any(GenerationAttempt::is_failure)
    }

    /// Retained attempts, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &GenerationAttempt> {
        self.attempts.iter()
    }

    /// Number of retained attempts
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Maximum retained attempts
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Attempts recorded since load (or the last call), oldest first
    pub fn take_unsaved(&mut self) -> Vec<GenerationAttempt> {
        let skip = self.attempts.len() - self.unsaved;
        self.unsaved = 0;
        self.attempts.iter().skip(skip).cloned().collect()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureCategory, Tier};

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = AttemptHistory::new(3);
        history.record(GenerationAttempt::failure(Tier::Standard, FailureCategory::Malformed));
        history.record(GenerationAttempt::failure(Tier::Intermediate, FailureCategory::Degenerate));
        history.record(GenerationAttempt::failure(Tier::Premium, FailureCategory::Malformed));
        history.record(GenerationAttempt::success(Tier::Premium));

        assert_eq!(history.len(), 3);
        let tiers: Vec<Tier> = history.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![Tier::Intermediate, Tier::Premium, Tier::Premium]);
        assert!(history.has_failures());
    }

    #[test]
    fn test_loaded_attempts_are_not_unsaved() {
        let loaded = vec![GenerationAttempt::failure(
            Tier::Standard,
            FailureCategory::Transport,
        )];
        let mut history = AttemptHistory::from_attempts(loaded, 10);
        assert!(history.take_unsaved().is_empty());

        history.record(GenerationAttempt::success(Tier::Intermediate));
        let unsaved = history.take_unsaved();
        assert_eq!(unsaved.len(), 1);
        assert_eq!(unsaved[0].tier, Tier::Intermediate);
        assert!(history.take_unsaved().is_empty());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_unsaved_never_exceeds_retained() {
        let mut history = AttemptHistory::new(2);
        for _ in 0..5 {
            history.record(GenerationAttempt::failure(Tier::Standard, FailureCategory::Malformed));
        }
        assert_eq!(history.take_unsaved().len(), 2);
    }

    #[test]
    fn test_empty_history_has_no_failures() {
        let history = AttemptHistory::new(10);
        assert!(history.is_empty());
        assert!(!history.has_failures());
        assert_eq!(history.cap(), 10);
    }
}
