//! Escalation statistics and cost estimate
//!
//! Counters are plain atomics so the strategy can update them through a
//! shared reference. Figures are advisory: they feed reports, never control
//! flow.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::TierConfig;
use crate::types::Tier;

const TIERS: usize = Tier::ALL.len();

/// Live counters for one escalation strategy
#[derive(Debug)]
pub struct EscalationStats {
    escalations: AtomicU64,
    successful_escalations: AtomicU64,
    calls: [AtomicU64; TIERS],
    successes: [AtomicU64; TIERS],
    weights: [f64; TIERS],
}

/// Point-in-time copy of [`EscalationStats`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Moves to a higher tier within one item
    pub escalations: u64,
    /// Items that succeeded after at least one escalation
    pub successful_escalations: u64,
    /// Calls per tier, cheapest first
    pub calls: [u64; TIERS],
    /// Successes per tier, cheapest first
    pub successes: [u64; TIERS],
    /// Weighted cost of all calls made
    pub estimated_cost: f64,
    /// Weighted cost had every success used the premium tier directly
    pub premium_baseline_cost: f64,
    /// Savings against the premium baseline, in percent (may be negative)
    pub savings_percent: f64,
}

impl EscalationStats {
    /// Counters with explicit per-tier weights
    pub fn new(weights: [f64; TIERS]) -> Self {
        Self {
            escalations: AtomicU64::new(0),
            successful_escalations: AtomicU64::new(0),
            calls: Default::default(),
            successes: Default::default(),
            weights,
        }
    }

    /// Weights taken from the tier table, 1/3/10 for tiers it omits
    pub fn from_tiers(tiers: &[TierConfig]) -> Self {
        let mut weights = [1.0, 3.0, 10.0];
        for tier in tiers {
            weights[tier.tier.index()] = tier.cost_weight;
        }
        Self::new(weights)
    }

    pub(crate) fn record_call(&self, tier: Tier) {
        self.calls[tier.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self, tier: Tier, escalated: bool) {
        self.successes[tier.index()].fetch_add(1, Ordering::Relaxed);
        if escalated {
            self.successful_escalations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters and derive the cost estimate
    pub fn snapshot(&self) -> StatsSnapshot {
        let calls: [u64; TIERS] = std::array::from_fn(|i| self.calls[i].load(Ordering::Relaxed));
        let successes: [u64; TIERS] =
            std::array::from_fn(|i| self.successes[i].load(Ordering::Relaxed));

        let estimated_cost: f64 = calls
            .iter()
            .zip(self.weights)
            .map(|(&n, w)| n as f64 * w)
            .sum();
        let premium_weight = self.weights[Tier::Premium.index()];
        let premium_baseline_cost = successes.iter().sum::<u64>() as f64 * premium_weight;
        let savings_percent = if premium_baseline_cost > 0.0 {
            (premium_baseline_cost - estimated_cost) / premium_baseline_cost * 100.0
        } else {
            0.0
        };

        StatsSnapshot {
            escalations: self.escalations.load(Ordering::Relaxed),
            successful_escalations: self.successful_escalations.load(Ordering::Relaxed),
            calls,
            successes,
            estimated_cost,
            premium_baseline_cost,
            savings_percent,
        }
    }
}

impl Default for EscalationStats {
    fn default() -> Self {
        Self::new([1.0, 3.0, 10.0])
    }
}
