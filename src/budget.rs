//! Privacy-budget planning and accounting.
//!
//! # Overview
//!
//! A run gets one total epsilon. Half of it (fixed mode) or a configured
//! fraction (adaptive mode) is reserved for the final noisy release; the
//! rest is divided into equal per-query units covering the initial numeric
//! split scans, the per-step selection and re-scoring queries, and, in
//! adaptive mode, the periodic stop probes.
//!
//! [`BudgetPlanner`] tracks actual spend additively. Spending past the
//! allocated total is a logic defect, not an input condition: `charge`
//! panics rather than returning an error.

use log::debug;

/// Adaptive mode: fraction of the total budget spent on the private
/// dataset-size estimate that seeds the step ceiling.
pub const SEED_SHARE: f64 = 0.05;

/// Adaptive mode: fraction of the post-seed budget reserved for the final
/// noisy release.
pub const RELEASE_SPLIT: f64 = 0.5;

/// Adaptive mode: steps between early-stop probes.
pub const PROBE_JUMP: u32 = 4;

/// Adaptive mode: hard ceiling on the derived step count.
pub const MAX_AUTO_STEPS: u32 = 16;

/// Tolerance absorbing float drift in repeated budget additions.
const SPEND_TOLERANCE: f64 = 1e-9;

// ============================================================================
// BudgetPlanner
// ============================================================================

/// Additive spend tracking against one allocated total.
#[derive(Debug, Clone)]
pub struct BudgetPlanner {
    total: f64,
    spent: f64,
}

impl BudgetPlanner {
    pub fn new(total: f64) -> Self {
        Self { total, spent: 0.0 }
    }

    /// Record one query's spend.
    ///
    /// # Panics
    ///
    /// Panics when cumulative spend exceeds the allocated total: an
    /// accounting overrun can only come from a planning bug and must never
    /// be swallowed.
    pub fn charge(&mut self, amount: f64) {
        self.spent += amount;
        assert!(
            self.spent <= self.total + SPEND_TOLERANCE,
            "privacy budget overrun: spent {} of allocated {}",
            self.spent,
            self.total
        );
    }

    /// Cumulative spend so far.
    pub fn spent(&self) -> f64 {
        self.spent
    }

    /// Unspent remainder.
    pub fn remaining(&self) -> f64 {
        (self.total - self.spent).max(0.0)
    }
}

// ============================================================================
// Plans
// ============================================================================

/// Budget layout of one specialization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetPlan {
    /// Spent up front on the private size estimate (adaptive only).
    pub seed: f64,
    /// Epsilon of each count query (scans, selection, re-scoring, probes).
    pub per_query: f64,
    /// Reserved for the final noisy release.
    pub release: f64,
    /// Upper bound on specialization steps.
    pub steps: u32,
    /// Steps between early-stop probes; zero disables probing.
    pub probe_every: u32,
}

/// Fixed-step layout: half the budget is released, the other half divided
/// across `numeric_attributes` initial scans plus two units per step.
pub fn fixed_plan(total: f64, steps: u32, numeric_attributes: u32) -> BudgetPlan {
    let queries = numeric_attributes + 2 * steps;
    let per_query = if queries > 0 {
        total / 2.0 / queries as f64
    } else {
        0.0
    };
    debug!("fixed plan: eps' = {} over {} queries", per_query, queries);
    BudgetPlan {
        seed: 0.0,
        per_query,
        release: total / 2.0,
        steps,
        probe_every: 0,
    }
}

/// Adaptive layout derived from a noisy dataset-size estimate.
///
/// The step ceiling grows logarithmically with the noisy size and the
/// working budget: past that depth, release noise at scale `1/eps` drowns
/// the per-leaf counts anyway.
pub fn adaptive_plan(total: f64, noisy_size: f64, numeric_attributes: u32) -> BudgetPlan {
    let seed = SEED_SHARE * total;
    let remaining = total - seed;
    let release = remaining * RELEASE_SPLIT;

    let depth = (noisy_size * remaining * RELEASE_SPLIT / (2.0 * 2f64.sqrt()))
        .log2()
        .floor();
    let steps = if depth.is_finite() && depth > 0.0 {
        (depth as u32).min(MAX_AUTO_STEPS)
    } else {
        0
    };

    let probes = steps / PROBE_JUMP;
    let queries = numeric_attributes + 2 * steps + probes;
    let per_query = if queries > 0 {
        (remaining - release) / queries as f64
    } else {
        0.0
    };
    debug!(
        "adaptive plan: {} steps, eps' = {} over {} queries, release {}",
        steps, per_query, queries, release
    );
    BudgetPlan {
        seed,
        per_query,
        release,
        steps,
        probe_every: PROBE_JUMP,
    }
}
