//! Scoring functions and randomized release mechanisms.
//!
//! # Overview
//!
//! Everything probabilistic in the engine funnels through this module:
//!
//! - [`entropy`] / [`information_gain`]: the utility function competing cut
//!   candidates are scored with
//! - [`exp_mechanism_weight`]: weight of one alternative under the
//!   exponential mechanism, `exp(eps / (2 * sensitivity) * score)`
//! - [`laplace`]: additive noise for count release
//! - [`choose_weighted`]: the weighted draw both selection paths share
//!
//! All draws go through a caller-supplied [`rand::Rng`] so runs are
//! reproducible under a seeded generator.

use rand::Rng;

use crate::counter::RecordCounter;

/// Shannon entropy over the label proportions of `counter`, in bits.
///
/// Uses the `0 * log2(0) = 0` convention; an empty counter has entropy zero.
pub fn entropy(counter: &RecordCounter) -> f64 {
    if counter.total() == 0 {
        return 0.0;
    }
    let total = counter.total() as f64;
    let mut result = 0.0;
    for (_, count) in counter.iter() {
        if count == 0 {
            continue;
        }
        let prop = count as f64 / total;
        result -= prop * prop.log2();
    }
    result
}

/// Information gain of splitting `parent` into `children`.
///
/// `entropy(parent) - sum(child_total / parent_total * entropy(child))`.
/// Empty children contribute nothing; an empty parent gains nothing.
pub fn information_gain<'a, I>(parent: &RecordCounter, children: I) -> f64
where
    I: IntoIterator<Item = &'a RecordCounter>,
{
    if parent.total() == 0 {
        return 0.0;
    }
    let parent_total = parent.total() as f64;
    let mut result = entropy(parent);
    for child in children {
        if child.total() == 0 {
            continue;
        }
        result -= child.total() as f64 / parent_total * entropy(child);
    }
    result
}

/// Exponential-mechanism weight of one alternative.
///
/// `sensitivity` is the largest change one record can induce in `score`;
/// it must be nonzero or the mechanism degenerates.
pub fn exp_mechanism_weight(eps: f64, sensitivity: f64, score: f64) -> f64 {
    assert!(
        sensitivity != 0.0,
        "exponential mechanism requires nonzero sensitivity"
    );
    (eps / (2.0 * sensitivity) * score).exp()
}

/// One draw from Laplace(0, `scale`) via inverse CDF.
pub fn laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    let u: f64 = rng.gen::<f64>() - 0.5;
    // Clamp the log argument away from zero so u == -0.5 cannot produce inf.
    let magnitude = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln();
    -scale * u.signum() * magnitude
}

/// Weighted random choice over `weights`; returns the chosen index.
///
/// Returns `None` when the slice is empty or no weight is positive. Infinite
/// weights (overflowing exponential-mechanism scores) win outright.
pub fn choose_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total.is_infinite() {
        return weights.iter().position(|w| w.is_infinite());
    }
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }
    let mut target = rng.gen::<f64>() * total;
    for (idx, &weight) in weights.iter().enumerate() {
        if weight <= 0.0 {
            continue;
        }
        if target < weight {
            return Some(idx);
        }
        target -= weight;
    }
    // Rounding drift fell off the end of the cumulative sum.
    weights.iter().rposition(|&w| w > 0.0)
}
