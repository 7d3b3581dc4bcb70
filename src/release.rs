//! The noisy release: per-leaf class counts under Laplace noise.
//!
//! For every leaf of the final partition tree, the class counts are
//! perturbed with independent Laplace(0, 1/eps) noise, clamped at zero and
//! rounded to integers. One output record is emitted per leaf, carrying its
//! representative attribute values and one noised count per class; leaves
//! whose counts all net to zero are suppressed entirely.

use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::counter::RecordCounter;
use crate::data::{GeneralValue, Record};
use crate::mech::laplace;
use crate::partition::PartitionTree;

/// Noise draws sampled into the debug log per release.
const LOGGED_NOISE_DRAWS: usize = 5;

/// One anonymized output row: a generalized attribute combination plus the
/// noised number of records of each class observed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasedRecord {
    /// Attribute name to generalized value.
    pub values: BTreeMap<String, GeneralValue>,
    /// Class label to noised count.
    pub class_counts: BTreeMap<String, u64>,
}

/// Noise one counter into per-class released counts.
///
/// Returns the counts and whether anything survived (all-zero rows are
/// suppressed by the callers).
pub fn noisy_counts<R: Rng + ?Sized>(
    counter: &RecordCounter,
    eps: f64,
    rng: &mut R,
    noise_sample: &mut Vec<f64>,
) -> (BTreeMap<String, u64>, bool) {
    let mut counts = BTreeMap::new();
    let mut any_nonzero = false;
    for (label, count) in counter.iter() {
        let noise = laplace(rng, 1.0 / eps);
        if noise_sample.len() < LOGGED_NOISE_DRAWS {
            noise_sample.push(noise);
        }
        let noised = (count as f64 + noise).max(0.0).round() as u64;
        if noised != 0 {
            any_nonzero = true;
        }
        counts.insert(label.to_string(), noised);
    }
    (counts, any_nonzero)
}

/// Release every leaf of the partition tree.
pub fn export_tree<R: Rng + ?Sized>(
    tree: &mut PartitionTree,
    records: &[Record],
    labels: &[String],
    eps: f64,
    rng: &mut R,
) -> Vec<ReleasedRecord> {
    let mut released = Vec::new();
    let mut noise_sample = Vec::new();
    for leaf in tree.leaves_under(PartitionTree::ROOT) {
        let counter = tree.statistic(leaf, records, labels).clone();
        let (class_counts, any_nonzero) = noisy_counts(&counter, eps, rng, &mut noise_sample);
        if !any_nonzero {
            continue;
        }
        released.push(ReleasedRecord {
            values: tree.represent(leaf).clone(),
            class_counts,
        });
    }
    debug!("first release noise draws: {:?}", noise_sample);
    released
}
