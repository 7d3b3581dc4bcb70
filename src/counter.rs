//! Per-class record counting.
//!
//! [`RecordCounter`] is the leaf utility of the whole engine: every candidate
//! region, every partition leaf and every split sweep tallies class labels
//! through it. Class universes are tiny (a handful of labels), so the layout
//! is a pair of parallel vectors in first-seen order; linear probes beat
//! hashing at this size and keep tie-breaking deterministic.

use log::warn;

/// Multiset of class label to count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCounter {
    labels: Vec<String>,
    counts: Vec<u64>,
    total: u64,
    fixed_universe: bool,
}

impl RecordCounter {
    /// Counter with an open label universe: labels are added as first seen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter over a fixed label universe, all counts zero.
    ///
    /// Recording a label outside the universe still counts it, but logs a
    /// consistency warning: it means the data diverges from the universe the
    /// caller scanned up front.
    pub fn with_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            counts: vec![0; labels.len()],
            total: 0,
            fixed_universe: true,
        }
    }

    /// Count one occurrence of `label`.
    pub fn record(&mut self, label: &str) {
        self.total += 1;
        match self.position(label) {
            Some(idx) => self.counts[idx] += 1,
            None => {
                if self.fixed_universe {
                    warn!("class label {:?} not present in the scanned universe", label);
                }
                self.labels.push(label.to_string());
                self.counts.push(1);
            }
        }
    }

    /// Count for one label (zero when never seen).
    pub fn count(&self, label: &str) -> u64 {
        self.position(label).map_or(0, |idx| self.counts[idx])
    }

    /// Total number of recorded occurrences.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Labels in first-seen order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `(label, count)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }

    /// Elementwise addition over the label universe, including the total.
    pub fn add(&mut self, other: &RecordCounter) {
        self.total += other.total;
        for (label, count) in other.iter() {
            match self.position(label) {
                Some(idx) => self.counts[idx] += count,
                None => {
                    self.labels.push(label.to_string());
                    self.counts.push(count);
                }
            }
        }
    }

    /// Elementwise subtraction, including the total.
    ///
    /// Used to maintain a running right-of-cursor counter as a sweep
    /// advances. Subtracting below zero is a caller bug and panics.
    pub fn subtract(&mut self, other: &RecordCounter) {
        self.total = self
            .total
            .checked_sub(other.total)
            .unwrap_or_else(|| panic!("counter total underflow: {} - {}", self.total, other.total));
        for (label, count) in other.iter() {
            if count == 0 {
                continue;
            }
            let idx = self
                .position(label)
                .unwrap_or_else(|| panic!("subtracting label {:?} never recorded here", label));
            self.counts[idx] = self.counts[idx]
                .checked_sub(count)
                .unwrap_or_else(|| panic!("counter underflow for label {:?}", label));
        }
    }

    /// Label with the largest count; ties break to the earliest-seen label.
    pub fn most_frequent_label(&self) -> Option<&str> {
        let mut best: Option<(usize, u64)> = None;
        for (idx, &count) in self.counts.iter().enumerate() {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((idx, count)),
            }
        }
        best.map(|(idx, _)| self.labels[idx].as_str())
    }

    /// Count of the most frequent label (zero when empty).
    pub fn max_frequency(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}
