//! The partition tree over dataset rows.
//!
//! # Overview
//!
//! Nodes live in an arena addressed by [`NodeId`]; there are no parent
//! back-pointers and no recursion. Leaves own row indices into the caller's
//! record slice: splitting a leaf drains its row list into freshly inserted
//! children, so every row belongs to exactly one leaf at all times and
//! records themselves are never cloned.
//!
//! Each node also carries a `represent` map of attribute to the generalized
//! value chosen for it so far; children inherit it at insertion and the
//! final transfer pass completes it on every surviving leaf.

use std::collections::BTreeMap;

use rand::Rng;

use crate::counter::RecordCounter;
use crate::data::{GeneralValue, Record};
use crate::mech::laplace;

/// Arena id of a partition node.
pub type NodeId = u32;

/// Index of a record in the caller's record slice.
pub type RowId = u32;

#[derive(Debug, Clone, Default)]
struct PartitionNode {
    children: Vec<NodeId>,
    rows: Vec<RowId>,
    represent: BTreeMap<String, GeneralValue>,
    /// Cached class statistic; dropped whenever the row list changes.
    counter: Option<RecordCounter>,
}

/// Arena-backed partition tree.
#[derive(Debug, Clone)]
pub struct PartitionTree {
    nodes: Vec<PartitionNode>,
}

impl PartitionTree {
    /// Id of the root node.
    pub const ROOT: NodeId = 0;

    /// Tree whose root leaf holds rows `0..num_rows`.
    pub fn new(num_rows: u32) -> Self {
        Self {
            nodes: vec![PartitionNode {
                rows: (0..num_rows).collect(),
                ..Default::default()
            }],
        }
    }

    /// Number of nodes ever created, split parents included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// True when the node currently has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id as usize].children.is_empty()
    }

    /// Insert a fresh child under `parent`, inheriting its representative
    /// values. Returns the child's id.
    pub fn insert_child(&mut self, parent: NodeId) -> NodeId {
        let child = PartitionNode {
            represent: self.nodes[parent as usize].represent.clone(),
            ..Default::default()
        };
        let id = self.nodes.len() as NodeId;
        self.nodes.push(child);
        self.nodes[parent as usize].children.push(id);
        id
    }

    /// Rows currently held by a node (empty for internal nodes).
    pub fn rows(&self, id: NodeId) -> &[RowId] {
        &self.nodes[id as usize].rows
    }

    /// Move one row into a leaf.
    pub fn push_row(&mut self, id: NodeId, row: RowId) {
        let node = &mut self.nodes[id as usize];
        node.counter = None;
        node.rows.push(row);
    }

    /// Drain a split node: rows move out to the caller, the representative
    /// map and cached statistic are cleared (children own them now).
    pub fn take_rows(&mut self, id: NodeId) -> Vec<RowId> {
        let node = &mut self.nodes[id as usize];
        node.represent.clear();
        node.counter = None;
        std::mem::take(&mut node.rows)
    }

    /// Record one attribute's generalized value on a node.
    pub fn set_represent(&mut self, id: NodeId, attribute: &str, value: GeneralValue) {
        self.nodes[id as usize]
            .represent
            .insert(attribute.to_string(), value);
    }

    /// Representative attribute values of a node.
    pub fn represent(&self, id: NodeId) -> &BTreeMap<String, GeneralValue> {
        &self.nodes[id as usize].represent
    }

    /// All leaves under `id` in depth-first order, via an explicit stack.
    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let children = &self.nodes[current as usize].children;
            if children.is_empty() {
                leaves.push(current);
            } else {
                stack.extend(children.iter().rev().copied());
            }
        }
        leaves
    }

    /// Class statistic of a leaf, computed once and cached.
    pub fn statistic(
        &mut self,
        id: NodeId,
        records: &[Record],
        labels: &[String],
    ) -> &RecordCounter {
        let needs_scan = self.nodes[id as usize].counter.is_none();
        if needs_scan {
            let mut counter = RecordCounter::with_labels(labels);
            for &row in &self.nodes[id as usize].rows {
                counter.record(&records[row as usize].label);
            }
            self.nodes[id as usize].counter = Some(counter);
        }
        self.nodes[id as usize]
            .counter
            .as_ref()
            .expect("statistic cached above")
    }

    /// Fraction of leaves under `id` whose majority label flips when the
    /// class counts are perturbed with Laplace noise at scale `1/eps`.
    ///
    /// This simulates the release post-processing (clamp at zero, round to
    /// integer) without releasing anything.
    pub fn predict_noise_impact<R: Rng + ?Sized>(
        &mut self,
        id: NodeId,
        records: &[Record],
        labels: &[String],
        eps: f64,
        rng: &mut R,
    ) -> f64 {
        let leaves = self.leaves_under(id);
        if leaves.is_empty() {
            return 0.0;
        }
        let mut flipped = 0usize;
        for leaf in &leaves {
            let counter = self.statistic(*leaf, records, labels).clone();
            let top = match counter.most_frequent_label() {
                Some(label) => label.to_string(),
                None => continue,
            };
            let mut top_noisy = 0.0;
            let mut max_noisy = 0.0;
            for (label, count) in counter.iter() {
                let noisy = (count as f64 + laplace(rng, 1.0 / eps)).max(0.0).round();
                if label == top {
                    top_noisy = noisy;
                }
                if noisy > max_noisy {
                    max_noisy = noisy;
                }
            }
            if top_noisy < max_noisy {
                flipped += 1;
            }
        }
        flipped as f64 / leaves.len() as f64
    }
}
