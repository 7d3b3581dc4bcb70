//! Cut candidates: one per (attribute, generalized region) pair.
//!
//! # Overview
//!
//! A candidate is a region of one attribute that could be refined one step:
//! a taxonomy node for categorical attributes, a `[from, to)` interval for
//! numeric ones. It owns the partition leaves it currently covers, a class
//! counter over its region, and, once scored, the class counters of the
//! children a specialization would create.
//!
//! Leaf references go stale whenever *another* attribute's candidate splits
//! a shared partition leaf; [`CandidateCore::refresh_leaves`] lazily swaps
//! split leaves for their current descendants before any pass over records.
//!
//! The numeric side carries the privacy-sensitive part:
//! [`IntervalCandidate::find_split_value`] sweeps the observed values and
//! draws a split point with the exponential mechanism, weighting each gap by
//! its information gain *and* its width, because the final split point is
//! drawn uniformly inside the winning gap rather than at a fixed boundary.

use log::{debug, warn};
use rand::Rng;

use crate::counter::RecordCounter;
use crate::data::{GeneralValue, Record};
use crate::error::CoverError;
use crate::mapper::{IntervalMapper, TaxonomyMapper};
use crate::mech::{choose_weighted, exp_mechanism_weight, information_gain};
use crate::partition::{NodeId, PartitionTree, RowId};
use crate::taxonomy::{TaxoId, TaxonomyIndex};

/// Attempts at drawing a non-degenerate split point before giving up.
const MAX_SPLIT_DRAWS: u32 = 64;

/// Round `value` to `digits` decimal places.
fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Smallest representable interval width at `digits` decimal places.
pub fn smallest_unit(digits: u32) -> f64 {
    10f64.powi(-(digits as i32))
}

// ============================================================================
// CandidateCore
// ============================================================================

/// State shared by both candidate kinds.
#[derive(Debug, Clone)]
pub struct CandidateCore {
    pub attribute: String,
    /// Partition leaves this candidate currently covers (lazily refreshed).
    nodes: Vec<NodeId>,
    /// Class counter over the whole covered region.
    pub counter: RecordCounter,
    /// Information gain of specializing one level; set when promoted.
    pub score: Option<f64>,
    /// Cleared once no further refinement is possible.
    pub splittable: bool,
}

impl CandidateCore {
    fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            nodes: Vec::new(),
            counter: RecordCounter::new(),
            score: None,
            splittable: true,
        }
    }

    fn with_counter(attribute: impl Into<String>, counter: RecordCounter) -> Self {
        Self {
            counter,
            ..Self::new(attribute)
        }
    }

    /// Attach one covered partition leaf, optionally merging its counter.
    pub fn add_node(&mut self, node: NodeId, counter: Option<&RecordCounter>) {
        self.nodes.push(node);
        if let Some(counter) = counter {
            self.counter.add(counter);
        }
    }

    /// Covered leaves, as last refreshed.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Replace any since-split leaf with its current descendant leaves.
    pub fn refresh_leaves(&mut self, tree: &PartitionTree) {
        if self.nodes.iter().all(|&node| tree.is_leaf(node)) {
            return;
        }
        let mut refreshed = Vec::with_capacity(self.nodes.len());
        for &node in &self.nodes {
            if tree.is_leaf(node) {
                refreshed.push(node);
            } else {
                refreshed.extend(tree.leaves_under(node));
            }
        }
        self.nodes = refreshed;
    }

    /// Row ids across the covered leaves. Call [`refresh_leaves`] first.
    fn row_ids<'t>(&'t self, tree: &'t PartitionTree) -> impl Iterator<Item = RowId> + 't {
        self.nodes
            .iter()
            .flat_map(move |&node| tree.rows(node).iter().copied())
    }
}

// ============================================================================
// CategoryCandidate
// ============================================================================

/// Candidate bound to one taxonomy node of a categorical attribute.
#[derive(Debug, Clone)]
pub struct CategoryCandidate {
    pub core: CandidateCore,
    /// The taxonomy node this candidate's region is read as.
    taxo: TaxoId,
    /// Per-child class counters, in taxonomy child order; filled by
    /// [`child_count`](Self::child_count).
    child_counters: Vec<(String, RecordCounter)>,
}

impl CategoryCandidate {
    /// Root candidate of an attribute, covering `node` with `counter`.
    pub fn root(
        attribute: impl Into<String>,
        taxo: TaxoId,
        node: NodeId,
        counter: RecordCounter,
    ) -> Self {
        let mut core = CandidateCore::new(attribute);
        core.add_node(node, None);
        core.counter = counter;
        Self {
            core,
            taxo,
            child_counters: Vec::new(),
        }
    }

    /// The region name this candidate exports.
    pub fn general_value(&self, index: &TaxonomyIndex) -> GeneralValue {
        GeneralValue::Category(index.name(self.taxo).to_string())
    }

    /// True once the per-child counters have been computed.
    pub fn is_counted(&self) -> bool {
        !self.child_counters.is_empty()
    }

    /// Per-child counters for scoring.
    pub fn child_counters(&self) -> impl Iterator<Item = &RecordCounter> {
        self.child_counters.iter().map(|(_, counter)| counter)
    }

    fn category_of<'r>(&self, record: &'r Record) -> Result<&'r str, CoverError> {
        let value = record
            .get(&self.core.attribute)
            .ok_or_else(|| CoverError::MissingAttribute {
                attribute: self.core.attribute.clone(),
            })?;
        value.as_category().ok_or_else(|| CoverError::TypeMismatch {
            attribute: self.core.attribute.clone(),
            expected: "categorical",
            got: value.kind(),
        })
    }

    /// Bucket the covered records by the taxonomy child their value rolls up
    /// under, in one pass.
    ///
    /// The mapper is already one level finer than this candidate's node, so
    /// `generalize` lands exactly on the node's children.
    pub fn child_count(
        &mut self,
        labels: &[String],
        index: &TaxonomyIndex,
        mapper: &TaxonomyMapper,
        tree: &PartitionTree,
        records: &[Record],
    ) -> Result<(), CoverError> {
        debug!(
            "counting children of {}, attribute {}",
            index.name(self.taxo),
            self.core.attribute
        );
        let children = index.children(self.taxo);
        if children.is_empty() {
            self.core.splittable = false;
            return Ok(());
        }
        let mut counters: Vec<(String, RecordCounter)> = children
            .iter()
            .map(|&child| {
                (
                    index.name(child).to_string(),
                    RecordCounter::with_labels(labels),
                )
            })
            .collect();

        self.core.refresh_leaves(tree);
        for row in self.core.row_ids(tree) {
            let record = &records[row as usize];
            let token = self.category_of(record)?;
            let region = mapper.generalize(token)?;
            let slot = counters
                .iter_mut()
                .find(|(name, _)| name == region)
                .ok_or_else(|| CoverError::UnknownCategory {
                    attribute: self.core.attribute.clone(),
                    value: token.to_string(),
                })?;
            slot.1.record(&record.label);
        }
        self.child_counters = counters;
        Ok(())
    }

    /// Score the candidate from its precomputed child counters.
    pub fn calculate_score(&mut self) {
        let gain = information_gain(&self.core.counter, self.child_counters());
        self.core.score = Some(gain);
    }

    /// Commit the specialization: split every covered partition leaf into
    /// one child per taxonomy child, move rows by re-querying the mapper,
    /// then push the finer level into the mapper itself.
    ///
    /// Returns one seeded child candidate per taxonomy child.
    pub fn specialize(
        mut self,
        index: &TaxonomyIndex,
        mapper: &mut TaxonomyMapper,
        tree: &mut PartitionTree,
        records: &[Record],
    ) -> Result<Vec<CategoryCandidate>, CoverError> {
        let children = index.children(self.taxo);
        debug_assert!(!children.is_empty(), "unsplittable candidate chosen");

        let mut child_candidates: Vec<CategoryCandidate> = children
            .iter()
            .zip(self.child_counters.drain(..))
            .map(|(&child, (_, counter))| CategoryCandidate {
                core: CandidateCore::with_counter(self.core.attribute.clone(), counter),
                taxo: child,
                child_counters: Vec::new(),
            })
            .collect();

        self.core.refresh_leaves(tree);
        for &node in self.core.nodes() {
            let slots: Vec<NodeId> = children.iter().map(|_| tree.insert_child(node)).collect();
            for row in tree.take_rows(node) {
                let record = &records[row as usize];
                let token = self.category_of(record)?;
                let region = mapper.generalize(token)?;
                let position = child_candidates
                    .iter()
                    .position(|candidate| index.name(candidate.taxo) == region)
                    .ok_or_else(|| CoverError::UnknownCategory {
                        attribute: self.core.attribute.clone(),
                        value: token.to_string(),
                    })?;
                tree.push_row(slots[position], row);
            }
            for (candidate, &slot) in child_candidates.iter_mut().zip(&slots) {
                candidate.core.add_node(slot, None);
            }
        }

        for &child in children {
            mapper.specialize(index.name(child));
        }
        Ok(child_candidates)
    }
}

// ============================================================================
// IntervalCandidate
// ============================================================================

/// Candidate bound to one `[from, to)` interval of a numeric attribute.
#[derive(Debug, Clone)]
pub struct IntervalCandidate {
    pub core: CandidateCore,
    pub from: f64,
    pub to: f64,
    /// Chosen split point; set by [`find_split_value`](Self::find_split_value).
    split: Option<f64>,
    /// Class counters of the two sides of the chosen split.
    side_counters: Option<(RecordCounter, RecordCounter)>,
}

impl IntervalCandidate {
    /// Root candidate of an attribute, covering `node` with `counter`.
    pub fn root(
        attribute: impl Into<String>,
        from: f64,
        to: f64,
        node: NodeId,
        counter: RecordCounter,
    ) -> Self {
        let mut core = CandidateCore::new(attribute);
        core.add_node(node, None);
        core.counter = counter;
        Self {
            core,
            from,
            to,
            split: None,
            side_counters: None,
        }
    }

    fn seeded(attribute: String, from: f64, to: f64, counter: RecordCounter) -> Self {
        Self {
            core: CandidateCore::with_counter(attribute, counter),
            from,
            to,
            split: None,
            side_counters: None,
        }
    }

    /// The interval this candidate exports.
    pub fn general_value(&self) -> GeneralValue {
        GeneralValue::Interval(self.from, self.to)
    }

    /// True once a split point has been drawn.
    pub fn has_split(&self) -> bool {
        self.split.is_some()
    }

    /// The drawn split point, if any.
    pub fn split_value(&self) -> Option<f64> {
        self.split
    }

    /// Class counters of the two would-be children.
    pub fn side_counters(&self) -> impl Iterator<Item = &RecordCounter> {
        self.side_counters
            .iter()
            .flat_map(|(left, right)| [left, right])
    }

    fn numeric_of(&self, record: &Record) -> Result<f64, CoverError> {
        let value = record
            .get(&self.core.attribute)
            .ok_or_else(|| CoverError::MissingAttribute {
                attribute: self.core.attribute.clone(),
            })?;
        value.as_number().ok_or_else(|| CoverError::TypeMismatch {
            attribute: self.core.attribute.clone(),
            expected: "numeric",
            got: value.kind(),
        })
    }

    /// Group the covered records by exact value, sorted ascending, with
    /// synthetic zero-count buckets at the interval endpoints so the sweep
    /// starts and ends cleanly.
    fn value_buckets(
        &mut self,
        labels: &[String],
        tree: &PartitionTree,
        records: &[Record],
    ) -> Result<Vec<(f64, RecordCounter)>, CoverError> {
        self.core.refresh_leaves(tree);
        let mut pairs: Vec<(f64, &str)> = Vec::new();
        for row in self.core.row_ids(tree) {
            let record = &records[row as usize];
            pairs.push((self.numeric_of(record)?, record.label.as_str()));
        }
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut buckets: Vec<(f64, RecordCounter)> = Vec::new();
        for (value, label) in pairs {
            match buckets.last_mut() {
                Some((last, counter)) if *last == value => counter.record(label),
                _ => {
                    let mut counter = RecordCounter::with_labels(labels);
                    counter.record(label);
                    buckets.push((value, counter));
                }
            }
        }
        if buckets[0].0 > self.from {
            buckets.insert(0, (self.from, RecordCounter::with_labels(labels)));
        }
        buckets.push((self.to, RecordCounter::with_labels(labels)));
        Ok(buckets)
    }

    /// Draw this interval's split point under the exponential mechanism.
    ///
    /// Sweeps the sorted distinct values maintaining running left/right
    /// counters, weights each gap `(a, b)` by
    /// `exp_mechanism(eps, sensitivity, gain) * (b - a)`, draws one gap,
    /// then draws the split point uniformly inside it, rounded to `digits`
    /// decimals and redrawn while it collapses onto either gap boundary.
    pub fn find_split_value<R: Rng + ?Sized>(
        &mut self,
        labels: &[String],
        sensitivity: f64,
        eps: f64,
        digits: u32,
        tree: &PartitionTree,
        records: &[Record],
        rng: &mut R,
    ) -> Result<(), CoverError> {
        debug!(
            "finding split value of [{},{}), attribute {}",
            self.from, self.to, self.core.attribute
        );
        let unit = smallest_unit(digits);
        if self.to - self.from <= unit {
            self.core.splittable = false;
            return Ok(());
        }
        let buckets = self.value_buckets(labels, tree, records)?;
        if buckets.is_empty() {
            self.core.splittable = false;
            return Ok(());
        }

        let mut left = RecordCounter::with_labels(labels);
        let mut right = RecordCounter::with_labels(labels);
        for (_, counter) in &buckets {
            right.add(counter);
        }

        let mut intervals: Vec<(f64, f64)> = Vec::with_capacity(buckets.len() - 1);
        let mut weights: Vec<f64> = Vec::with_capacity(buckets.len() - 1);
        for window in buckets.windows(2) {
            let (prev_value, prev_counter) = &window[0];
            let (value, _) = &window[1];
            left.add(prev_counter);
            right.subtract(prev_counter);
            let gain = information_gain(&self.core.counter, [&left, &right]);
            let weight = exp_mechanism_weight(eps, sensitivity, gain) * (value - prev_value);
            intervals.push((*prev_value, *value));
            weights.push(weight);
        }
        debug!(
            "attribute {}: {} splitting intervals over [{},{})",
            self.core.attribute,
            intervals.len(),
            self.from,
            self.to
        );

        // The terminal gap touches the exclusive upper bound; drawing inside
        // it when it cannot fit a rounded point would never terminate.
        if let (Some(weight), Some(&(a, b))) = (weights.last_mut(), intervals.last()) {
            if b - a <= unit {
                *weight = 0.0;
            }
        }

        let chosen = match choose_weighted(rng, &weights) {
            Some(idx) => intervals[idx],
            None => {
                self.core.splittable = false;
                return Ok(());
            }
        };

        let mut split = None;
        for _ in 0..MAX_SPLIT_DRAWS {
            let draw = round_to(rng.gen_range(chosen.0..chosen.1), digits);
            if draw > chosen.0 && draw < chosen.1 && draw != self.to {
                split = Some(draw);
                break;
            }
        }
        let split = match split {
            Some(value) => value,
            None => {
                // Only reachable when the gap is at the minimum width and
                // every rounded draw collapses onto a boundary.
                warn!(
                    "attribute {}: no usable split point in ({},{}), retiring candidate",
                    self.core.attribute, chosen.0, chosen.1
                );
                self.core.splittable = false;
                return Ok(());
            }
        };
        debug!("attribute {}: split value {}", self.core.attribute, split);

        let mut left = RecordCounter::with_labels(labels);
        let mut right = RecordCounter::with_labels(labels);
        for (value, counter) in &buckets {
            if *value < split {
                left.add(counter);
            } else {
                right.add(counter);
            }
        }
        self.split = Some(split);
        self.side_counters = Some((left, right));
        Ok(())
    }

    /// Score the candidate from the counters of its chosen split.
    pub fn calculate_score(&mut self) {
        let gain = information_gain(&self.core.counter, self.side_counters());
        self.core.score = Some(gain);
    }

    /// Commit the specialization: split every covered partition leaf in two
    /// around the drawn split point, then register the boundary with the
    /// attribute's interval mapper.
    pub fn specialize(
        mut self,
        mapper: &mut IntervalMapper,
        tree: &mut PartitionTree,
        records: &[Record],
    ) -> Result<Vec<IntervalCandidate>, CoverError> {
        let split = self
            .split
            .expect("interval candidate specialized without a split value");
        let (left_counter, right_counter) = self
            .side_counters
            .take()
            .expect("split value set without side counters");

        let mut left_candidate = IntervalCandidate::seeded(
            self.core.attribute.clone(),
            self.from,
            split,
            left_counter,
        );
        let mut right_candidate =
            IntervalCandidate::seeded(self.core.attribute.clone(), split, self.to, right_counter);

        self.core.refresh_leaves(tree);
        for &node in self.core.nodes() {
            let left_node = tree.insert_child(node);
            let right_node = tree.insert_child(node);
            for row in tree.take_rows(node) {
                let value = self.numeric_of(&records[row as usize])?;
                let target = if value < split { left_node } else { right_node };
                tree.push_row(target, row);
            }
            left_candidate.core.add_node(left_node, None);
            right_candidate.core.add_node(right_node, None);
        }

        mapper.specialize(split);
        Ok(vec![left_candidate, right_candidate])
    }
}

// ============================================================================
// CutCandidate
// ============================================================================

/// A scored, selectable refinement of one attribute.
#[derive(Debug, Clone)]
pub enum CutCandidate {
    Category(CategoryCandidate),
    Interval(IntervalCandidate),
}

impl CutCandidate {
    pub fn core(&self) -> &CandidateCore {
        match self {
            CutCandidate::Category(candidate) => &candidate.core,
            CutCandidate::Interval(candidate) => &candidate.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut CandidateCore {
        match self {
            CutCandidate::Category(candidate) => &mut candidate.core,
            CutCandidate::Interval(candidate) => &mut candidate.core,
        }
    }

    /// The generalized value this candidate's region exports.
    pub fn general_value(&self, index: Option<&TaxonomyIndex>) -> GeneralValue {
        match self {
            CutCandidate::Category(candidate) => candidate
                .general_value(index.expect("categorical candidates need their taxonomy index")),
            CutCandidate::Interval(candidate) => candidate.general_value(),
        }
    }

    /// Write this candidate's generalized value onto every covered leaf.
    pub fn transfer_value(&mut self, index: Option<&TaxonomyIndex>, tree: &mut PartitionTree) {
        let value = self.general_value(index);
        self.core_mut().refresh_leaves(tree);
        let attribute = self.core().attribute.clone();
        for &node in self.core().nodes() {
            tree.set_represent(node, &attribute, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::build_mappers;
    use crate::taxonomy::{AttributeDomain, DomainSpec, TaxonomyNode};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn region_spec() -> DomainSpec {
        DomainSpec::from([(
            "region".to_string(),
            AttributeDomain::Categorical {
                root: TaxonomyNode::branch(
                    "Region",
                    vec![
                        TaxonomyNode::branch(
                            "US",
                            vec![TaxonomyNode::leaf("CA"), TaxonomyNode::leaf("NY")],
                        ),
                        TaxonomyNode::leaf("EU"),
                    ],
                ),
            },
        )])
    }

    fn region_records() -> Vec<Record> {
        vec![
            Record::new([("region", "CA")], "A"),
            Record::new([("region", "CA")], "A"),
            Record::new([("region", "NY")], "B"),
            Record::new([("region", "NY")], "B"),
        ]
    }

    #[test]
    fn child_count_conserves_the_parent_total() {
        let spec = region_spec();
        let (mappers, indexes) = build_mappers(&spec);
        let records = region_records();
        let tree = PartitionTree::new(4);

        let mut counter = RecordCounter::with_labels(&labels());
        for record in &records {
            counter.record(&record.label);
        }
        let total = counter.total();
        let mut candidate = CategoryCandidate::root(
            "region",
            crate::taxonomy::TaxonomyIndex::ROOT,
            PartitionTree::ROOT,
            counter,
        );
        candidate
            .child_count(
                &labels(),
                &indexes["region"],
                mappers.taxonomy("region").unwrap(),
                &tree,
                &records,
            )
            .unwrap();

        let child_total: u64 = candidate.child_counters().map(|c| c.total()).sum();
        assert_eq!(child_total, total);
    }

    #[test]
    fn specializing_region_splits_classes_cleanly() {
        // Region{US,EU} -> US{CA,NY}; 2 CA records of class A and 2 NY
        // records of class B. One step on `region` must produce children
        // counting {A:2,B:0} / {A:0,B:2} for CA/NY, and drain the parent.
        let spec = region_spec();
        let (mut mappers, indexes) = build_mappers(&spec);
        let records = region_records();
        let mut tree = PartitionTree::new(4);
        let index = &indexes["region"];

        let mut counter = RecordCounter::with_labels(&labels());
        for record in &records {
            counter.record(&record.label);
        }
        let mut root = CategoryCandidate::root(
            "region",
            crate::taxonomy::TaxonomyIndex::ROOT,
            PartitionTree::ROOT,
            counter,
        );
        root.child_count(
            &labels(),
            index,
            mappers.taxonomy("region").unwrap(),
            &tree,
            &records,
        )
        .unwrap();
        let children = root
            .specialize(
                index,
                mappers.taxonomy_mut("region").unwrap(),
                &mut tree,
                &records,
            )
            .unwrap();

        assert!(tree.rows(PartitionTree::ROOT).is_empty());
        assert_eq!(children.len(), 2);

        // US child carries all four records; a second step on it separates
        // the classes.
        let us = children
            .into_iter()
            .find(|c| matches!(c.general_value(index), GeneralValue::Category(ref n) if n == "US"))
            .unwrap();
        assert_eq!(us.core.counter.total(), 4);

        let mut us = us;
        us.child_count(
            &labels(),
            index,
            mappers.taxonomy("region").unwrap(),
            &tree,
            &records,
        )
        .unwrap();
        let grandchildren = us
            .specialize(
                index,
                mappers.taxonomy_mut("region").unwrap(),
                &mut tree,
                &records,
            )
            .unwrap();

        let by_name: Vec<(String, u64, u64)> = grandchildren
            .iter()
            .map(|c| {
                let name = match c.general_value(index) {
                    GeneralValue::Category(name) => name,
                    other => panic!("unexpected value {:?}", other),
                };
                (name, c.core.counter.count("A"), c.core.counter.count("B"))
            })
            .collect();
        assert!(by_name.contains(&("CA".to_string(), 2, 0)));
        assert!(by_name.contains(&("NY".to_string(), 0, 2)));

        // Every row still lives in exactly one leaf.
        let total_rows: usize = tree
            .leaves_under(PartitionTree::ROOT)
            .iter()
            .map(|&leaf| tree.rows(leaf).len())
            .sum();
        assert_eq!(total_rows, 4);
    }

    #[test]
    fn find_split_value_picks_the_informative_gap() {
        // Domain [0,10) with values {2: 5xA, 8: 5xB} and DIGIT=0: the only
        // informative gap is (2,8), so a strongly-peaked mechanism must land
        // the split strictly inside it.
        let records: Vec<Record> = (0..5)
            .map(|_| Record::new([("x", 2.0)], "A"))
            .chain((0..5).map(|_| Record::new([("x", 8.0)], "B")))
            .collect();
        let tree = PartitionTree::new(10);
        let mut counter = RecordCounter::with_labels(&labels());
        for record in &records {
            counter.record(&record.label);
        }
        let mut candidate =
            IntervalCandidate::root("x", 0.0, 10.0, PartitionTree::ROOT, counter);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
        candidate
            .find_split_value(&labels(), 1.0, 100.0, 0, &tree, &records, &mut rng)
            .unwrap();

        let split = candidate.split_value().expect("split must be found");
        assert!(split > 2.0 && split < 8.0, "split {} outside (2,8)", split);
        assert_eq!(split, split.round(), "split must respect DIGIT=0");

        // Left/right counters partition the parent exactly.
        let totals: Vec<u64> = candidate.side_counters().map(|c| c.total()).collect();
        assert_eq!(totals.iter().sum::<u64>(), 10);
        assert_eq!(totals, vec![5, 5]);
    }

    #[test]
    fn interval_specialize_conserves_rows_and_registers_the_boundary() {
        let records: Vec<Record> = (0..5)
            .map(|_| Record::new([("x", 2.0)], "A"))
            .chain((0..5).map(|_| Record::new([("x", 8.0)], "B")))
            .collect();
        let mut tree = PartitionTree::new(10);
        let mut counter = RecordCounter::with_labels(&labels());
        for record in &records {
            counter.record(&record.label);
        }
        let mut candidate =
            IntervalCandidate::root("x", 0.0, 10.0, PartitionTree::ROOT, counter);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        candidate
            .find_split_value(&labels(), 1.0, 100.0, 0, &tree, &records, &mut rng)
            .unwrap();
        let split = candidate.split_value().unwrap();

        let mut mapper = IntervalMapper::new("x", 0.0, 10.0);
        let children = candidate
            .specialize(&mut mapper, &mut tree, &records)
            .unwrap();

        assert_eq!(children.len(), 2);
        let left_total = children[0].core.counter.total();
        let right_total = children[1].core.counter.total();
        assert_eq!(left_total + right_total, 10);
        assert_eq!(mapper.bounds(), &[0.0, split, 10.0]);

        let total_rows: usize = tree
            .leaves_under(PartitionTree::ROOT)
            .iter()
            .map(|&leaf| tree.rows(leaf).len())
            .sum();
        assert_eq!(total_rows, 10);
    }

    #[test]
    fn narrow_intervals_are_unsplittable() {
        let records = vec![Record::new([("x", 3.0)], "A"), Record::new([("x", 3.5)], "B")];
        let tree = PartitionTree::new(2);
        let mut counter = RecordCounter::with_labels(&labels());
        for record in &records {
            counter.record(&record.label);
        }
        let mut candidate =
            IntervalCandidate::root("x", 3.0, 4.0, PartitionTree::ROOT, counter);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        candidate
            .find_split_value(&labels(), 1.0, 1.0, 0, &tree, &records, &mut rng)
            .unwrap();

        assert!(!candidate.core.splittable);
        assert!(candidate.split_value().is_none());
    }

    #[test]
    fn empty_regions_are_unsplittable() {
        let records: Vec<Record> = Vec::new();
        let tree = PartitionTree::new(0);
        let mut candidate = IntervalCandidate::root(
            "x",
            0.0,
            10.0,
            PartitionTree::ROOT,
            RecordCounter::with_labels(&labels()),
        );
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        candidate
            .find_split_value(&labels(), 1.0, 1.0, 0, &tree, &records, &mut rng)
            .unwrap();
        assert!(!candidate.core.splittable);
    }

    #[test]
    fn taxonomy_leaf_candidates_are_unsplittable() {
        let spec = region_spec();
        let (mappers, indexes) = build_mappers(&spec);
        let index = &indexes["region"];
        let eu = *index
            .children(crate::taxonomy::TaxonomyIndex::ROOT)
            .iter()
            .find(|&&id| index.name(id) == "EU")
            .unwrap();

        let mut candidate = CategoryCandidate::root(
            "region",
            eu,
            PartitionTree::ROOT,
            RecordCounter::with_labels(&labels()),
        );
        candidate
            .child_count(
                &labels(),
                index,
                mappers.taxonomy("region").unwrap(),
                &PartitionTree::new(0),
                &[],
            )
            .unwrap();
        assert!(!candidate.core.splittable);
    }
}
