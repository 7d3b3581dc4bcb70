//! The global pool of cut candidates and the specialization state machine.
//!
//! # Overview
//!
//! Candidates move through four states:
//!
//! - *scoring-pending*: newly created, per-child counters not yet computed.
//!   Categorical and numeric candidates queue separately because their
//!   expensive pass differs (a child-count scan vs. a private split draw).
//! - *active*: scored, competing in exponential-mechanism selection.
//! - *unsplittable*: permanently retired, but still covered by the final
//!   transfer pass so their leaves carry representative values.
//! - *consumed*: chosen and specialized, replaced by their children.
//!
//! Selection removes the winner by swap-with-last; order in the pool is
//! irrelevant because selection is already randomized.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::Rng;

use crate::candidate::{CategoryCandidate, CutCandidate, IntervalCandidate};
use crate::counter::RecordCounter;
use crate::data::Record;
use crate::error::CoverError;
use crate::mapper::{build_mappers, FrozenMapperSet, MapperSet};
use crate::mech::{choose_weighted, exp_mechanism_weight};
use crate::partition::PartitionTree;
use crate::taxonomy::{AttributeDomain, DomainSpec, TaxonomyIndex};

/// Candidate pools, mappers and selection state of one run.
#[derive(Debug)]
pub struct CutCandidateSet {
    class_labels: Vec<String>,
    /// Largest change one record can induce in an information gain.
    sensitivity: f64,
    mappers: MapperSet,
    indexes: BTreeMap<String, TaxonomyIndex>,
    active: Vec<CutCandidate>,
    retired: Vec<CutCandidate>,
    pending_category: Vec<CategoryCandidate>,
    pending_interval: Vec<IntervalCandidate>,
    digits: u32,
}

impl CutCandidateSet {
    /// Scan the class-label universe and seed one root candidate per
    /// attribute, all covering the partition root.
    ///
    /// Categorical roots get their child-count pass immediately; numeric
    /// roots wait for the first (budgeted) split-finding pass.
    pub fn new(
        records: &[Record],
        spec: &DomainSpec,
        tree: &PartitionTree,
        digits: u32,
    ) -> Result<Self, CoverError> {
        let mut general = RecordCounter::new();
        for record in records {
            general.record(&record.label);
        }
        let class_labels = general.labels().to_vec();
        if class_labels.len() < 2 {
            return Err(CoverError::TooFewClasses {
                classes: class_labels.len(),
            });
        }
        let sensitivity = (class_labels.len() as f64).log2();

        let (mappers, indexes) = build_mappers(spec);
        let mut pending_category = Vec::new();
        let mut pending_interval = Vec::new();
        for (attribute, domain) in spec {
            match domain {
                AttributeDomain::Categorical { .. } => {
                    pending_category.push(CategoryCandidate::root(
                        attribute.clone(),
                        TaxonomyIndex::ROOT,
                        PartitionTree::ROOT,
                        general.clone(),
                    ));
                }
                AttributeDomain::Numeric { min, max } => {
                    pending_interval.push(IntervalCandidate::root(
                        attribute.clone(),
                        *min,
                        *max,
                        PartitionTree::ROOT,
                        general.clone(),
                    ));
                }
            }
        }

        let mut set = Self {
            class_labels,
            sensitivity,
            mappers,
            indexes,
            active: Vec::new(),
            retired: Vec::new(),
            pending_category,
            pending_interval,
            digits,
        };
        set.category_count_childs(tree, records)?;
        Ok(set)
    }

    /// Class labels in first-seen order.
    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    /// `log2` of the class count.
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Number of candidates currently competing for selection.
    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    /// Number of permanently retired candidates.
    pub fn num_retired(&self) -> usize {
        self.retired.len()
    }

    /// Number of numeric candidates still waiting for a split-finding pass.
    pub fn num_pending_intervals(&self) -> usize {
        self.pending_interval
            .iter()
            .filter(|candidate| candidate.core.splittable && !candidate.has_split())
            .count()
    }

    /// Run the private split-finding pass on every pending numeric
    /// candidate that does not have a split yet.
    pub fn determine_new_splits<R: Rng + ?Sized>(
        &mut self,
        eps: f64,
        tree: &PartitionTree,
        records: &[Record],
        rng: &mut R,
    ) -> Result<(), CoverError> {
        let Self {
            pending_interval,
            class_labels,
            sensitivity,
            digits,
            ..
        } = self;
        for candidate in pending_interval.iter_mut() {
            if candidate.core.splittable && !candidate.has_split() {
                candidate.find_split_value(
                    class_labels,
                    *sensitivity,
                    eps,
                    *digits,
                    tree,
                    records,
                    rng,
                )?;
            }
        }
        Ok(())
    }

    /// Run the child-count pass on every pending categorical candidate that
    /// has not been counted yet.
    pub fn category_count_childs(
        &mut self,
        tree: &PartitionTree,
        records: &[Record],
    ) -> Result<(), CoverError> {
        let Self {
            pending_category,
            mappers,
            indexes,
            class_labels,
            ..
        } = self;
        for candidate in pending_category.iter_mut() {
            if candidate.core.splittable && !candidate.is_counted() {
                let index = indexes
                    .get(candidate.core.attribute.as_str())
                    .expect("categorical attribute carries a taxonomy index");
                let mapper = mappers
                    .taxonomy(candidate.core.attribute.as_str())
                    .expect("categorical attribute carries a taxonomy mapper");
                candidate.child_count(class_labels, index, mapper, tree, records)?;
            }
        }
        Ok(())
    }

    /// Promote every counted pending candidate into the active pool, or
    /// retire it when it turned out unsplittable.
    pub fn calculate_candidate_score(&mut self) {
        for mut candidate in std::mem::take(&mut self.pending_category) {
            if candidate.core.splittable {
                candidate.calculate_score();
                debug!(
                    "candidate {} scored {:?}",
                    candidate.core.attribute, candidate.core.score
                );
                self.active.push(CutCandidate::Category(candidate));
            } else {
                self.retired.push(CutCandidate::Category(candidate));
            }
        }
        for mut candidate in std::mem::take(&mut self.pending_interval) {
            if candidate.core.splittable && candidate.has_split() {
                candidate.calculate_score();
                debug!(
                    "candidate {} [{},{}) scored {:?}",
                    candidate.core.attribute, candidate.from, candidate.to, candidate.core.score
                );
                self.active.push(CutCandidate::Interval(candidate));
            } else {
                self.retired.push(CutCandidate::Interval(candidate));
            }
        }
    }

    /// Exponential-mechanism draw over the active candidates' scores.
    ///
    /// Returns the pool index of the winner, or `None` when the pool is
    /// empty, which is the loop's normal exhaustion exit.
    pub fn select_candidate<R: Rng + ?Sized>(&self, eps: f64, rng: &mut R) -> Option<usize> {
        if self.active.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self
            .active
            .iter()
            .map(|candidate| {
                let score = candidate
                    .core()
                    .score
                    .expect("active candidates are scored");
                exp_mechanism_weight(eps, self.sensitivity, score)
            })
            .collect();
        debug!("candidate selection weights: {:?}", weights);
        choose_weighted(rng, &weights)
    }

    /// Remove the winner from the pool, commit its specialization, and queue
    /// its children for scoring.
    pub fn specialize_candidate(
        &mut self,
        index: usize,
        tree: &mut PartitionTree,
        records: &[Record],
    ) -> Result<(), CoverError> {
        assert!(index < self.active.len(), "candidate index out of range");
        let chosen = self.active.swap_remove(index);
        info!(
            "specializing candidate {} of attribute {}",
            chosen.general_value(self.indexes.get(chosen.core().attribute.as_str())),
            chosen.core().attribute,
        );
        match chosen {
            CutCandidate::Category(candidate) => {
                let attribute = candidate.core.attribute.clone();
                let taxonomy = self
                    .indexes
                    .get(attribute.as_str())
                    .expect("categorical attribute carries a taxonomy index");
                let mapper = self
                    .mappers
                    .taxonomy_mut(attribute.as_str())
                    .expect("categorical attribute carries a taxonomy mapper");
                let children = candidate.specialize(taxonomy, mapper, tree, records)?;
                self.pending_category.extend(children);
                // Children need their child-count pass before they can score.
                self.category_count_childs(tree, records)?;
            }
            CutCandidate::Interval(candidate) => {
                let mapper = self
                    .mappers
                    .interval_mut(candidate.core.attribute.as_str())
                    .expect("numeric attribute carries an interval mapper");
                let children = candidate.specialize(mapper, tree, records)?;
                self.pending_interval.extend(children);
            }
        }
        Ok(())
    }

    /// Write every surviving candidate's generalized value onto the leaves
    /// it covers, active and retired alike, so every leaf ends up with a
    /// complete representative map.
    pub fn transfer_candidate_values(&mut self, tree: &mut PartitionTree) {
        let Self {
            active,
            retired,
            indexes,
            ..
        } = self;
        for candidate in active.iter_mut().chain(retired.iter_mut()) {
            let index = indexes.get(candidate.core().attribute.as_str());
            candidate.transfer_value(index, tree);
        }
    }

    /// Freeze every mapper for reuse on held-out data.
    pub fn export_mapper_set(self) -> FrozenMapperSet {
        self.mappers.freeze()
    }
}
