//! Generalization state per attribute.
//!
//! # Overview
//!
//! A mapper tracks how raw values of one attribute are currently read:
//!
//! - [`TaxonomyMapper`]: each leaf category carries a stack of ancestors
//!   (immediate parent first, topmost last); `generalize` reads the top,
//!   `specialize` pops one level for every leaf rolled up under the
//!   specialized node
//! - [`IntervalMapper`]: a sorted boundary list; `generalize` is a binary
//!   search into half-open buckets, `specialize` inserts one boundary
//!
//! [`freeze`](MapperSet::freeze) converts the whole set into an immutable
//! [`FrozenMapperSet`] that replays the committed generalization onto data
//! the engine never saw, e.g. a held-out test split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{GeneralValue, Value};
use crate::error::CoverError;
use crate::taxonomy::{AttributeDomain, DomainSpec, TaxonomyIndex};

// ============================================================================
// TaxonomyMapper
// ============================================================================

/// Generalization state of one categorical attribute.
#[derive(Debug, Clone)]
pub struct TaxonomyMapper {
    attribute: String,
    root_name: String,
    /// Leaf value to ancestor names, immediate parent first, topmost last.
    parent_stack: BTreeMap<String, Vec<String>>,
    /// Node name to leaf values currently rolled up under it.
    rollup: BTreeMap<String, Vec<String>>,
    /// Leaf value to the region it belongs to in the committed partition.
    current_parent: BTreeMap<String, String>,
}

impl TaxonomyMapper {
    /// Build the initial state from an attribute's taxonomy.
    ///
    /// Every leaf starts committed to the root region, with its ancestor
    /// stack topping out at the root's immediate child containing it.
    pub fn new(attribute: impl Into<String>, index: &TaxonomyIndex) -> Self {
        let attribute = attribute.into();
        let root_name = index.name(TaxonomyIndex::ROOT).to_string();
        let parents = index.parents();

        let mut parent_stack = BTreeMap::new();
        let mut current_parent = BTreeMap::new();
        for leaf in index.leaves_under(TaxonomyIndex::ROOT) {
            let leaf_name = index.name(leaf).to_string();
            let mut stack = Vec::new();
            let mut cursor = parents[leaf as usize];
            while let Some(ancestor) = cursor {
                if ancestor == TaxonomyIndex::ROOT {
                    break;
                }
                stack.push(index.name(ancestor).to_string());
                cursor = parents[ancestor as usize];
            }
            parent_stack.insert(leaf_name.clone(), stack);
            current_parent.insert(leaf_name, root_name.clone());
        }

        let mut rollup = BTreeMap::new();
        for &child in index.children(TaxonomyIndex::ROOT) {
            let leaves = index
                .leaves_under(child)
                .iter()
                .map(|&id| index.name(id).to_string())
                .collect();
            rollup.insert(index.name(child).to_string(), leaves);
        }

        Self {
            attribute,
            root_name,
            parent_stack,
            rollup,
            current_parent,
        }
    }

    /// Attribute this mapper belongs to.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Region a raw leaf value currently reads as, one level finer than the
    /// committed partition; this is the view `child_count` buckets records with.
    ///
    /// A leaf whose ancestor stack is exhausted is its own region.
    pub fn generalize<'a>(&'a self, value: &'a str) -> Result<&'a str, CoverError> {
        let stack = self
            .parent_stack
            .get(value)
            .ok_or_else(|| CoverError::UnknownCategory {
                attribute: self.attribute.clone(),
                value: value.to_string(),
            })?;
        Ok(stack.last().map(String::as_str).unwrap_or(value))
    }

    /// Region a leaf belongs to in the committed partition.
    pub fn committed_region(&self, value: &str) -> Result<&str, CoverError> {
        self.current_parent
            .get(value)
            .map(String::as_str)
            .ok_or_else(|| CoverError::UnknownCategory {
                attribute: self.attribute.clone(),
                value: value.to_string(),
            })
    }

    /// Commit one specialization: the region named `value` becomes live.
    ///
    /// Every leaf rolled up under `value` pops one ancestor level and
    /// re-rolls under its new top; a leaf with no remaining ancestors becomes
    /// its own region. Runs in O(affected leaves).
    pub fn specialize(&mut self, value: &str) {
        let leaves = self.rollup.remove(value).unwrap_or_default();
        if leaves.is_empty() {
            // `value` is a taxonomy leaf with nothing rolled up under it.
            self.current_parent
                .insert(value.to_string(), value.to_string());
            return;
        }
        for leaf in &leaves {
            self.current_parent.insert(leaf.clone(), value.to_string());
            let stack = self
                .parent_stack
                .get_mut(leaf)
                .unwrap_or_else(|| panic!("leaf {:?} missing its ancestor stack", leaf));
            stack.pop();
            let new_parent = stack.last().cloned().unwrap_or_else(|| leaf.clone());
            if new_parent != *leaf {
                self.rollup.entry(new_parent).or_default().push(leaf.clone());
            }
        }
        // Dispersed one level down; the entry stays so a later specialize of
        // the same name sees an empty set, not a missing one.
        self.rollup.insert(value.to_string(), Vec::new());
    }

    /// Name of the taxonomy root.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    fn freeze(self) -> FrozenMapper {
        FrozenMapper::Taxonomy {
            regions: self.current_parent,
        }
    }
}

// ============================================================================
// IntervalMapper
// ============================================================================

/// Generalization state of one numeric attribute.
#[derive(Debug, Clone)]
pub struct IntervalMapper {
    attribute: String,
    /// Monotonically increasing boundaries; starts as `[min, max]`.
    bounds: Vec<f64>,
}

impl IntervalMapper {
    /// Mapper over the half-open domain `[min, max)`.
    pub fn new(attribute: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            attribute: attribute.into(),
            bounds: vec![min, max],
        }
    }

    /// Attribute this mapper belongs to.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Half-open bucket `[lo, hi)` containing `value`.
    ///
    /// Fails for values outside the declared `[min, max)` domain.
    pub fn generalize(&self, value: f64) -> Result<(f64, f64), CoverError> {
        let idx = self.bounds.partition_point(|&b| b <= value);
        if idx == 0 || idx == self.bounds.len() {
            return Err(CoverError::ValueOutOfRange {
                attribute: self.attribute.clone(),
                value,
                min: self.bounds[0],
                max: *self.bounds.last().expect("bounds are never empty"),
            });
        }
        Ok((self.bounds[idx - 1], self.bounds[idx]))
    }

    /// Insert one split boundary, keeping the list sorted.
    pub fn specialize(&mut self, boundary: f64) {
        let idx = self.bounds.partition_point(|&b| b < boundary);
        self.bounds.insert(idx, boundary);
    }

    /// Current boundaries, including the domain endpoints.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    fn freeze(self) -> FrozenMapper {
        FrozenMapper::Interval {
            bounds: self.bounds,
        }
    }
}

// ============================================================================
// MapperSet
// ============================================================================

/// One live mapper per attribute.
#[derive(Debug, Clone)]
pub enum ValueMapper {
    Taxonomy(TaxonomyMapper),
    Interval(IntervalMapper),
}

/// All attribute mappers of one specialization run.
#[derive(Debug, Clone, Default)]
pub struct MapperSet {
    mappers: BTreeMap<String, ValueMapper>,
}

impl MapperSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: impl Into<String>, mapper: ValueMapper) {
        self.mappers.insert(attribute.into(), mapper);
    }

    /// Taxonomy mapper of a categorical attribute.
    pub fn taxonomy(&self, attribute: &str) -> Option<&TaxonomyMapper> {
        match self.mappers.get(attribute) {
            Some(ValueMapper::Taxonomy(mapper)) => Some(mapper),
            _ => None,
        }
    }

    pub fn taxonomy_mut(&mut self, attribute: &str) -> Option<&mut TaxonomyMapper> {
        match self.mappers.get_mut(attribute) {
            Some(ValueMapper::Taxonomy(mapper)) => Some(mapper),
            _ => None,
        }
    }

    /// Interval mapper of a numeric attribute.
    pub fn interval(&self, attribute: &str) -> Option<&IntervalMapper> {
        match self.mappers.get(attribute) {
            Some(ValueMapper::Interval(mapper)) => Some(mapper),
            _ => None,
        }
    }

    pub fn interval_mut(&mut self, attribute: &str) -> Option<&mut IntervalMapper> {
        match self.mappers.get_mut(attribute) {
            Some(ValueMapper::Interval(mapper)) => Some(mapper),
            _ => None,
        }
    }

    /// Attribute names in stable order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Finalize every mapper for reuse on disjoint data.
    pub fn freeze(self) -> FrozenMapperSet {
        let mappers = self
            .mappers
            .into_iter()
            .map(|(attribute, mapper)| {
                let frozen = match mapper {
                    ValueMapper::Taxonomy(m) => m.freeze(),
                    ValueMapper::Interval(m) => m.freeze(),
                };
                (attribute, frozen)
            })
            .collect();
        FrozenMapperSet { mappers }
    }
}

// ============================================================================
// FrozenMapperSet
// ============================================================================

/// Immutable, serializable snapshot of one attribute's generalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrozenMapper {
    /// Leaf category to committed region name.
    Taxonomy { regions: BTreeMap<String, String> },
    /// Committed interval boundaries, sorted, endpoints included.
    Interval { bounds: Vec<f64> },
}

/// The exported generalization mapping of a finished run.
///
/// Applying it never specializes further, so repeated calls with the same
/// input always return the same region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenMapperSet {
    mappers: BTreeMap<String, FrozenMapper>,
}

impl FrozenMapperSet {
    /// Attribute names in stable order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Number of mapped attributes.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Generalize one raw value of `attribute`.
    pub fn generalize(&self, attribute: &str, value: &Value) -> Result<GeneralValue, CoverError> {
        let mapper = self
            .mappers
            .get(attribute)
            .ok_or_else(|| CoverError::MissingAttribute {
                attribute: attribute.to_string(),
            })?;
        match (mapper, value) {
            (FrozenMapper::Taxonomy { regions }, Value::Category(token)) => regions
                .get(token)
                .map(|region| GeneralValue::Category(region.clone()))
                .ok_or_else(|| CoverError::UnknownCategory {
                    attribute: attribute.to_string(),
                    value: token.clone(),
                }),
            (FrozenMapper::Interval { bounds }, Value::Number(number)) => {
                let idx = bounds.partition_point(|&b| b <= *number);
                if idx == 0 || idx == bounds.len() {
                    return Err(CoverError::ValueOutOfRange {
                        attribute: attribute.to_string(),
                        value: *number,
                        min: bounds[0],
                        max: *bounds.last().expect("bounds are never empty"),
                    });
                }
                Ok(GeneralValue::Interval(bounds[idx - 1], bounds[idx]))
            }
            (FrozenMapper::Taxonomy { .. }, other) => Err(CoverError::TypeMismatch {
                attribute: attribute.to_string(),
                expected: "categorical",
                got: other.kind(),
            }),
            (FrozenMapper::Interval { .. }, other) => Err(CoverError::TypeMismatch {
                attribute: attribute.to_string(),
                expected: "numeric",
                got: other.kind(),
            }),
        }
    }
}

/// Build the live mappers (and taxonomy indexes) declared by `spec`.
pub fn build_mappers(spec: &DomainSpec) -> (MapperSet, BTreeMap<String, TaxonomyIndex>) {
    let mut mappers = MapperSet::new();
    let mut indexes = BTreeMap::new();
    for (attribute, domain) in spec {
        match domain {
            AttributeDomain::Categorical { root } => {
                let index = TaxonomyIndex::build(root);
                mappers.insert(
                    attribute.clone(),
                    ValueMapper::Taxonomy(TaxonomyMapper::new(attribute.clone(), &index)),
                );
                indexes.insert(attribute.clone(), index);
            }
            AttributeDomain::Numeric { min, max } => {
                mappers.insert(
                    attribute.clone(),
                    ValueMapper::Interval(IntervalMapper::new(attribute.clone(), *min, *max)),
                );
            }
        }
    }
    (mappers, indexes)
}
