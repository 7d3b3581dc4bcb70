//! Taxonomy-tree input types and the arena index built from them.
//!
//! # Overview
//!
//! The caller declares one domain per attribute: a taxonomy tree for
//! categorical attributes, a `[min, max)` range for numeric ones. The wire
//! format is the original JSON layout of `{"value": ..., "childs": [...]}`
//! nodes under a `"root"` key, or `{"min": ..., "max": ...}`:
//!
//! ```json
//! {
//!     "region": {"root": {"value": "Any", "childs": [
//!         {"value": "US", "childs": [
//!             {"value": "CA", "childs": []},
//!             {"value": "NY", "childs": []}
//!         ]},
//!         {"value": "EU", "childs": []}
//!     ]}},
//!     "age": {"min": 0, "max": 100}
//! }
//! ```
//!
//! Internally the tree is flattened into a [`TaxonomyIndex`], an arena of
//! nodes addressed by `u32` id, so candidates and mappers can reference
//! subtrees without owning them and without parent back-pointers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of a categorical attribute's taxonomy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    /// Node name; for leaves this is the raw category token.
    #[serde(rename = "value")]
    pub name: String,
    /// Ordered children; empty for leaves.
    #[serde(rename = "childs", default)]
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    /// A leaf node.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// An internal node with ordered children.
    pub fn branch(name: impl Into<String>, children: Vec<TaxonomyNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// Declared domain of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeDomain {
    /// Categorical attribute generalized along a taxonomy tree.
    Categorical { root: TaxonomyNode },
    /// Numeric attribute over the half-open range `[min, max)`.
    Numeric { min: f64, max: f64 },
}

/// Attribute name to declared domain.
pub type DomainSpec = BTreeMap<String, AttributeDomain>;

/// Arena id of a taxonomy node within its attribute's [`TaxonomyIndex`].
pub type TaxoId = u32;

#[derive(Debug, Clone)]
struct IndexNode {
    name: String,
    children: Vec<TaxoId>,
}

/// Flattened taxonomy tree for one attribute.
#[derive(Debug, Clone)]
pub struct TaxonomyIndex {
    nodes: Vec<IndexNode>,
}

impl TaxonomyIndex {
    /// Id of the root node.
    pub const ROOT: TaxoId = 0;

    /// Flatten `root` into an arena, preserving child order.
    pub fn build(root: &TaxonomyNode) -> Self {
        let mut nodes = vec![IndexNode {
            name: root.name.clone(),
            children: Vec::new(),
        }];
        let mut stack: Vec<(&TaxonomyNode, TaxoId)> = vec![(root, Self::ROOT)];
        while let Some((source, id)) = stack.pop() {
            for child in &source.children {
                let child_id = nodes.len() as TaxoId;
                nodes.push(IndexNode {
                    name: child.name.clone(),
                    children: Vec::new(),
                });
                nodes[id as usize].children.push(child_id);
                stack.push((child, child_id));
            }
        }
        Self { nodes }
    }

    /// Name of a node.
    pub fn name(&self, id: TaxoId) -> &str {
        &self.nodes[id as usize].name
    }

    /// Ordered children of a node.
    pub fn children(&self, id: TaxoId) -> &[TaxoId] {
        &self.nodes[id as usize].children
    }

    /// True when the node has no children.
    pub fn is_leaf(&self, id: TaxoId) -> bool {
        self.children(id).is_empty()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Ids of all leaves under `id`, left to right.
    pub fn leaves_under(&self, id: TaxoId) -> Vec<TaxoId> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let children = self.children(current);
            if children.is_empty() {
                leaves.push(current);
            } else {
                // Reversed push keeps the pop order left to right.
                stack.extend(children.iter().rev().copied());
            }
        }
        leaves
    }

    /// Parent id of every node (`None` for the root).
    pub fn parents(&self) -> Vec<Option<TaxoId>> {
        let mut parents = vec![None; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                parents[child as usize] = Some(id as TaxoId);
            }
        }
        parents
    }
}
