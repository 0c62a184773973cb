//! Merged expression built from two correlated expressions.
//!
//! Each matched pair collapses into one merged node; unmatched nodes of
//! either side get a merged node of their own. Merged indices are assigned
//! in one deterministic pass:
//!
//! 1. reference nodes in reference post-order,
//! 2. comparison-only nodes in comparison post-order,
//! 3. synthetic conjunctions, in order of the node that owns them.
//!
//! Children are reconnected through merged indices: reference children
//! first, then comparison children not already present. A single-child kind
//! that ends up with several children gets a synthetic `And` holding them.
//!
//! A shared node can be reached from two merged parents (one per side), so
//! the result is a rooted DAG rather than a tree.

use crate::arena::{ArenaIndex, MergedIndex, NodeArena, NodeIndex};
use crate::core::{Arity, ExpressionTree, LogicalExpression, NodeKind};
use crate::fingerprint::{ContentSignature, SignatureTable};
use crate::isomorphism::{IsomorphismMapping, MatchQuality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which input node(s) a merged node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeOrigin {
    /// A matched pair.
    Shared {
        reference: NodeIndex,
        comparison: NodeIndex,
        quality: MatchQuality,
    },
    /// Present only in the reference expression.
    Reference(NodeIndex),
    /// Present only in the comparison expression.
    Comparison(NodeIndex),
    /// Conjunction inserted to keep a single-child kind well-formed.
    Synthetic,
}

impl NodeOrigin {
    /// Reference-side index, if any.
    pub fn reference(&self) -> Option<NodeIndex> {
        match *self {
            NodeOrigin::Shared { reference, .. } | NodeOrigin::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Comparison-side index, if any.
    pub fn comparison(&self) -> Option<NodeIndex> {
        match *self {
            NodeOrigin::Shared { comparison, .. } | NodeOrigin::Comparison(comparison) => {
                Some(comparison)
            }
            _ => None,
        }
    }

    /// Returns `true` for matched pairs.
    pub fn is_shared(&self) -> bool {
        matches!(self, NodeOrigin::Shared { .. })
    }
}

/// One node of a merged expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedNode {
    pub index: MergedIndex,
    pub kind: NodeKind,
    pub children: Vec<MergedIndex>,
    pub origin: NodeOrigin,
    /// Signature of the reference origin, if any.
    pub reference_signature: Option<ContentSignature>,
    /// Signature of the comparison origin, if any.
    pub comparison_signature: Option<ContentSignature>,
}

impl MergedNode {
    /// Signature of the node's content, preferring the reference side.
    pub fn signature(&self) -> Option<ContentSignature> {
        self.reference_signature.or(self.comparison_signature)
    }
}

/// The unified graph of two correlated expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedExpression {
    nodes: NodeArena<MergedIndex, MergedNode>,
    root: MergedIndex,
    reference_to_merged: Vec<MergedIndex>,
    comparison_to_merged: Vec<MergedIndex>,
}

impl MergedExpression {
    /// Looks up a merged node.
    #[inline]
    pub fn node(&self, index: MergedIndex) -> Option<&MergedNode> {
        self.nodes.get(index)
    }

    /// Iterates over all merged nodes by ascending index.
    pub fn nodes(&self) -> impl Iterator<Item = &MergedNode> {
        self.nodes.iter().map(|(_, node)| node)
    }

    /// Merged index of a reference node.
    pub fn merged_for_reference(&self, reference: NodeIndex) -> Option<MergedIndex> {
        self.reference_to_merged.get(reference.as_usize()).copied()
    }

    /// Merged index of a comparison node.
    pub fn merged_for_comparison(&self, comparison: NodeIndex) -> Option<MergedIndex> {
        self.comparison_to_merged.get(comparison.as_usize()).copied()
    }

    /// Reference → merged index map.
    pub fn reference_to_merged(&self) -> BTreeMap<NodeIndex, MergedIndex> {
        self.reference_to_merged
            .iter()
            .enumerate()
            .map(|(slot, &merged)| (NodeIndex::new(slot as u32), merged))
            .collect()
    }

    /// Comparison → merged index map.
    pub fn comparison_to_merged(&self) -> BTreeMap<NodeIndex, MergedIndex> {
        self.comparison_to_merged
            .iter()
            .enumerate()
            .map(|(slot, &merged)| (NodeIndex::new(slot as u32), merged))
            .collect()
    }

    /// Merged parents of a node, ascending.
    pub fn parents(&self, index: MergedIndex) -> Vec<MergedIndex> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.children.contains(&index))
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of synthetic conjunctions.
    pub fn synthetic_count(&self) -> usize {
        self.nodes()
            .filter(|node| node.origin == NodeOrigin::Synthetic)
            .count()
    }
}

impl ExpressionTree for MergedExpression {
    type Index = MergedIndex;

    #[inline]
    fn root(&self) -> MergedIndex {
        self.root
    }

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn kind(&self, index: MergedIndex) -> Option<&NodeKind> {
        self.nodes.get(index).map(|node| &node.kind)
    }

    #[inline]
    fn children(&self, index: MergedIndex) -> &[MergedIndex] {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }
}

/// Builds the merged expression of two correlated expressions.
pub fn build_merged(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    reference_signatures: &SignatureTable,
    comparison_signatures: &SignatureTable,
    mapping: &IsomorphismMapping,
) -> MergedExpression {
    let mut nodes: NodeArena<MergedIndex, MergedNode> =
        NodeArena::with_capacity(reference.len() + comparison.len());
    let mut reference_to_merged = vec![MergedIndex::MAX; reference.len()];
    let mut comparison_to_merged = vec![MergedIndex::MAX; comparison.len()];

    for r in reference.post_order() {
        let Some(kind) = reference.kind(r) else {
            continue;
        };
        let index = nodes.next_index();
        let (origin, comparison_signature) = match mapping.correspondence(r) {
            Some(found) if comparison.kind(found.comparison).is_some() => {
                comparison_to_merged[found.comparison.as_usize()] = index;
                (
                    NodeOrigin::Shared {
                        reference: r,
                        comparison: found.comparison,
                        quality: found.quality,
                    },
                    comparison_signatures.get(found.comparison),
                )
            }
            _ => (NodeOrigin::Reference(r), None),
        };
        reference_to_merged[r.as_usize()] = index;
        nodes.allocate(MergedNode {
            index,
            kind: kind.clone(),
            children: Vec::new(),
            origin,
            reference_signature: reference_signatures.get(r),
            comparison_signature,
        });
    }

    for c in comparison.post_order() {
        if comparison_to_merged[c.as_usize()] != MergedIndex::MAX {
            continue;
        }
        let Some(kind) = comparison.kind(c) else {
            continue;
        };
        let index = nodes.next_index();
        comparison_to_merged[c.as_usize()] = index;
        nodes.allocate(MergedNode {
            index,
            kind: kind.clone(),
            children: Vec::new(),
            origin: NodeOrigin::Comparison(c),
            reference_signature: None,
            comparison_signature: comparison_signatures.get(c),
        });
    }

    for node in reference.nodes() {
        let merged = reference_to_merged[node.index.as_usize()];
        let children: Vec<MergedIndex> = node
            .children
            .iter()
            .map(|child| reference_to_merged[child.as_usize()])
            .collect();
        if let Some(target) = nodes.get_mut(merged) {
            target.children = children;
        }
    }
    for node in comparison.nodes() {
        let merged = comparison_to_merged[node.index.as_usize()];
        let Some(target) = nodes.get_mut(merged) else {
            continue;
        };
        for child in &node.children {
            let child = comparison_to_merged[child.as_usize()];
            if !target.children.contains(&child) {
                target.children.push(child);
            }
        }
    }

    let overfull: Vec<MergedIndex> = nodes
        .iter()
        .filter(|(_, node)| node.kind.arity() == Arity::Single && node.children.len() > 1)
        .map(|(id, _)| id)
        .collect();
    for owner in &overfull {
        let index = nodes.next_index();
        let Some(target) = nodes.get_mut(*owner) else {
            continue;
        };
        let children = std::mem::replace(&mut target.children, vec![index]);
        nodes.allocate(MergedNode {
            index,
            kind: NodeKind::And,
            children,
            origin: NodeOrigin::Synthetic,
            reference_signature: None,
            comparison_signature: None,
        });
    }

    let root = reference_to_merged[reference.root().as_usize()];
    debug!(
        nodes = nodes.len(),
        synthetic = overfull.len(),
        "merged expression built"
    );
    MergedExpression {
        nodes,
        root,
        reference_to_merged,
        comparison_to_merged,
    }
}
