//! Classification of merged content into shared, added and deleted subtrees.
//!
//! The classifier walks the merged graph once, top-down from the root, and
//! stops at the highest point of divergence: everything below a reported
//! subtree is covered by that report.
//!
//! # Citations
//! - Edit scripts on unordered trees: Chawathe & Garcia-Molina, "Meaningful change detection in structured data" (1997)

use crate::arena::{MergedIndex, NodeIndex};
use crate::core::{ExpressionTree, NodeKind};
use crate::fingerprint::ContentSignature;
use crate::isomorphism::{IsomorphismMapping, MatchQuality};
use crate::merge::{MergedExpression, MergedNode, NodeOrigin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Input side a subtree handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Reference,
    Comparison,
}

/// A maximal one-sided subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeHandle {
    /// Merged node at the top of the subtree.
    pub merged: MergedIndex,
    pub side: Side,
    /// Index of the subtree root in its own input expression.
    pub origin: NodeIndex,
    pub kind: NodeKind,
    pub signature: ContentSignature,
}

/// A subtree present on both sides with identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRoot {
    pub merged: MergedIndex,
    pub reference: NodeIndex,
    pub comparison: NodeIndex,
    pub kind: NodeKind,
    pub signature: ContentSignature,
}

/// Result of classifying a merged expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSets {
    /// Outermost identical role restrictions, one per signature.
    pub shared_roots: Vec<SharedRoot>,
    /// Identical assertion leaves outside any shared role restriction.
    pub shared_assertions: Vec<SharedRoot>,
    /// Maximal comparison-only subtrees.
    pub additions: Vec<SubtreeHandle>,
    /// Maximal reference-only subtrees.
    pub deletions: Vec<SubtreeHandle>,
}

impl DiffSets {
    /// Returns `true` if nothing was added or deleted.
    pub fn is_unchanged(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    /// Comparison indices of all additions, in report order.
    pub fn addition_origins(&self) -> Vec<NodeIndex> {
        self.additions.iter().map(|handle| handle.origin).collect()
    }

    /// Reference indices of all deletions, in report order.
    pub fn deletion_origins(&self) -> Vec<NodeIndex> {
        self.deletions.iter().map(|handle| handle.origin).collect()
    }
}

/// Classifies every merged node reachable from the root.
///
/// - reference-only node: deletion, not descended into;
/// - comparison-only node: addition, not descended into;
/// - shared role restriction: identical content is a shared root (first
///   occurrence per signature), otherwise the reference side is a deletion
///   and the comparison side an addition;
/// - shared leaf: shared assertion when identical, deletion plus addition
///   otherwise;
/// - any other shared or synthetic node: descended into.
pub fn classify(merged: &MergedExpression, mapping: &IsomorphismMapping) -> DiffSets {
    let mut diff = DiffSets::default();
    let mut visited = vec![false; merged.len()];
    let mut seen_roots: BTreeSet<ContentSignature> = BTreeSet::new();
    let mut stack = vec![merged.root()];

    while let Some(id) = stack.pop() {
        let Some(seen) = visited.get_mut(id.get() as usize) else {
            continue;
        };
        if *seen {
            continue;
        }
        *seen = true;
        let Some(node) = merged.node(id) else {
            continue;
        };

        match node.origin {
            NodeOrigin::Reference(reference) => {
                diff.deletions
                    .extend(one_sided(node, Side::Reference, reference));
            }
            NodeOrigin::Comparison(comparison) => {
                diff.additions
                    .extend(one_sided(node, Side::Comparison, comparison));
            }
            NodeOrigin::Shared {
                reference,
                comparison,
                ..
            } if node.kind.is_role() || node.kind.is_leaf() => {
                match shared(node, mapping, reference, comparison) {
                    Some(root) if node.kind.is_leaf() => diff.shared_assertions.push(root),
                    Some(root) => {
                        if seen_roots.insert(root.signature) {
                            diff.shared_roots.push(root);
                        }
                    }
                    None => {
                        diff.deletions
                            .extend(one_sided(node, Side::Reference, reference));
                        diff.additions
                            .extend(one_sided(node, Side::Comparison, comparison));
                    }
                }
            }
            NodeOrigin::Shared { .. } | NodeOrigin::Synthetic => {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    debug!(
        shared_roots = diff.shared_roots.len(),
        shared_assertions = diff.shared_assertions.len(),
        additions = diff.additions.len(),
        deletions = diff.deletions.len(),
        "diff classified"
    );
    diff
}

fn one_sided(node: &MergedNode, side: Side, origin: NodeIndex) -> Option<SubtreeHandle> {
    let signature = match side {
        Side::Reference => node.reference_signature,
        Side::Comparison => node.comparison_signature,
    }?;
    Some(SubtreeHandle {
        merged: node.index,
        side,
        origin,
        kind: node.kind.clone(),
        signature,
    })
}

/// A shared root if the pair carries identical content.
fn shared(
    node: &MergedNode,
    mapping: &IsomorphismMapping,
    reference: NodeIndex,
    comparison: NodeIndex,
) -> Option<SharedRoot> {
    let signature = node.reference_signature?;
    let exact = mapping.correspondence(reference).map_or(false, |found| {
        found.comparison == comparison && found.quality == MatchQuality::Exact
    });
    if !exact && node.comparison_signature != Some(signature) {
        return None;
    }
    Some(SharedRoot {
        merged: node.index,
        reference,
        comparison,
        kind: node.kind.clone(),
        signature,
    })
}
