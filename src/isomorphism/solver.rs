//! Matching passes of the correlation solver.
//!
//! Passes, in order:
//! 1. unique anchoring by signature, largest subtrees first;
//! 2. ambiguous pairing of the remaining signature-equal candidates;
//! 3. best-effort pairing of interior nodes by matched-child overlap,
//!    restricted to candidates at the same depth;
//! 4. forcing the Root and definition-set spine.
//!
//! Every successful insertion feeds [`Solver::propagate`], which pairs the
//! children of the new pair top-down and re-checks its parent bottom-up
//! until nothing changes.
//!
//! # Citations
//! - Top-down then bottom-up tree matching: Falleri et al., "Fine-grained and accurate source code differencing" (2014)
//! - Matching hierarchical data by leaf overlap: Chawathe et al., "Change detection in hierarchically structured information" (1996)
//! - Ancestor tests by pre-order intervals: Dietz, "Maintaining order in a linked list" (1982)
//!
//! # Invariants
//! - The mapping stays a bijection (enforced by `IsomorphismMapping::insert`).
//! - Paired nodes have equal kinds.
//! - No pair is ancestor-inverted against another: if `r1` is an ancestor
//!   of `r2`, the partner of `r1` is never a descendant of the partner of `r2`.

use super::worklist::PropagationWorklist;
use super::{IsomorphismMapping, MatchQuality};
use crate::arena::NodeIndex;
use crate::config::CorrelationConfig;
use crate::core::{ExpressionTree, LogicalExpression, NodeKind};
use crate::fingerprint::{ContentSignature, SignatureTable};
use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

type Occurrences = BTreeMap<ContentSignature, Vec<NodeIndex>>;

pub(crate) struct Solver<'a> {
    reference: &'a LogicalExpression,
    comparison: &'a LogicalExpression,
    reference_signatures: &'a SignatureTable,
    comparison_signatures: &'a SignatureTable,
    config: &'a CorrelationConfig,
    mapping: IsomorphismMapping,
    reference_layout: TreeLayout,
    comparison_layout: TreeLayout,
    /// Post-order position of each reference node.
    rank: Vec<u32>,
    /// Matched reference nodes whose children still need top-down pairing.
    pending: VecDeque<NodeIndex>,
    /// Unmatched reference parents to re-check bottom-up.
    worklist: PropagationWorklist,
}

impl<'a> Solver<'a> {
    pub(crate) fn new(
        reference: &'a LogicalExpression,
        comparison: &'a LogicalExpression,
        reference_signatures: &'a SignatureTable,
        comparison_signatures: &'a SignatureTable,
        config: &'a CorrelationConfig,
    ) -> Self {
        let mut rank = vec![u32::MAX; reference.len()];
        for (position, id) in reference.post_order().into_iter().enumerate() {
            rank[id.get() as usize] = position as u32;
        }
        Self {
            reference,
            comparison,
            reference_signatures,
            comparison_signatures,
            config,
            mapping: IsomorphismMapping::new(reference.len(), comparison.len()),
            reference_layout: TreeLayout::new(reference),
            comparison_layout: TreeLayout::new(comparison),
            rank,
            pending: VecDeque::new(),
            worklist: PropagationWorklist::new(),
        }
    }

    pub(crate) fn solve(mut self) -> IsomorphismMapping {
        let reference_occurrences = self.reference_signatures.occurrences();
        let comparison_occurrences = self.comparison_signatures.occurrences();

        self.anchor_unique(&reference_occurrences, &comparison_occurrences);
        debug!(matched = self.mapping.len(), "unique anchoring finished");

        self.pair_ambiguous(&comparison_occurrences);
        debug!(matched = self.mapping.len(), "ambiguous pairing finished");

        if self.config.best_effort {
            self.residual();
            debug!(
                approximate = self.mapping.approximate_count(),
                "best-effort pass finished"
            );
        }

        self.force_spine();
        debug!(
            exact = self.mapping.exact_count(),
            approximate = self.mapping.approximate_count(),
            unmatched_reference = self.mapping.reference_len() - self.mapping.len(),
            unmatched_comparison = self.mapping.comparison_len() - self.mapping.len(),
            "correlation finished"
        );
        self.mapping
    }

    /// Reference nodes ordered by subtree size (descending), then index.
    fn largest_first(&self) -> Vec<NodeIndex> {
        let mut order: Vec<NodeIndex> = (0..self.reference.len() as u32).map(NodeIndex::new).collect();
        order.sort_by_key(|&r| (Reverse(self.reference_signatures.subtree_size(r)), r));
        order
    }

    /// Pairs nodes whose signature occurs exactly once on each side.
    fn anchor_unique(&mut self, reference: &Occurrences, comparison: &Occurrences) {
        let mut anchors: Vec<(NodeIndex, NodeIndex)> = reference
            .iter()
            .filter_map(|(signature, refs)| {
                match (refs.as_slice(), comparison.get(signature)?.as_slice()) {
                    ([r], [c]) => Some((*r, *c)),
                    _ => None,
                }
            })
            .collect();
        anchors.sort_by_key(|&(r, _)| (Reverse(self.reference_signatures.subtree_size(r)), r));

        for (r, c) in anchors {
            if self.mapping.contains_reference(r) || self.mapping.contains_comparison(c) {
                continue;
            }
            if self.insert(r, c, MatchQuality::Exact) {
                self.propagate();
            }
        }
    }

    /// Pairs the remaining signature-equal candidates, smallest comparison
    /// index first.
    fn pair_ambiguous(&mut self, comparison_occurrences: &Occurrences) {
        for r in self.largest_first() {
            if self.mapping.contains_reference(r) {
                continue;
            }
            let signature = self.reference_signatures[r];
            let Some(candidates) = comparison_occurrences.get(&signature) else {
                continue;
            };
            let free: Vec<NodeIndex> = candidates
                .iter()
                .copied()
                .filter(|&c| !self.mapping.contains_comparison(c))
                .collect();
            if free.len() > 1 {
                debug!(
                    reference = r.get(),
                    candidates = free.len(),
                    chosen = free[0].get(),
                    "ambiguous match"
                );
            }

            for c in free {
                if self.insert(r, c, MatchQuality::Exact) {
                    self.propagate();
                    break;
                }
            }
        }
    }

    /// Pairs unmatched interior nodes with the same-kind comparison node that
    /// parents the most partners of their children.
    ///
    /// Candidates must sit at the same depth as the reference node, so a
    /// nested group never claims a conjunction from higher up the other tree.
    fn residual(&mut self) {
        let reference = self.reference;
        let comparison = self.comparison;
        for r in reference.post_order() {
            if self.mapping.contains_reference(r) {
                continue;
            }
            let Some(kind) = reference.kind(r) else {
                continue;
            };
            if kind.is_leaf() {
                continue;
            }

            let depth = self.reference_layout.depth(r);
            let mut overlap: BTreeMap<NodeIndex, usize> = BTreeMap::new();
            for &child in reference.children(r) {
                let Some(partner) = self.mapping.comparison_for(child) else {
                    continue;
                };
                let Some(candidate) = comparison.parent(partner) else {
                    continue;
                };
                if !self.mapping.contains_comparison(candidate)
                    && comparison.kind(candidate) == Some(kind)
                    && self.comparison_layout.depth(candidate) == depth
                {
                    *overlap.entry(candidate).or_default() += 1;
                }
            }

            let mut ranked: Vec<(NodeIndex, usize)> = overlap
                .into_iter()
                .filter(|&(_, score)| score >= self.config.min_overlap)
                .collect();
            ranked.sort_by_key(|&(c, score)| (Reverse(score), c));

            for (c, score) in ranked {
                if self.insert(r, c, MatchQuality::Approximate) {
                    debug!(
                        reference = r.get(),
                        comparison = c.get(),
                        overlap = score,
                        "best-effort match"
                    );
                    self.propagate();
                    break;
                }
            }
        }
    }

    /// Forces Root ↔ Root and set ↔ set, then optionally the single child
    /// under each set pair.
    fn force_spine(&mut self) {
        let reference = self.reference;
        let comparison = self.comparison;
        let (reference_root, comparison_root) = (reference.root(), comparison.root());
        if !self.mapping.contains_reference(reference_root) {
            self.insert(reference_root, comparison_root, MatchQuality::Approximate);
        }

        for kind in [
            NodeKind::NecessarySet,
            NodeKind::SufficientSet,
            NodeKind::PropertySet,
        ] {
            let reference_sets = self.unmatched_children_of_kind(reference, reference_root, &kind, true);
            let comparison_sets = self.unmatched_children_of_kind(comparison, comparison_root, &kind, false);
            for (r, c) in reference_sets.into_iter().zip(comparison_sets) {
                self.insert(r, c, MatchQuality::Approximate);
            }
        }

        if self.config.connect_spine {
            let mut sets: Vec<NodeIndex> = reference
                .children(reference_root)
                .iter()
                .copied()
                .filter(|&r| reference.kind(r).map_or(false, NodeKind::is_set))
                .collect();
            sets.sort_unstable();
            for r in sets {
                let Some(c) = self.mapping.comparison_for(r) else {
                    continue;
                };
                let (Some(&r_child), Some(&c_child)) =
                    (reference.children(r).first(), comparison.children(c).first())
                else {
                    continue;
                };
                if !self.mapping.contains_reference(r_child) && !self.mapping.contains_comparison(c_child) {
                    self.insert(r_child, c_child, MatchQuality::Approximate);
                }
            }
        }

        self.propagate();
    }

    fn unmatched_children_of_kind(
        &self,
        expression: &LogicalExpression,
        parent: NodeIndex,
        kind: &NodeKind,
        reference_side: bool,
    ) -> Vec<NodeIndex> {
        let mut found: Vec<NodeIndex> = expression
            .children(parent)
            .iter()
            .copied()
            .filter(|&child| expression.kind(child) == Some(kind))
            .filter(|&child| {
                if reference_side {
                    !self.mapping.contains_reference(child)
                } else {
                    !self.mapping.contains_comparison(child)
                }
            })
            .collect();
        found.sort_unstable();
        found
    }

    /// Runs top-down and bottom-up propagation to a fixpoint.
    fn propagate(&mut self) {
        loop {
            while let Some(r) = self.pending.pop_front() {
                if let Some(c) = self.mapping.comparison_for(r) {
                    self.pair_children(r, c);
                }
            }
            match self.worklist.pop() {
                Some(parent) => self.try_parent(parent),
                None => break,
            }
        }
    }

    /// Pairs unmatched children of a matched pair by equal signature,
    /// ascending index on both sides.
    fn pair_children(&mut self, r: NodeIndex, c: NodeIndex) {
        let reference = self.reference;
        let comparison = self.comparison;
        let mut free: Vec<NodeIndex> = comparison
            .children(c)
            .iter()
            .copied()
            .filter(|&child| !self.mapping.contains_comparison(child))
            .collect();
        if free.is_empty() {
            return;
        }
        free.sort_unstable();

        let mut children = reference.children(r).to_vec();
        children.sort_unstable();
        for child in children {
            if self.mapping.contains_reference(child) {
                continue;
            }
            let signature = self.reference_signatures[child];
            let candidates: Vec<usize> = free
                .iter()
                .enumerate()
                .filter(|&(_, &candidate)| self.comparison_signatures[candidate] == signature)
                .map(|(position, _)| position)
                .collect();
            for position in candidates {
                if self.insert(child, free[position], MatchQuality::Exact) {
                    free.remove(position);
                    break;
                }
            }
        }
    }

    /// Matches an unmatched reference parent once all its children are
    /// exactly matched under one common comparison parent of the same shape.
    fn try_parent(&mut self, r: NodeIndex) {
        if self.mapping.contains_reference(r) {
            return;
        }
        let reference = self.reference;
        let comparison = self.comparison;
        let children = reference.children(r);

        let mut common = None;
        for &child in children {
            let Some(found) = self.mapping.correspondence(child) else {
                return;
            };
            if found.quality != MatchQuality::Exact {
                return;
            }
            let Some(parent) = comparison.parent(found.comparison) else {
                return;
            };
            match common {
                None => common = Some(parent),
                Some(existing) if existing == parent => {}
                Some(_) => return,
            }
        }
        let Some(c) = common else {
            return;
        };
        if self.mapping.contains_comparison(c)
            || comparison.children(c).len() != children.len()
            || self.reference_signatures[r] != self.comparison_signatures[c]
        {
            return;
        }
        self.insert(r, c, MatchQuality::Exact);
    }

    /// Records a pair if kinds agree and it does not invert an existing pair.
    fn insert(&mut self, r: NodeIndex, c: NodeIndex, quality: MatchQuality) -> bool {
        let reference = self.reference;
        if reference.kind(r) != self.comparison.kind(c) || self.inverted(r, c) {
            return false;
        }
        if !self.mapping.insert(r, c, quality) {
            return false;
        }
        trace!(reference = r.get(), comparison = c.get(), ?quality, "matched");

        self.pending.push_back(r);
        if let Some(parent) = reference.parent(r) {
            if !self.mapping.contains_reference(parent) {
                self.worklist.mark(parent, self.rank[parent.get() as usize]);
            }
        }
        true
    }

    fn inverted(&self, r: NodeIndex, c: NodeIndex) -> bool {
        let below = self
            .reference
            .ancestors(r)
            .filter_map(|ancestor| self.mapping.comparison_for(ancestor))
            .any(|partner| self.comparison_layout.encloses(c, partner));
        below
            || self
                .comparison
                .ancestors(c)
                .filter_map(|ancestor| self.mapping.reference_for(ancestor))
                .any(|partner| self.reference_layout.encloses(r, partner))
    }
}

/// Pre-order interval and depth of every node of one expression.
///
/// `a` encloses `b` iff `pre[a] < pre[b] < pre[a] + size[a]`, which turns the
/// ancestor test into two comparisons.
struct TreeLayout {
    pre: Vec<u32>,
    size: Vec<u32>,
    depth: Vec<u32>,
}

impl TreeLayout {
    fn new(expression: &LogicalExpression) -> Self {
        let len = expression.len();
        let mut pre = vec![0; len];
        let mut size = vec![1; len];
        let mut depth = vec![0; len];
        for (position, id) in expression.pre_order().into_iter().enumerate() {
            let slot = id.get() as usize;
            pre[slot] = position as u32;
            for child in expression.children(id) {
                depth[child.get() as usize] = depth[slot] + 1;
            }
        }
        for id in expression.post_order() {
            let below: u32 = expression
                .children(id)
                .iter()
                .map(|child| size[child.get() as usize])
                .sum();
            size[id.get() as usize] = below + 1;
        }
        Self { pre, size, depth }
    }

    fn depth(&self, node: NodeIndex) -> u32 {
        self.depth[node.get() as usize]
    }

    /// `true` if `ancestor` is a strict ancestor of `node`.
    fn encloses(&self, ancestor: NodeIndex, node: NodeIndex) -> bool {
        let (a, n) = (ancestor.get() as usize, node.get() as usize);
        self.pre[a] < self.pre[n] && self.pre[n] < self.pre[a] + self.size[a]
    }
}
