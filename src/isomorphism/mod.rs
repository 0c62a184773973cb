//! Node-to-node correspondence between two expressions.
//!
//! [`correlate`] finds a partial bijection between the nodes of a reference
//! and a comparison expression. Matched nodes either have equal content
//! signatures ([`MatchQuality::Exact`]) or were paired by the best-effort
//! and spine passes to keep the merge connected
//! ([`MatchQuality::Approximate`]).
//!
//! Nodes left unmatched are not an error: they are the content that was
//! added or removed between the two expressions.

mod solver;
mod worklist;

use crate::arena::NodeIndex;
use crate::config::CorrelationConfig;
use crate::core::LogicalExpression;
use crate::fingerprint::SignatureTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a pair of nodes was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchQuality {
    /// Equal content signatures.
    Exact,
    /// Paired by structural overlap or spine forcing; contents may differ.
    Approximate,
}

/// Comparison-side partner of a matched reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Correspondence {
    pub comparison: NodeIndex,
    pub quality: MatchQuality,
}

/// Partial bijection between reference and comparison node indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsomorphismMapping {
    forward: Vec<Option<Correspondence>>,
    backward: Vec<Option<NodeIndex>>,
}

impl IsomorphismMapping {
    /// Creates an empty mapping between expressions of the given sizes.
    pub fn new(reference_len: usize, comparison_len: usize) -> Self {
        Self {
            forward: vec![None; reference_len],
            backward: vec![None; comparison_len],
        }
    }

    /// Records a pair.
    ///
    /// Returns `false` and leaves the mapping unchanged if either index is out
    /// of range or already matched.
    pub fn insert(
        &mut self,
        reference: NodeIndex,
        comparison: NodeIndex,
        quality: MatchQuality,
    ) -> bool {
        let (r, c) = (reference.get() as usize, comparison.get() as usize);
        match (self.forward.get(r), self.backward.get(c)) {
            (Some(None), Some(None)) => {
                self.forward[r] = Some(Correspondence {
                    comparison,
                    quality,
                });
                self.backward[c] = Some(reference);
                true
            }
            _ => false,
        }
    }

    /// Full correspondence of a reference node.
    #[inline]
    pub fn correspondence(&self, reference: NodeIndex) -> Option<Correspondence> {
        self.forward.get(reference.get() as usize).copied().flatten()
    }

    /// Comparison partner of a reference node.
    #[inline]
    pub fn comparison_for(&self, reference: NodeIndex) -> Option<NodeIndex> {
        self.correspondence(reference).map(|c| c.comparison)
    }

    /// Reference partner of a comparison node.
    #[inline]
    pub fn reference_for(&self, comparison: NodeIndex) -> Option<NodeIndex> {
        self.backward.get(comparison.get() as usize).copied().flatten()
    }

    /// Match quality of a reference node, if matched.
    #[inline]
    pub fn quality(&self, reference: NodeIndex) -> Option<MatchQuality> {
        self.correspondence(reference).map(|c| c.quality)
    }

    /// Returns `true` if the reference node is matched.
    #[inline]
    pub fn contains_reference(&self, reference: NodeIndex) -> bool {
        self.correspondence(reference).is_some()
    }

    /// Returns `true` if the comparison node is matched.
    #[inline]
    pub fn contains_comparison(&self, comparison: NodeIndex) -> bool {
        self.reference_for(comparison).is_some()
    }

    /// Matched pairs by ascending reference index.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeIndex, Correspondence)> + '_ {
        self.forward
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|c| (NodeIndex::new(slot as u32), c)))
    }

    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.forward.iter().filter(|entry| entry.is_some()).count()
    }

    /// Returns `true` if nothing is matched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of exact pairs.
    pub fn exact_count(&self) -> usize {
        self.pairs()
            .filter(|(_, c)| c.quality == MatchQuality::Exact)
            .count()
    }

    /// Number of approximate pairs.
    pub fn approximate_count(&self) -> usize {
        self.len() - self.exact_count()
    }

    /// Size of the reference expression.
    pub fn reference_len(&self) -> usize {
        self.forward.len()
    }

    /// Size of the comparison expression.
    pub fn comparison_len(&self) -> usize {
        self.backward.len()
    }

    /// Unmatched reference nodes, ascending.
    pub fn unmatched_reference(&self) -> Vec<NodeIndex> {
        (0..self.forward.len() as u32)
            .map(NodeIndex::new)
            .filter(|&r| !self.contains_reference(r))
            .collect()
    }

    /// Unmatched comparison nodes, ascending.
    pub fn unmatched_comparison(&self) -> Vec<NodeIndex> {
        (0..self.backward.len() as u32)
            .map(NodeIndex::new)
            .filter(|&c| !self.contains_comparison(c))
            .collect()
    }

    /// Returns `true` if every node on both sides is matched.
    pub fn is_total(&self) -> bool {
        self.forward.iter().all(Option::is_some) && self.backward.iter().all(Option::is_some)
    }

    /// Reference → comparison index map.
    pub fn reference_to_comparison(&self) -> BTreeMap<NodeIndex, NodeIndex> {
        self.pairs().map(|(r, c)| (r, c.comparison)).collect()
    }

    /// Comparison → reference index map.
    pub fn comparison_to_reference(&self) -> BTreeMap<NodeIndex, NodeIndex> {
        self.pairs().map(|(r, c)| (c.comparison, r)).collect()
    }
}

impl fmt::Display for IsomorphismMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (reference, c) in self.pairs() {
            let marker = match c.quality {
                MatchQuality::Exact => "",
                MatchQuality::Approximate => "*",
            };
            writeln!(f, "{} -> {}{}", reference, c.comparison, marker)?;
        }
        Ok(())
    }
}

/// Correlates two expressions with default settings.
pub fn correlate(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
) -> IsomorphismMapping {
    let reference_signatures = SignatureTable::compute(reference);
    let comparison_signatures = SignatureTable::compute(comparison);
    correlate_with(
        reference,
        comparison,
        &reference_signatures,
        &comparison_signatures,
        &CorrelationConfig::default(),
    )
}

/// Correlates two expressions using precomputed signature tables.
///
/// The tables must have been computed from the same expressions.
pub fn correlate_with(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    reference_signatures: &SignatureTable,
    comparison_signatures: &SignatureTable,
    config: &CorrelationConfig,
) -> IsomorphismMapping {
    solver::Solver::new(
        reference,
        comparison,
        reference_signatures,
        comparison_signatures,
        config,
    )
    .solve()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(raw: u32) -> NodeIndex {
        NodeIndex::new(raw)
    }

    #[test]
    fn insert_keeps_bijection() {
        let mut mapping = IsomorphismMapping::new(3, 3);
        assert!(mapping.insert(idx(0), idx(1), MatchQuality::Exact));
        assert!(!mapping.insert(idx(0), idx(2), MatchQuality::Exact));
        assert!(!mapping.insert(idx(2), idx(1), MatchQuality::Exact));
        assert!(!mapping.insert(idx(5), idx(0), MatchQuality::Exact));
        assert!(!mapping.insert(idx(1), idx(5), MatchQuality::Exact));
        assert!(mapping.insert(idx(2), idx(0), MatchQuality::Approximate));

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.exact_count(), 1);
        assert_eq!(mapping.approximate_count(), 1);
        assert_eq!(mapping.comparison_for(idx(0)), Some(idx(1)));
        assert_eq!(mapping.reference_for(idx(1)), Some(idx(0)));
        assert_eq!(mapping.reference_for(idx(2)), None);
        assert_eq!(mapping.quality(idx(2)), Some(MatchQuality::Approximate));
        assert_eq!(mapping.unmatched_reference(), vec![idx(1)]);
        assert_eq!(mapping.unmatched_comparison(), vec![idx(2)]);
        assert!(!mapping.is_total());
    }

    #[test]
    fn index_maps_are_inverse() {
        let mut mapping = IsomorphismMapping::new(2, 2);
        mapping.insert(idx(0), idx(1), MatchQuality::Exact);
        mapping.insert(idx(1), idx(0), MatchQuality::Exact);
        assert!(mapping.is_total());
        let forward = mapping.reference_to_comparison();
        let backward = mapping.comparison_to_reference();
        for (r, c) in &forward {
            assert_eq!(backward[c], *r);
        }
    }

    #[test]
    fn display_flags_approximate_pairs() {
        let mut mapping = IsomorphismMapping::new(2, 2);
        mapping.insert(idx(0), idx(0), MatchQuality::Exact);
        mapping.insert(idx(1), idx(1), MatchQuality::Approximate);
        assert_eq!(mapping.to_string(), "[0] -> [0]\n[1] -> [1]*\n");
    }
}
