//! Content signatures for expression nodes.
//!
//! A node's signature is a domain-separated SHA-256 digest of its label
//! (kind tag and payload) and the *sorted* multiset of its children's
//! signatures. Sorting makes the signature invariant under reordering of
//! unordered children, so two subtrees that differ only in child order
//! collide, and anything else almost certainly does not.
//!
//! Signatures are computed bottom-up in one post-order pass and memoized per
//! node index in a [`SignatureTable`]. Every digest is taken over a domain
//! tag and a length prefix before the payload, so a node label can never be
//! confused with a run of child signatures, and report fingerprints live in
//! a separate domain from node signatures.
//!
//! # Determinism
//! - Literal floats hash by their canonical bit pattern.
//! - Child signatures are sorted byte-wise before hashing.
//! - Table lookups and occurrence lists are ordered by node index.
//!
//! # Citations
//! - Hash trees over child digests: Merkle, "A digital signature based on a conventional encryption function" (1987)
//! - Unordered tree canonical forms: Aho, Hopcroft & Ullman, "The Design and Analysis of Computer Algorithms", Section 3.2 (1974)
//! - SHA-256: NIST FIPS 180-4 (2015)

use crate::arena::NodeIndex;
use crate::core::{ExpressionTree, LogicalExpression, NodeKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The hashed message is `b"SWF:<domain>:v1" || len(data) as u64 LE || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SWF:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 4 bytes are enough to tell nodes apart in dumps.
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}…",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Order-independent content digest of an expression subtree.
///
/// Equal signatures mean the two subtrees are interchangeable for
/// correlation, whichever tree or position they come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSignature(HashValue);

impl ContentSignature {
    /// Wraps a hash value.
    #[inline]
    pub const fn from_hash(hash: HashValue) -> Self {
        Self(hash)
    }

    /// Returns the underlying hash value.
    #[inline]
    pub const fn hash(&self) -> HashValue {
        self.0
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const NODE_DOMAIN: &[u8] = b"EXPRESSION_NODE";

/// Signature of a node with the given kind and child signatures.
///
/// `children` may be in any order; they are sorted before hashing.
///
/// # Citations
/// - Multiset hashing by sorting: Aho, Hopcroft & Ullman, "The Design and Analysis of Computer Algorithms", Example 3.2 (1974)
pub fn node_signature(kind: &NodeKind, children: &[ContentSignature]) -> ContentSignature {
    let mut sorted = children.to_vec();
    sorted.sort_unstable();

    let mut data = Vec::with_capacity(16 + sorted.len() * 32);
    kind.write_label(&mut data);
    data.extend_from_slice(&(sorted.len() as u64).to_le_bytes());
    for signature in &sorted {
        data.extend_from_slice(signature.0.as_bytes());
    }
    ContentSignature(HashValue::hash_with_domain(NODE_DOMAIN, &data))
}

/// Memoized signatures and subtree sizes for every node of one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTable {
    signatures: Vec<ContentSignature>,
    subtree_sizes: Vec<usize>,
    root: NodeIndex,
}

impl SignatureTable {
    /// Computes signatures for all nodes in one post-order pass.
    pub fn compute(expression: &LogicalExpression) -> Self {
        let len = expression.len();
        let mut signatures = vec![ContentSignature(HashValue::zero()); len];
        let mut subtree_sizes = vec![0usize; len];
        let mut child_sigs = Vec::new();

        for id in expression.post_order() {
            child_sigs.clear();
            let mut size = 1;
            for &child in expression.children(id) {
                child_sigs.push(signatures[child.get() as usize]);
                size += subtree_sizes[child.get() as usize];
            }
            // `post_order` only yields indices of live nodes.
            if let Some(kind) = expression.kind(id) {
                signatures[id.get() as usize] = node_signature(kind, &child_sigs);
            }
            subtree_sizes[id.get() as usize] = size;
        }

        Self {
            signatures,
            subtree_sizes,
            root: expression.root(),
        }
    }

    /// Signature of a node, if the index is valid.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<ContentSignature> {
        self.signatures.get(index.get() as usize).copied()
    }

    /// Number of nodes in the subtree rooted at `index` (including itself).
    #[inline]
    pub fn subtree_size(&self, index: NodeIndex) -> usize {
        self.subtree_sizes.get(index.get() as usize).copied().unwrap_or(0)
    }

    /// Signature of the whole expression.
    #[inline]
    pub fn root_signature(&self) -> ContentSignature {
        self.signatures[self.root.get() as usize]
    }

    /// Number of nodes covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Returns `true` if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Groups node indices by signature; each list is in ascending index order.
    pub fn occurrences(&self) -> BTreeMap<ContentSignature, Vec<NodeIndex>> {
        let mut groups: BTreeMap<ContentSignature, Vec<NodeIndex>> = BTreeMap::new();
        for (slot, signature) in self.signatures.iter().enumerate() {
            groups
                .entry(*signature)
                .or_default()
                .push(NodeIndex::new(slot as u32));
        }
        groups
    }
}

impl Index<NodeIndex> for SignatureTable {
    type Output = ContentSignature;

    fn index(&self, index: NodeIndex) -> &ContentSignature {
        &self.signatures[index.get() as usize]
    }
}

/// Signature of the subtree rooted at `index`, or `None` for an invalid index.
///
/// Computes only the requested subtree. Use [`SignatureTable`] when many
/// signatures of the same expression are needed.
pub fn signature(expression: &LogicalExpression, index: NodeIndex) -> Option<ContentSignature> {
    expression.kind(index)?;

    // Iterative post-order over the subtree.
    let mut memo: BTreeMap<NodeIndex, ContentSignature> = BTreeMap::new();
    let mut stack = vec![(index, false)];
    let mut child_sigs = Vec::new();
    while let Some((id, expanded)) = stack.pop() {
        let children = expression.children(id);
        if !expanded {
            stack.push((id, true));
            stack.extend(children.iter().rev().map(|&child| (child, false)));
            continue;
        }
        child_sigs.clear();
        child_sigs.extend(children.iter().filter_map(|child| memo.get(child).copied()));
        let kind = expression.kind(id)?;
        memo.insert(id, node_signature(kind, &child_sigs));
    }
    memo.get(&index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExpressionBuilder, Literal};

    fn role_group(order: &[(i32, i32)]) -> LogicalExpression {
        let mut b = ExpressionBuilder::new();
        let mut roles = Vec::new();
        for &(role, value) in order {
            let c = b.concept(value);
            roles.push(b.some(role, c));
        }
        let and = b.and(roles);
        let set = b.necessary_set(and);
        b.root([set]);
        b.build().unwrap()
    }

    #[test]
    fn child_order_does_not_matter() {
        let a = role_group(&[(1, 10), (2, 20), (3, 30)]);
        let b = role_group(&[(3, 30), (1, 10), (2, 20)]);
        let ta = SignatureTable::compute(&a);
        let tb = SignatureTable::compute(&b);
        assert_eq!(ta.root_signature(), tb.root_signature());
    }

    #[test]
    fn payload_and_kind_matter() {
        let a = role_group(&[(1, 10), (2, 20)]);
        let b = role_group(&[(1, 10), (2, 21)]);
        let c = role_group(&[(1, 10), (3, 20)]);
        let sa = SignatureTable::compute(&a).root_signature();
        assert_ne!(sa, SignatureTable::compute(&b).root_signature());
        assert_ne!(sa, SignatureTable::compute(&c).root_signature());

        let some = node_signature(&NodeKind::RoleSome { role: 1.into() }, &[]);
        let all = node_signature(&NodeKind::RoleAll { role: 1.into() }, &[]);
        assert_ne!(some, all);
        let and = node_signature(&NodeKind::And, &[some]);
        let or = node_signature(&NodeKind::Or, &[some]);
        assert_ne!(and, or);
    }

    #[test]
    fn multiplicity_matters() {
        let leaf = node_signature(&NodeKind::ConceptAssertion { concept: 5.into() }, &[]);
        let once = node_signature(&NodeKind::And, &[leaf]);
        let twice = node_signature(&NodeKind::And, &[leaf, leaf]);
        assert_ne!(once, twice);
    }

    #[test]
    fn literal_payloads_are_distinguished() {
        let int = node_signature(
            &NodeKind::LiteralAssertion {
                literal: Literal::Integer(1),
            },
            &[],
        );
        let float = node_signature(
            &NodeKind::LiteralAssertion {
                literal: Literal::float(1.0),
            },
            &[],
        );
        let text = node_signature(
            &NodeKind::LiteralAssertion {
                literal: Literal::Text("1".into()),
            },
            &[],
        );
        assert_ne!(int, float);
        assert_ne!(int, text);
        assert_ne!(float, text);
    }

    #[test]
    fn table_matches_single_node_signature() {
        let expr = role_group(&[(1, 10), (2, 20), (1, 10)]);
        let table = SignatureTable::compute(&expr);
        for node in expr.nodes() {
            assert_eq!(signature(&expr, node.index), table.get(node.index));
            assert_eq!(signature(&expr, node.index), Some(table[node.index]));
        }
        assert_eq!(signature(&expr, NodeIndex::new(99)), None);
        assert_eq!(table.subtree_size(expr.root()), expr.len());
        assert_eq!(table.subtree_size(NodeIndex::new(0)), 1);
        assert_eq!(table.subtree_size(NodeIndex::new(1)), 2);
    }

    #[test]
    fn occurrences_group_duplicates_in_index_order() {
        // Some(1)→10 appears twice: indices 0,1 and 4,5.
        let expr = role_group(&[(1, 10), (2, 20), (1, 10)]);
        let table = SignatureTable::compute(&expr);
        let groups = table.occurrences();
        assert_eq!(groups[&table[NodeIndex::new(1)]], vec![NodeIndex::new(1), NodeIndex::new(5)]);
        assert_eq!(groups[&table[NodeIndex::new(0)]], vec![NodeIndex::new(0), NodeIndex::new(4)]);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), expr.len());
    }

    #[test]
    fn signatures_are_deterministic() {
        let expr = role_group(&[(4, 40), (5, 50)]);
        assert_eq!(SignatureTable::compute(&expr), SignatureTable::compute(&expr));
        assert_eq!(
            HashValue::hash_with_domain(b"A", b"x"),
            HashValue::hash_with_domain(b"A", b"x")
        );
        assert_ne!(
            HashValue::hash_with_domain(b"A", b"x"),
            HashValue::hash_with_domain(b"B", b"x")
        );
    }
}
