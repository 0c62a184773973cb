//! Core data structures for logical expressions.
//!
//! An expression is an immutable tree of typed nodes stored in an arena.
//! Each node has a tree-local `NodeIndex`, a `NodeKind` carrying whatever
//! payload that kind needs, and a list of child indices. Children of every
//! interior kind have set semantics: their order carries no meaning.
//!
//! # Invariants
//! - Exactly one `Root` node exists.
//! - Every non-root node has exactly one parent and is reachable from the root.
//! - Each node's child count satisfies its kind's [`Arity`].
//!
//! These are checked once, when the expression is assembled; the rest of the
//! crate relies on them without re-checking.

use crate::arena::{ArenaIndex, NodeArena, NodeIndex};
use crate::error::StructuralError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key of a referenced concept or role type.
///
/// Content equality between expressions is decided on these keys, never on
/// display names.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptKey(i32);

impl ConceptKey {
    /// Creates a key from its raw value.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

impl From<i32> for ConceptKey {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Literal value asserted by a `LiteralAssertion` node.
///
/// Floats are stored as a canonical bit pattern so that literals are `Eq`
/// and `Hash`: `-0.0` is stored as `0.0` and every NaN as the same NaN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Text(String),
}

impl Literal {
    /// Creates a float literal with canonical bits.
    pub fn float(value: f64) -> Self {
        let canonical = if value == 0.0 {
            0.0f64
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        Literal::Float(canonical.to_bits())
    }

    /// Returns the float value, if this is a float literal.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(value) => write!(f, "{}", value),
            Literal::Integer(value) => write!(f, "{}", value),
            Literal::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Literal::Text(value) => write!(f, "{:?}", value),
        }
    }
}

/// Number of children a node kind admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No children.
    Leaf,
    /// Exactly one child.
    Single,
    /// One or more children.
    AtLeastOne,
}

impl Arity {
    /// Returns `true` if `count` children satisfy this arity.
    #[inline]
    pub fn admits(self, count: usize) -> bool {
        match self {
            Arity::Leaf => count == 0,
            Arity::Single => count == 1,
            Arity::AtLeastOne => count >= 1,
        }
    }
}

/// Kind of an expression node, with the payload that kind carries.
///
/// Two nodes with equal `NodeKind` have the same *label*: they differ at
/// most in their children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Top of the definition; children are definition sets.
    Root,
    /// Necessary conditions of the concept.
    NecessarySet,
    /// Sufficient (defining) conditions of the concept.
    SufficientSet,
    /// Property (role) definition set.
    PropertySet,
    /// Unordered conjunction.
    And,
    /// Unordered disjunction.
    Or,
    /// Disjointness axiom over its children.
    DisjointWith,
    /// Existential restriction `∃role.child`.
    RoleSome { role: ConceptKey },
    /// Universal restriction `∀role.child`.
    RoleAll { role: ConceptKey },
    /// Reference to a concept.
    ConceptAssertion { concept: ConceptKey },
    /// Literal value.
    LiteralAssertion { literal: Literal },
}

impl NodeKind {
    /// Human-readable kind name (without payload).
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::NecessarySet => "Necessary set",
            NodeKind::SufficientSet => "Sufficient set",
            NodeKind::PropertySet => "Property set",
            NodeKind::And => "And",
            NodeKind::Or => "Or",
            NodeKind::DisjointWith => "Disjoint with",
            NodeKind::RoleSome { .. } => "Some",
            NodeKind::RoleAll { .. } => "All",
            NodeKind::ConceptAssertion { .. } => "Concept",
            NodeKind::LiteralAssertion { .. } => "Literal",
        }
    }

    /// Child-count rule for this kind.
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Root | NodeKind::And | NodeKind::Or | NodeKind::DisjointWith => {
                Arity::AtLeastOne
            }
            NodeKind::NecessarySet
            | NodeKind::SufficientSet
            | NodeKind::PropertySet
            | NodeKind::RoleSome { .. }
            | NodeKind::RoleAll { .. } => Arity::Single,
            NodeKind::ConceptAssertion { .. } | NodeKind::LiteralAssertion { .. } => Arity::Leaf,
        }
    }

    /// Returns `true` for role restrictions (`Some`, `All`).
    #[inline]
    pub fn is_role(&self) -> bool {
        matches!(self, NodeKind::RoleSome { .. } | NodeKind::RoleAll { .. })
    }

    /// Returns `true` for definition sets.
    #[inline]
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            NodeKind::NecessarySet | NodeKind::SufficientSet | NodeKind::PropertySet
        )
    }

    /// Returns `true` for assertion leaves.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.arity() == Arity::Leaf
    }

    /// Role type key for role restrictions.
    pub fn role(&self) -> Option<ConceptKey> {
        match self {
            NodeKind::RoleSome { role } | NodeKind::RoleAll { role } => Some(*role),
            _ => None,
        }
    }

    /// Referenced concept key for concept assertions.
    pub fn concept(&self) -> Option<ConceptKey> {
        match self {
            NodeKind::ConceptAssertion { concept } => Some(*concept),
            _ => None,
        }
    }

    /// Appends the canonical label bytes (kind tag and payload) to `out`.
    pub(crate) fn write_label(&self, out: &mut Vec<u8>) {
        match self {
            NodeKind::Root => out.push(0x01),
            NodeKind::NecessarySet => out.push(0x02),
            NodeKind::SufficientSet => out.push(0x03),
            NodeKind::PropertySet => out.push(0x04),
            NodeKind::And => out.push(0x10),
            NodeKind::Or => out.push(0x11),
            NodeKind::DisjointWith => out.push(0x12),
            NodeKind::RoleSome { role } => {
                out.push(0x20);
                out.extend_from_slice(&role.get().to_le_bytes());
            }
            NodeKind::RoleAll { role } => {
                out.push(0x21);
                out.extend_from_slice(&role.get().to_le_bytes());
            }
            NodeKind::ConceptAssertion { concept } => {
                out.push(0x30);
                out.extend_from_slice(&concept.get().to_le_bytes());
            }
            NodeKind::LiteralAssertion { literal } => {
                out.push(0x31);
                match literal {
                    Literal::Boolean(value) => {
                        out.push(0x00);
                        out.push(u8::from(*value));
                    }
                    Literal::Integer(value) => {
                        out.push(0x01);
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                    Literal::Float(bits) => {
                        out.push(0x02);
                        out.extend_from_slice(&bits.to_le_bytes());
                    }
                    Literal::Text(value) => {
                        out.push(0x03);
                        out.extend_from_slice(&(value.len() as u64).to_le_bytes());
                        out.extend_from_slice(value.as_bytes());
                    }
                }
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::RoleSome { role } | NodeKind::RoleAll { role } => {
                write!(f, "{} role {}", self.name(), role)
            }
            NodeKind::ConceptAssertion { concept } => write!(f, "{} {}", self.name(), concept),
            NodeKind::LiteralAssertion { literal } => write!(f, "{} {}", self.name(), literal),
            _ => f.write_str(self.name()),
        }
    }
}

/// A node in a logical expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpressionNode {
    /// Position in the owning expression.
    pub index: NodeIndex,
    /// Kind and payload.
    pub kind: NodeKind,
    /// Child indices within the same expression (set semantics).
    pub children: Vec<NodeIndex>,
}

/// Uniform read-only traversal over expression-shaped graphs.
///
/// Implemented by input expressions and by merged expressions. Traversals
/// visit each node once even when a node is reachable through several
/// parents, and never loop.
pub trait ExpressionTree {
    /// Index type addressing nodes of this graph.
    type Index: ArenaIndex;

    /// Index of the root node.
    fn root(&self) -> Self::Index;

    /// Number of nodes.
    fn len(&self) -> usize;

    /// Returns `true` if the graph has no nodes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind of a node, if `index` is valid.
    fn kind(&self, index: Self::Index) -> Option<&NodeKind>;

    /// Children of a node; empty for leaves and invalid indices.
    fn children(&self, index: Self::Index) -> &[Self::Index];

    /// Nodes reachable from the root, parents before children, children in
    /// stored order.
    fn pre_order(&self) -> Vec<Self::Index> {
        let mut seen = vec![false; self.len()];
        let mut order = Vec::with_capacity(self.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let slot = id.as_usize();
            if slot >= seen.len() || seen[slot] {
                continue;
            }
            seen[slot] = true;
            order.push(id);
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Nodes reachable from the root, children before parents, children in
    /// stored order.
    fn post_order(&self) -> Vec<Self::Index> {
        let mut seen = vec![false; self.len()];
        let mut order = Vec::with_capacity(self.len());
        let mut stack = vec![(self.root(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            let slot = id.as_usize();
            if slot >= seen.len() || seen[slot] {
                continue;
            }
            seen[slot] = true;
            stack.push((id, true));
            for &child in self.children(id).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}

/// An immutable, validated logical expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalExpression {
    nodes: NodeArena<NodeIndex, ExpressionNode>,
    parents: Vec<Option<NodeIndex>>,
    root: NodeIndex,
}

impl LogicalExpression {
    /// Assembles an expression from `(kind, children)` pairs, where the
    /// position of a pair is the node's index.
    ///
    /// Fails if the nodes do not form a single tree under one `Root`.
    pub fn from_nodes(nodes: Vec<(NodeKind, Vec<NodeIndex>)>) -> Result<Self, StructuralError> {
        let len = nodes.len();
        let mut root = None;
        for (slot, (kind, children)) in nodes.iter().enumerate() {
            let index = NodeIndex::new(slot as u32);
            if let Some(&child) = children.iter().find(|child| child.as_usize() >= len) {
                return Err(StructuralError::DanglingChild { parent: index, child });
            }
            if !kind.arity().admits(children.len()) {
                return Err(StructuralError::ArityViolation {
                    node: index,
                    kind: kind.name(),
                    found: children.len(),
                });
            }
            if *kind == NodeKind::Root {
                match root {
                    None => root = Some(index),
                    Some(first) => {
                        return Err(StructuralError::MultipleRoots { first, second: index })
                    }
                }
            }
        }
        let root = root.ok_or(StructuralError::MissingRoot)?;

        let mut parents: Vec<Option<NodeIndex>> = vec![None; len];
        for (slot, (_, children)) in nodes.iter().enumerate() {
            let parent = NodeIndex::new(slot as u32);
            for &child in children {
                if child == root {
                    return Err(StructuralError::RootHasParent { parent });
                }
                if child == parent {
                    return Err(StructuralError::CycleDetected { node: parent });
                }
                match parents[child.as_usize()] {
                    Some(first_parent) => {
                        return Err(StructuralError::SharedChild {
                            child,
                            first_parent,
                            second_parent: parent,
                        })
                    }
                    None => parents[child.as_usize()] = Some(parent),
                }
            }
        }
        if let Some(slot) = (0..len).find(|&slot| slot != root.as_usize() && parents[slot].is_none()) {
            return Err(StructuralError::OrphanNode {
                node: NodeIndex::new(slot as u32),
            });
        }

        // Single parents everywhere: anything unreachable from the root hangs
        // off a cycle.
        let mut reached = vec![false; len];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if reached[id.as_usize()] {
                continue;
            }
            reached[id.as_usize()] = true;
            stack.extend(nodes[id.as_usize()].1.iter().copied());
        }
        if let Some(slot) = reached.iter().position(|&r| !r) {
            return Err(StructuralError::CycleDetected {
                node: NodeIndex::new(slot as u32),
            });
        }

        let mut arena = NodeArena::with_capacity(len);
        for (kind, children) in nodes {
            let index = arena.next_index();
            arena.allocate(ExpressionNode {
                index,
                kind,
                children,
            });
        }
        Ok(Self {
            nodes: arena,
            parents,
            root,
        })
    }

    /// Looks up a node by index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> Option<&ExpressionNode> {
        self.nodes.get(index)
    }

    /// Iterates over all nodes by ascending index.
    pub fn nodes(&self) -> impl Iterator<Item = &ExpressionNode> {
        self.nodes.iter().map(|(_, node)| node)
    }

    /// Parent of a node; `None` for the root and invalid indices.
    #[inline]
    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.parents.get(index.as_usize()).copied().flatten()
    }

    /// Iterates over the strict ancestors of a node, nearest first.
    pub fn ancestors(&self, index: NodeIndex) -> Ancestors<'_> {
        Ancestors {
            expression: self,
            next: self.parent(index),
        }
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeIndex, node: NodeIndex) -> bool {
        self.ancestors(node).any(|id| id == ancestor)
    }

    /// Number of edges between the root and `index`.
    pub fn depth(&self, index: NodeIndex) -> usize {
        self.ancestors(index).count()
    }
}

impl ExpressionTree for LogicalExpression {
    type Index = NodeIndex;

    #[inline]
    fn root(&self) -> NodeIndex {
        self.root
    }

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn kind(&self, index: NodeIndex) -> Option<&NodeKind> {
        self.nodes.get(index).map(|node| &node.kind)
    }

    #[inline]
    fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }
}

/// Iterator over the ancestors of a node. See [`LogicalExpression::ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    expression: &'a LogicalExpression,
    next: Option<NodeIndex>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        self.next = self.expression.parent(current);
        Some(current)
    }
}

/// Index-level assembler for [`LogicalExpression`].
///
/// Nodes are appended bottom-up; each method returns the new node's index
/// for use as a child of later nodes. Nothing is validated until
/// [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ExpressionBuilder {
    nodes: Vec<(NodeKind, Vec<NodeIndex>)>,
}

impl ExpressionBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node of any kind.
    pub fn push(
        &mut self,
        kind: NodeKind,
        children: impl IntoIterator<Item = NodeIndex>,
    ) -> NodeIndex {
        let index = NodeIndex::new(self.nodes.len() as u32);
        self.nodes.push((kind, children.into_iter().collect()));
        index
    }

    /// Appends a concept assertion leaf.
    pub fn concept(&mut self, concept: impl Into<ConceptKey>) -> NodeIndex {
        self.push(
            NodeKind::ConceptAssertion {
                concept: concept.into(),
            },
            [],
        )
    }

    /// Appends a literal assertion leaf.
    pub fn literal(&mut self, literal: Literal) -> NodeIndex {
        self.push(NodeKind::LiteralAssertion { literal }, [])
    }

    /// Appends an existential role restriction.
    pub fn some(&mut self, role: impl Into<ConceptKey>, child: NodeIndex) -> NodeIndex {
        self.push(NodeKind::RoleSome { role: role.into() }, [child])
    }

    /// Appends a universal role restriction.
    pub fn all(&mut self, role: impl Into<ConceptKey>, child: NodeIndex) -> NodeIndex {
        self.push(NodeKind::RoleAll { role: role.into() }, [child])
    }

    /// Appends a conjunction.
    pub fn and(&mut self, children: impl IntoIterator<Item = NodeIndex>) -> NodeIndex {
        self.push(NodeKind::And, children)
    }

    /// Appends a disjunction.
    pub fn or(&mut self, children: impl IntoIterator<Item = NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Or, children)
    }

    /// Appends a disjointness axiom.
    pub fn disjoint(&mut self, children: impl IntoIterator<Item = NodeIndex>) -> NodeIndex {
        self.push(NodeKind::DisjointWith, children)
    }

    /// Appends a necessary set.
    pub fn necessary_set(&mut self, child: NodeIndex) -> NodeIndex {
        self.push(NodeKind::NecessarySet, [child])
    }

    /// Appends a sufficient set.
    pub fn sufficient_set(&mut self, child: NodeIndex) -> NodeIndex {
        self.push(NodeKind::SufficientSet, [child])
    }

    /// Appends a property set.
    pub fn property_set(&mut self, child: NodeIndex) -> NodeIndex {
        self.push(NodeKind::PropertySet, [child])
    }

    /// Appends the root.
    pub fn root(&mut self, children: impl IntoIterator<Item = NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Root, children)
    }

    /// Number of nodes appended so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validates and freezes the expression.
    pub fn build(self) -> Result<LogicalExpression, StructuralError> {
        LogicalExpression::from_nodes(self.nodes)
    }
}
