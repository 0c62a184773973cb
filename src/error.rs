//! Error types.
//!
//! Structural errors are raised while assembling an expression and are
//! fatal: a `LogicalExpression` that exists has already passed validation,
//! so the correlation pipeline itself cannot fail. Ambiguous or missing
//! matches are outcomes, not errors.

use crate::arena::NodeIndex;
use thiserror::Error;

/// A violated tree invariant in an input expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("expression has no root node")]
    MissingRoot,

    #[error("expression has more than one root: {first} and {second}")]
    MultipleRoots { first: NodeIndex, second: NodeIndex },

    #[error("node {parent} references missing child {child}")]
    DanglingChild { parent: NodeIndex, child: NodeIndex },

    #[error("{kind} node {node} cannot have {found} children")]
    ArityViolation {
        node: NodeIndex,
        kind: &'static str,
        found: usize,
    },

    #[error("root node is referenced as a child of {parent}")]
    RootHasParent { parent: NodeIndex },

    #[error("node {child} has two parents: {first_parent} and {second_parent}")]
    SharedChild {
        child: NodeIndex,
        first_parent: NodeIndex,
        second_parent: NodeIndex,
    },

    #[error("node {node} has no parent and is not the root")]
    OrphanNode { node: NodeIndex },

    #[error("cycle detected through node {node}")]
    CycleDetected { node: NodeIndex },
}

/// Invalid correlation settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("best-effort matching requires a minimum overlap of at least one child")]
    ZeroOverlap,
}

/// Failure while persisting or loading a correlation report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode report: {0}")]
    Encode(#[source] serde_cbor::Error),

    #[error("failed to decode report: {0}")]
    Decode(#[source] serde_cbor::Error),

    #[error("report i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
