//! exprdiff: content-based correlation of description-logic expression trees.
//!
//! Two independently built expressions of the same concept definition (a
//! *reference* and a *comparison*) rarely agree on child order, node indices
//! or even grouping. This crate correlates them by content and produces:
//! - a node-to-node partial bijection (`IsomorphismMapping`),
//! - a merged expression fusing shared substructure (`MergedExpression`),
//! - diff sets of shared role groups, additions and deletions (`DiffSets`).
//!
//! # Pipeline
//!
//! 1. `fingerprint`: order-independent content signatures, bottom-up.
//! 2. `isomorphism`: unique anchoring, propagation, ambiguous pairing,
//!    best-effort overlap pairing and spine forcing.
//! 3. `merge`: deterministic merged-index assignment and child reconnection.
//! 4. `diff`: top-down classification at the highest point of divergence.
//!
//! Every stage is a pure function of its inputs; identical inputs give
//! identical mappings, merged indices, diff order and report bytes.
//!
//! # Example
//!
//! ```
//! use exprdiff::prelude::*;
//!
//! let mut b = ExpressionBuilder::new();
//! let site = b.concept(1001);
//! let role = b.some(363698007, site);
//! let set = b.necessary_set(role);
//! b.root([set]);
//! let reference = b.build()?;
//! let comparison = reference.clone();
//!
//! let result = correlate_expressions(&reference, &comparison);
//! assert!(result.mapping().is_total());
//! assert!(result.diff().is_unchanged());
//! assert_eq!(result.diff().shared_roots.len(), 1);
//! # Ok::<(), exprdiff::StructuralError>(())
//! ```

pub mod arena;
pub mod config;
pub mod core;
pub mod correlation;
pub mod diff;
pub mod display;
pub mod error;
pub mod fingerprint;
pub mod isomorphism;
pub mod merge;
pub mod report;

pub use crate::arena::{MergedIndex, NodeIndex};
pub use crate::config::CorrelationConfig;
pub use crate::core::{ConceptKey, ExpressionBuilder, ExpressionTree, Literal, LogicalExpression, NodeKind};
pub use crate::correlation::{correlate_expressions, Correlation, Correlator};
pub use crate::diff::{classify, DiffSets, SharedRoot, Side, SubtreeHandle};
pub use crate::error::{ConfigError, ReportError, StructuralError};
pub use crate::fingerprint::{signature, ContentSignature, SignatureTable};
pub use crate::isomorphism::{correlate, correlate_with, IsomorphismMapping, MatchQuality};
pub use crate::merge::{build_merged, MergedExpression, MergedNode, NodeOrigin};
pub use crate::report::CorrelationReport;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::arena::{ArenaIndex, MergedIndex, NodeIndex};
    pub use crate::config::CorrelationConfig;
    pub use crate::core::{
        ConceptKey, ExpressionBuilder, ExpressionNode, ExpressionTree, Literal, LogicalExpression,
        NodeKind,
    };
    pub use crate::correlation::{correlate_expressions, Correlation, Correlator};
    pub use crate::diff::{classify, DiffSets, SharedRoot, Side, SubtreeHandle};
    pub use crate::display::{render_diff, render_merged, render_tree, ConceptNamer, RawKeys};
    pub use crate::error::{ConfigError, ReportError, StructuralError};
    pub use crate::fingerprint::{signature, ContentSignature, HashValue, SignatureTable};
    pub use crate::isomorphism::{
        correlate, correlate_with, Correspondence, IsomorphismMapping, MatchQuality,
    };
    pub use crate::merge::{build_merged, MergedExpression, MergedNode, NodeOrigin};
    pub use crate::report::CorrelationReport;
}
