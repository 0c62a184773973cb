//! End-to-end correlation of two expressions.
//!
//! `Correlator` runs signatures, solver, merge and classification in one
//! call and returns an immutable [`Correlation`] holding every result, plus
//! the index maps between reference, comparison and merged nodes.

use crate::arena::{MergedIndex, NodeIndex};
use crate::config::CorrelationConfig;
use crate::core::{ExpressionTree, LogicalExpression};
use crate::diff::{classify, DiffSets};
use crate::error::ConfigError;
use crate::fingerprint::SignatureTable;
use crate::isomorphism::{correlate_with, IsomorphismMapping};
use crate::merge::{build_merged, MergedExpression};
use crate::report::{CorrelationReport, ReportPair};
use tracing::instrument;

/// Runs the correlation pipeline with a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    config: CorrelationConfig,
}

impl Correlator {
    /// Creates a correlator, rejecting incoherent settings.
    pub fn new(config: CorrelationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active settings.
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Correlates `reference` against `comparison`.
    #[instrument(
        skip_all,
        name = "correlate",
        fields(reference_nodes = reference.len(), comparison_nodes = comparison.len())
    )]
    pub fn correlate(
        &self,
        reference: &LogicalExpression,
        comparison: &LogicalExpression,
    ) -> Correlation {
        let reference_signatures = SignatureTable::compute(reference);
        let comparison_signatures = SignatureTable::compute(comparison);
        let mapping = correlate_with(
            reference,
            comparison,
            &reference_signatures,
            &comparison_signatures,
            &self.config,
        );
        let merged = build_merged(
            reference,
            comparison,
            &reference_signatures,
            &comparison_signatures,
            &mapping,
        );
        let diff = classify(&merged, &mapping);
        Correlation {
            reference_signatures,
            comparison_signatures,
            mapping,
            merged,
            diff,
        }
    }
}

/// Correlates two expressions with default settings.
pub fn correlate_expressions(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
) -> Correlation {
    Correlator::default().correlate(reference, comparison)
}

/// Everything computed for one (reference, comparison) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    reference_signatures: SignatureTable,
    comparison_signatures: SignatureTable,
    mapping: IsomorphismMapping,
    merged: MergedExpression,
    diff: DiffSets,
}

impl Correlation {
    pub fn reference_signatures(&self) -> &SignatureTable {
        &self.reference_signatures
    }

    pub fn comparison_signatures(&self) -> &SignatureTable {
        &self.comparison_signatures
    }

    pub fn mapping(&self) -> &IsomorphismMapping {
        &self.mapping
    }

    pub fn merged(&self) -> &MergedExpression {
        &self.merged
    }

    pub fn diff(&self) -> &DiffSets {
        &self.diff
    }

    /// Comparison partner of a reference node.
    pub fn reference_to_comparison(&self, reference: NodeIndex) -> Option<NodeIndex> {
        self.mapping.comparison_for(reference)
    }

    /// Reference partner of a comparison node.
    pub fn comparison_to_reference(&self, comparison: NodeIndex) -> Option<NodeIndex> {
        self.mapping.reference_for(comparison)
    }

    /// Merged node of a reference node.
    pub fn reference_to_merged(&self, reference: NodeIndex) -> Option<MergedIndex> {
        self.merged.merged_for_reference(reference)
    }

    /// Merged node of a comparison node.
    pub fn comparison_to_merged(&self, comparison: NodeIndex) -> Option<MergedIndex> {
        self.merged.merged_for_comparison(comparison)
    }

    /// Reference origin of a merged node.
    pub fn merged_to_reference(&self, merged: MergedIndex) -> Option<NodeIndex> {
        self.merged.node(merged)?.origin.reference()
    }

    /// Comparison origin of a merged node.
    pub fn merged_to_comparison(&self, merged: MergedIndex) -> Option<NodeIndex> {
        self.merged.node(merged)?.origin.comparison()
    }

    /// Snapshot for persistence.
    pub fn report(&self) -> CorrelationReport {
        CorrelationReport {
            reference_len: self.mapping.reference_len(),
            comparison_len: self.mapping.comparison_len(),
            reference_signature: self.reference_signatures.root_signature(),
            comparison_signature: self.comparison_signatures.root_signature(),
            pairs: self
                .mapping
                .pairs()
                .map(|(reference, found)| ReportPair {
                    reference,
                    comparison: found.comparison,
                    quality: found.quality,
                })
                .collect(),
            merged_root: self.merged.root(),
            merged: self.merged.nodes().cloned().collect(),
            diff: self.diff.clone(),
        }
    }
}
