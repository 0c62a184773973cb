//! Persistable snapshot of a correlation.
//!
//! A `CorrelationReport` holds the mapping, the merged graph and the diff
//! sets as plain serde data. Encoding is deterministic (only vectors and
//! structs, no hash maps), so the CBOR bytes and the report fingerprint are
//! stable across runs and can be committed as golden fixtures.

use crate::arena::{MergedIndex, NodeIndex};
use crate::diff::DiffSets;
use crate::error::ReportError;
use crate::fingerprint::{ContentSignature, HashValue};
use crate::isomorphism::MatchQuality;
use crate::merge::MergedNode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPair {
    pub reference: NodeIndex,
    pub comparison: NodeIndex,
    pub quality: MatchQuality,
}

/// Serializable result of correlating two expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub reference_len: usize,
    pub comparison_len: usize,
    pub reference_signature: ContentSignature,
    pub comparison_signature: ContentSignature,
    /// Matched pairs by ascending reference index.
    pub pairs: Vec<ReportPair>,
    pub merged_root: MergedIndex,
    /// Merged nodes by ascending merged index.
    pub merged: Vec<MergedNode>,
    pub diff: DiffSets,
}

impl CorrelationReport {
    /// Serializes the report to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ReportError> {
        serde_cbor::to_vec(self).map_err(ReportError::Encode)
    }

    /// Deserializes a report from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ReportError> {
        serde_cbor::from_slice(bytes).map_err(ReportError::Decode)
    }

    /// Writes the report to a file as CBOR.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ReportError> {
        let bytes = self.to_cbor()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads a CBOR report from a file.
    pub fn load_from_file(path: &Path) -> Result<Self, ReportError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }

    /// Domain-separated hash of the encoded report.
    pub fn fingerprint(&self) -> Result<HashValue, ReportError> {
        let bytes = self.to_cbor()?;
        Ok(HashValue::hash_with_domain(b"CORRELATION_REPORT_V0", &bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::correlate_expressions;
    use crate::core::{ExpressionBuilder, LogicalExpression};

    fn tree(value: i32) -> LogicalExpression {
        let mut b = ExpressionBuilder::new();
        let c1 = b.concept(1);
        let v = b.concept(value);
        let some = b.some(3, v);
        let and = b.and([c1, some]);
        let set = b.sufficient_set(and);
        b.root([set]);
        b.build().unwrap()
    }

    #[test]
    fn cbor_round_trip_preserves_report_and_fingerprint() {
        let report = correlate_expressions(&tree(10), &tree(11)).report();
        let bytes = report.to_cbor().expect("encode");
        let decoded = CorrelationReport::from_cbor(&bytes).expect("decode");
        assert_eq!(decoded, report);
        assert_eq!(decoded.fingerprint().unwrap(), report.fingerprint().unwrap());
        assert_eq!(decoded.to_cbor().unwrap(), bytes);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let same = correlate_expressions(&tree(10), &tree(10)).report();
        let changed = correlate_expressions(&tree(10), &tree(11)).report();
        assert_ne!(same.fingerprint().unwrap(), changed.fingerprint().unwrap());
        assert_eq!(
            same.fingerprint().unwrap(),
            correlate_expressions(&tree(10), &tree(10)).report().fingerprint().unwrap()
        );
    }

    #[test]
    fn file_round_trip() {
        let report = correlate_expressions(&tree(10), &tree(12)).report();
        let path = std::env::temp_dir().join(format!("exprdiff-report-{}.cbor", std::process::id()));
        report.save_to_file(&path).expect("save");
        let loaded = CorrelationReport::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, report);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            CorrelationReport::from_cbor(&[0xff, 0x00]),
            Err(ReportError::Decode(_))
        ));
        let missing = std::env::temp_dir().join("exprdiff-report-does-not-exist.cbor");
        assert!(matches!(
            CorrelationReport::load_from_file(&missing),
            Err(ReportError::Io(_))
        ));
    }
}
