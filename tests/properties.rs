//! Property-based tests for correlation invariants.
//!
//! Random expressions are generated from a small recursive shape grammar
//! (concepts, role restrictions, conjunctions, disjunctions) with a narrow
//! key range, so duplicates and partial overlaps are common.

use exprdiff::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

// ===== Strategies for generating test data =====

#[derive(Debug, Clone)]
enum Shape {
    Concept(i32),
    Some(i32, Box<Shape>),
    All(i32, Box<Shape>),
    And(Vec<Shape>),
    Or(Vec<Shape>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = (0..6i32).prop_map(Shape::Concept);
    leaf.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (0..4i32, inner.clone()).prop_map(|(role, child)| Shape::Some(role, Box::new(child))),
            (0..2i32, inner.clone()).prop_map(|(role, child)| Shape::All(role, Box::new(child))),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::And),
            prop::collection::vec(inner, 1..3).prop_map(Shape::Or),
        ]
    })
}

fn arb_conjuncts() -> impl Strategy<Value = Vec<Shape>> {
    prop::collection::vec(arb_shape(), 1..5)
}

/// Reverses every unordered child list, recursively.
fn mirror(shape: &Shape) -> Shape {
    match shape {
        Shape::Concept(key) => Shape::Concept(*key),
        Shape::Some(role, child) => Shape::Some(*role, Box::new(mirror(child))),
        Shape::All(role, child) => Shape::All(*role, Box::new(mirror(child))),
        Shape::And(children) => Shape::And(children.iter().rev().map(mirror).collect()),
        Shape::Or(children) => Shape::Or(children.iter().rev().map(mirror).collect()),
    }
}

fn emit(b: &mut ExpressionBuilder, shape: &Shape) -> NodeIndex {
    match shape {
        Shape::Concept(key) => b.concept(*key),
        Shape::Some(role, child) => {
            let child = emit(b, child);
            b.some(*role, child)
        }
        Shape::All(role, child) => {
            let child = emit(b, child);
            b.all(*role, child)
        }
        Shape::And(children) => {
            let children: Vec<_> = children.iter().map(|child| emit(b, child)).collect();
            b.and(children)
        }
        Shape::Or(children) => {
            let children: Vec<_> = children.iter().map(|child| emit(b, child)).collect();
            b.or(children)
        }
    }
}

/// Root → Necessary set → And[conjuncts]
fn expression(conjuncts: &[Shape]) -> LogicalExpression {
    let mut b = ExpressionBuilder::new();
    let children: Vec<_> = conjuncts.iter().map(|shape| emit(&mut b, shape)).collect();
    let and = b.and(children);
    let set = b.necessary_set(and);
    b.root([set]);
    b.build().expect("generated expressions are well-formed")
}

fn mirrored(conjuncts: &[Shape]) -> LogicalExpression {
    let reversed: Vec<Shape> = conjuncts.iter().rev().map(mirror).collect();
    expression(&reversed)
}

// ===== Property Tests =====

proptest! {
    #[test]
    fn prop_reflexive(conjuncts in arb_conjuncts()) {
        let tree = expression(&conjuncts);
        let result = correlate_expressions(&tree, &tree);
        prop_assert!(result.mapping().is_total());
        prop_assert_eq!(result.mapping().approximate_count(), 0);
        for (r, found) in result.mapping().pairs() {
            prop_assert_eq!(r, found.comparison);
        }
        prop_assert!(result.diff().is_unchanged());
    }

    #[test]
    fn prop_order_invariant(conjuncts in arb_conjuncts()) {
        let reference = expression(&conjuncts);
        let comparison = mirrored(&conjuncts);
        let result = correlate_expressions(&reference, &comparison);
        prop_assert!(result.mapping().is_total());
        prop_assert_eq!(result.mapping().approximate_count(), 0);
        prop_assert!(result.diff().is_unchanged());
        prop_assert_eq!(
            result.reference_signatures().root_signature(),
            result.comparison_signatures().root_signature()
        );
    }

    #[test]
    fn prop_bijection_and_kinds(left in arb_conjuncts(), right in arb_conjuncts()) {
        let reference = expression(&left);
        let comparison = expression(&right);
        let result = correlate_expressions(&reference, &comparison);
        let mapping = result.mapping();

        let mut seen = BTreeSet::new();
        for (r, found) in mapping.pairs() {
            prop_assert!(seen.insert(found.comparison), "comparison node mapped twice");
            prop_assert_eq!(mapping.reference_for(found.comparison), Some(r));
            prop_assert_eq!(reference.kind(r), comparison.kind(found.comparison));
            if found.quality == MatchQuality::Exact {
                prop_assert_eq!(
                    result.reference_signatures()[r],
                    result.comparison_signatures()[found.comparison]
                );
            }
        }
        prop_assert_eq!(mapping.comparison_for(reference.root()), Some(comparison.root()));
    }

    #[test]
    fn prop_no_ancestor_inversion(left in arb_conjuncts(), right in arb_conjuncts()) {
        let reference = expression(&left);
        let comparison = expression(&right);
        let mapping = correlate(&reference, &comparison);
        for (r, found) in mapping.pairs() {
            for ancestor in reference.ancestors(r) {
                if let Some(partner) = mapping.comparison_for(ancestor) {
                    prop_assert!(!comparison.is_ancestor(found.comparison, partner));
                }
            }
        }
    }

    #[test]
    fn prop_merge_complete(left in arb_conjuncts(), right in arb_conjuncts()) {
        let reference = expression(&left);
        let comparison = expression(&right);
        let result = correlate_expressions(&reference, &comparison);
        let merged = result.merged();

        for r in 0..reference.len() as u32 {
            let r = NodeIndex::new(r);
            let m = result.reference_to_merged(r);
            prop_assert!(m.is_some());
            prop_assert_eq!(m.and_then(|m| result.merged_to_reference(m)), Some(r));
            if let Some(c) = result.reference_to_comparison(r) {
                prop_assert_eq!(result.comparison_to_merged(c), m);
            }
        }
        for c in 0..comparison.len() as u32 {
            let c = NodeIndex::new(c);
            let m = result.comparison_to_merged(c);
            prop_assert!(m.is_some());
            prop_assert_eq!(m.and_then(|m| result.merged_to_comparison(m)), Some(c));
        }
        prop_assert_eq!(
            merged.len(),
            reference.len() + comparison.len() - result.mapping().len() + merged.synthetic_count()
        );
        // Every merged node is reachable from the merged root.
        prop_assert_eq!(merged.pre_order().len(), merged.len());
    }

    #[test]
    fn prop_signatures_deterministic(conjuncts in arb_conjuncts()) {
        let tree = expression(&conjuncts);
        let first = SignatureTable::compute(&tree);
        let second = SignatureTable::compute(&tree);
        prop_assert_eq!(&first, &second);
        for node in tree.nodes() {
            prop_assert_eq!(signature(&tree, node.index), first.get(node.index));
        }
    }

    #[test]
    fn prop_diff_sides_are_consistent(left in arb_conjuncts(), right in arb_conjuncts()) {
        let reference = expression(&left);
        let comparison = expression(&right);
        let result = correlate_expressions(&reference, &comparison);
        let mapping = result.mapping();
        let diff = result.diff();

        let deleted: BTreeSet<_> = diff.deletion_origins().into_iter().collect();
        let added: BTreeSet<_> = diff.addition_origins().into_iter().collect();
        prop_assert_eq!(deleted.len(), diff.deletions.len());
        prop_assert_eq!(added.len(), diff.additions.len());

        for handle in &diff.deletions {
            prop_assert_eq!(handle.side, Side::Reference);
            prop_assert_ne!(mapping.quality(handle.origin), Some(MatchQuality::Exact));
        }
        for handle in &diff.additions {
            prop_assert_eq!(handle.side, Side::Comparison);
            let partner = mapping.reference_for(handle.origin);
            prop_assert_ne!(partner.and_then(|r| mapping.quality(r)), Some(MatchQuality::Exact));
        }
        let roots: BTreeSet<_> = diff.shared_roots.iter().map(|root| root.signature).collect();
        prop_assert_eq!(roots.len(), diff.shared_roots.len());
        for root in &diff.shared_roots {
            prop_assert!(root.kind.is_role());
            prop_assert_eq!(mapping.comparison_for(root.reference), Some(root.comparison));
        }
    }

    #[test]
    fn prop_report_round_trip(left in arb_conjuncts(), right in arb_conjuncts()) {
        let report = correlate_expressions(&expression(&left), &expression(&right)).report();
        let bytes = report.to_cbor().unwrap();
        let decoded = CorrelationReport::from_cbor(&bytes).unwrap();
        prop_assert_eq!(decoded.fingerprint().unwrap(), report.fingerprint().unwrap());
        prop_assert_eq!(decoded, report);
    }
}
