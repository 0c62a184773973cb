//! Text dumps of expressions, mappings and diffs.
//!
//! Concept and role keys are resolved to names through the [`ConceptNamer`]
//! seam; keys without a name are printed as their raw value.

use crate::arena::{ArenaIndex, NodeIndex};
use crate::core::{ConceptKey, ExpressionTree, LogicalExpression, NodeKind};
use crate::diff::{DiffSets, SharedRoot, SubtreeHandle};
use crate::isomorphism::{IsomorphismMapping, MatchQuality};
use crate::merge::{MergedExpression, NodeOrigin};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};

/// Resolves concept and role keys to display names.
pub trait ConceptNamer {
    fn name(&self, key: ConceptKey) -> Option<&str>;
}

/// Namer that knows no names; every key prints as its raw value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawKeys;

impl ConceptNamer for RawKeys {
    fn name(&self, _key: ConceptKey) -> Option<&str> {
        None
    }
}

impl ConceptNamer for HashMap<ConceptKey, String> {
    fn name(&self, key: ConceptKey) -> Option<&str> {
        self.get(&key).map(String::as_str)
    }
}

impl ConceptNamer for BTreeMap<ConceptKey, String> {
    fn name(&self, key: ConceptKey) -> Option<&str> {
        self.get(&key).map(String::as_str)
    }
}

fn write_key(out: &mut String, namer: &dyn ConceptNamer, key: ConceptKey) -> fmt::Result {
    match namer.name(key) {
        Some(name) => out.write_str(name),
        None => write!(out, "{}", key),
    }
}

/// One-line label of a node kind with names resolved.
pub fn label(kind: &NodeKind, namer: &dyn ConceptNamer) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_label(&mut out, kind, namer);
    out
}

fn write_label(out: &mut String, kind: &NodeKind, namer: &dyn ConceptNamer) -> fmt::Result {
    match kind {
        NodeKind::RoleSome { role } | NodeKind::RoleAll { role } => {
            write!(out, "{} ", kind.name())?;
            write_key(out, namer, *role)
        }
        NodeKind::ConceptAssertion { concept } => {
            out.write_str("Concept ")?;
            write_key(out, namer, *concept)
        }
        NodeKind::LiteralAssertion { literal } => write!(out, "Literal {}", literal),
        _ => out.write_str(kind.name()),
    }
}

/// Indented dump of any expression graph, one node per line.
pub fn render_tree<T>(tree: &T, namer: &dyn ConceptNamer) -> String
where
    T: ExpressionTree,
    T::Index: fmt::Display,
{
    render_tree_with(tree, namer, |_| String::new())
}

/// Like [`render_tree`], appending `annotate(index)` to each line.
///
/// A node reached a second time is printed as a back-reference only.
pub fn render_tree_with<T, F>(tree: &T, namer: &dyn ConceptNamer, annotate: F) -> String
where
    T: ExpressionTree,
    T::Index: fmt::Display,
    F: Fn(T::Index) -> String,
{
    let mut out = String::new();
    let mut seen = vec![false; tree.len()];
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let Some(kind) = tree.kind(id) else {
            let _ = writeln!(out, "{} <missing>", id);
            continue;
        };
        let slot = id.as_usize();
        if seen[slot] {
            let _ = writeln!(out, "{} ^", id);
            continue;
        }
        seen[slot] = true;
        let _ = write!(out, "{} ", id);
        let _ = write_label(&mut out, kind, namer);
        out.push_str(&annotate(id));
        out.push('\n');
        stack.extend(tree.children(id).iter().rev().map(|&child| (child, depth + 1)));
    }
    out
}

/// Dump of a merged expression with each node's origin.
///
/// `r↔c` marks a shared pair (`*` when approximate), `-r` a reference-only
/// node and `+c` a comparison-only node.
pub fn render_merged(merged: &MergedExpression, namer: &dyn ConceptNamer) -> String {
    render_tree_with(merged, namer, |id| match merged.node(id).map(|node| node.origin) {
        Some(NodeOrigin::Shared {
            reference,
            comparison,
            quality,
        }) => {
            let marker = if quality == MatchQuality::Approximate { "*" } else { "" };
            format!("  {}↔{}{}", reference, comparison, marker)
        }
        Some(NodeOrigin::Reference(reference)) => format!("  -{}", reference),
        Some(NodeOrigin::Comparison(comparison)) => format!("  +{}", comparison),
        Some(NodeOrigin::Synthetic) => "  (synthetic)".to_string(),
        None => String::new(),
    })
}

/// One line per matched pair: reference label, comparison label, quality.
pub fn render_mapping(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    mapping: &IsomorphismMapping,
    namer: &dyn ConceptNamer,
) -> String {
    let describe = |expression: &LogicalExpression, index: NodeIndex| {
        expression
            .kind(index)
            .map(|kind| label(kind, namer))
            .unwrap_or_default()
    };
    let mut out = String::new();
    for (r, found) in mapping.pairs() {
        let marker = match found.quality {
            MatchQuality::Exact => "",
            MatchQuality::Approximate => "*",
        };
        let _ = writeln!(
            out,
            "{} {} -> {} {}{}",
            r,
            describe(reference, r),
            found.comparison,
            describe(comparison, found.comparison),
            marker
        );
    }
    out
}

/// Sectioned dump of diff sets.
pub fn render_diff(diff: &DiffSets, namer: &dyn ConceptNamer) -> String {
    let mut out = String::new();
    write_shared(&mut out, "shared roots", &diff.shared_roots, namer);
    write_shared(&mut out, "shared assertions", &diff.shared_assertions, namer);
    write_handles(&mut out, "additions", &diff.additions, namer);
    write_handles(&mut out, "deletions", &diff.deletions, namer);
    out
}

fn write_shared(out: &mut String, title: &str, roots: &[SharedRoot], namer: &dyn ConceptNamer) {
    let _ = writeln!(out, "{} ({}):", title, roots.len());
    for root in roots {
        let _ = writeln!(
            out,
            "  {} {}  {}↔{}",
            root.merged,
            label(&root.kind, namer),
            root.reference,
            root.comparison
        );
    }
}

fn write_handles(
    out: &mut String,
    title: &str,
    handles: &[SubtreeHandle],
    namer: &dyn ConceptNamer,
) {
    let _ = writeln!(out, "{} ({}):", title, handles.len());
    for handle in handles {
        let _ = writeln!(
            out,
            "  {} {}  {:?} {} {}",
            handle.merged,
            label(&handle.kind, namer),
            handle.side,
            handle.origin,
            handle.signature
        );
    }
}
