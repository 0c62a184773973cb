//! Deterministic propagation worklist.
//!
//! Reference nodes waiting for a bottom-up check are popped by ascending
//! rank (their position in reference post-order), so children are always
//! settled before their parents and the same inputs produce the same
//! sequence of matches across runs.

use crate::arena::NodeIndex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Min-heap of reference nodes keyed by post-order rank.
#[derive(Debug, Default)]
pub(crate) struct PropagationWorklist {
    heap: BinaryHeap<Reverse<(u32, NodeIndex)>>,
    queued: HashSet<NodeIndex>,
}

impl PropagationWorklist {
    /// Creates an empty worklist.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues `node` at `rank`. Already-queued nodes are left alone.
    pub(crate) fn mark(&mut self, node: NodeIndex, rank: u32) {
        if self.queued.insert(node) {
            self.heap.push(Reverse((rank, node)));
        }
    }

    /// Removes and returns the queued node with the smallest rank.
    pub(crate) fn pop(&mut self) -> Option<NodeIndex> {
        let Reverse((_, node)) = self.heap.pop()?;
        self.queued.remove(&node);
        Some(node)
    }

    /// Number of queued nodes.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if nothing is queued.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
