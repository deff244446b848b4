//! Local causal versioning.
//!
//! Each child remembers the version of every parent it has accepted an edge
//! from. An edge is forwarded (with a child version bump) only when it brings
//! causality the child has not incorporated yet:
//!
//! 1. Parent never seen by this child → record, bump, forward
//! 2. Recorded == current parent version → drop (duplicate)
//! 3. Recorded > current parent version → drop (back in time)
//! 4. Recorded < current parent version → update record, bump, forward
//!
//! Self-loops always connect two adjacent versions of the identity.
//!
//! The check is single-hop: it never consults the rest of the graph, so it
//! cannot tell a loop through an intermediate vertex from harmless
//! causality. It compensates by bumping the child on every forwarded edge,
//! which keeps the emitted graph acyclic at the price of extra versions and
//! of edges dropped as duplicates.

use crate::causal::{CausalVersionTracker, CausalVerdict};
use crate::store::{StateBackend, VertexVersionStore};
use crate::types::VertexIdentity;
use super::{DropReason, EdgeDecision};

/// Decide how to emit `child → parent`.
pub fn decide<B: StateBackend>(
    tracker: &mut CausalVersionTracker,
    store: &VertexVersionStore<B>,
    child: VertexIdentity,
    parent: VertexIdentity,
) -> EdgeDecision {
    if child == parent {
        return EdgeDecision::SelfLoop;
    }

    let parent_current = match store.current_version(&parent) {
        Some(version) => version,
        None => {
            debug_assert!(false, "parent {parent:?} not registered before decide");
            store.initial_version()
        }
    };

    let verdict = tracker.observe(child, parent, parent_current);
    if verdict.forwards() {
        return EdgeDecision::ForwardWithBump;
    }
    match verdict {
        CausalVerdict::Stale { recorded, current } => {
            tracing::debug!(
                child = %child.short(),
                parent = %parent.short(),
                recorded,
                current,
                "Parent offered at an older version than already incorporated"
            );
            EdgeDecision::Drop(DropReason::StaleParentVersion)
        }
        _ => EdgeDecision::Drop(DropReason::DuplicateCausality),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::Vertex;

    fn id(n: u8) -> VertexIdentity {
        VertexIdentity::from_bytes([n; 16])
    }

    fn registered(ids: &[u8]) -> VertexVersionStore {
        let mut store = VertexVersionStore::new(0, "version");
        for &n in ids {
            store.get_or_create(id(n), &Vertex::new().with("n", n.to_string()));
        }
        store
    }

    #[test]
    fn test_self_loop() {
        let mut tracker = CausalVersionTracker::new();
        let store = registered(&[1]);
        assert_eq!(decide(&mut tracker, &store, id(1), id(1)), EdgeDecision::SelfLoop);
    }

    #[test]
    fn test_repeat_edge_dropped_until_parent_advances() {
        let mut tracker = CausalVersionTracker::new();
        let mut store = registered(&[1, 2]);
        let mut sink = MemorySink::new();

        assert_eq!(decide(&mut tracker, &store, id(1), id(2)), EdgeDecision::ForwardWithBump);
        assert_eq!(
            decide(&mut tracker, &store, id(1), id(2)),
            EdgeDecision::Drop(DropReason::DuplicateCausality)
        );

        store.emit_if_not_emitted(&id(2), &mut sink);
        store.increment_version(&id(2));
        assert_eq!(decide(&mut tracker, &store, id(1), id(2)), EdgeDecision::ForwardWithBump);
    }
}
