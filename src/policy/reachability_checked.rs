//! Reachability-checked versioning.
//!
//! An edge is forwarded unchanged unless the identity graph already leads
//! from the parent back to the child. Then the child is advanced to a fresh
//! version (no incoming edges yet) and the edge leaves from there. Every
//! edge is recorded over identities whatever versions it ended up using.

use crate::reachability::ReachabilityIndex;
use crate::types::VertexIdentity;
use super::EdgeDecision;

/// Decide how to emit `child → parent` and record it in `index`.
pub fn decide(
    index: &mut ReachabilityIndex,
    child: VertexIdentity,
    parent: VertexIdentity,
) -> EdgeDecision {
    let decision = if !index.will_create_cycle(&child, &parent) {
        EdgeDecision::Forward
    } else if child == parent {
        EdgeDecision::SelfLoop
    } else {
        EdgeDecision::ForwardWithBump
    };
    index.put_edge(&child, &parent);
    decision
}
