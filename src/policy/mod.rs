//! Cycle policies.
//!
//! A policy looks at one incoming edge (by endpoint identity) and decides how
//! the engine should emit it. Both policies share one contract; they differ in
//! how much state they keep and how precisely they detect loops.
//!
//! | Policy | State | Detects | Cost per edge |
//! |--------|-------|---------|---------------|
//! | `LocalCausal` | last parent version per child | repeated/stale single-hop causality | O(1) |
//! | `ReachabilityChecked` | identity reachability index | multi-hop loops | closure update or search |

pub mod local_causal;
pub mod reachability_checked;

use serde::{Deserialize, Serialize};

use crate::causal::CausalVersionTracker;
use crate::reachability::{ReachabilityIndex, ReachabilityLimits};
use crate::store::{StateBackend, VertexVersionStore};
use crate::types::VertexIdentity;

/// Which policy the engine runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Cheap, approximate, per-parent causal tokens.
    Causal,
    /// Precise, reachability-checked.
    #[default]
    Reachability,
}

impl PolicyKind {
    /// Parse from a config value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "causal" | "local_causal" | "localcausal" => Some(Self::Causal),
            "reachability" | "reachability_checked" | "reachabilitychecked" => {
                Some(Self::Reachability)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Causal => write!(f, "causal"),
            Self::Reachability => write!(f, "reachability"),
        }
    }
}

/// Why an edge was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Child already incorporated the parent's current version.
    DuplicateCausality,
    /// Child already incorporated a newer parent version than offered.
    StaleParentVersion,
    /// The edge needed a new child version but the child is at `u64::MAX`.
    VersionSpaceExhausted,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateCausality => write!(f, "duplicate_causality"),
            Self::StaleParentVersion => write!(f, "stale_parent_version"),
            Self::VersionSpaceExhausted => write!(f, "version_space_exhausted"),
        }
    }
}

/// What the engine should do with one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Emit both endpoints at their current versions and forward the edge.
    Forward,
    /// Advance the child, then forward the edge from the new child version
    /// to the parent's current version.
    ForwardWithBump,
    /// Connect two adjacent versions of the same identity.
    SelfLoop,
    /// Emit nothing.
    Drop(DropReason),
}

/// Policy together with the state it owns.
#[derive(Debug)]
pub enum CyclePolicy {
    /// See [`local_causal`].
    LocalCausal(CausalVersionTracker),
    /// See [`reachability_checked`].
    ReachabilityChecked(ReachabilityIndex),
}

impl CyclePolicy {
    /// Fresh policy state for `kind`.
    pub fn new(kind: PolicyKind, limits: ReachabilityLimits) -> Self {
        match kind {
            PolicyKind::Causal => Self::LocalCausal(CausalVersionTracker::new()),
            PolicyKind::Reachability => Self::ReachabilityChecked(ReachabilityIndex::new(limits)),
        }
    }

    /// Which policy this is.
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::LocalCausal(_) => PolicyKind::Causal,
            Self::ReachabilityChecked(_) => PolicyKind::Reachability,
        }
    }

    /// Decide how to emit `child → parent`. Both endpoints must already be
    /// registered in `store`.
    pub fn decide<B: StateBackend>(
        &mut self,
        store: &VertexVersionStore<B>,
        child: VertexIdentity,
        parent: VertexIdentity,
    ) -> EdgeDecision {
        match self {
            Self::LocalCausal(tracker) => local_causal::decide(tracker, store, child, parent),
            Self::ReachabilityChecked(index) => reachability_checked::decide(index, child, parent),
        }
    }

    /// The reachability index, for the reachability-checked policy.
    pub fn reachability(&self) -> Option<&ReachabilityIndex> {
        match self {
            Self::ReachabilityChecked(index) => Some(index),
            Self::LocalCausal(_) => None,
        }
    }

    /// The causal tracker, for the local causal policy.
    pub fn causal(&self) -> Option<&CausalVersionTracker> {
        match self {
            Self::LocalCausal(tracker) => Some(tracker),
            Self::ReachabilityChecked(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_kind() {
        assert_eq!(PolicyKind::parse("causal"), Some(PolicyKind::Causal));
        assert_eq!(PolicyKind::parse("Reachability"), Some(PolicyKind::Reachability));
        assert_eq!(PolicyKind::parse("reachability_checked"), Some(PolicyKind::Reachability));
        assert_eq!(PolicyKind::parse("fastest"), None);
    }

    #[test]
    fn test_policy_kind_roundtrip() {
        for kind in [PolicyKind::Causal, PolicyKind::Reachability] {
            let policy = CyclePolicy::new(kind, ReachabilityLimits::default());
            assert_eq!(policy.kind(), kind);
            assert_eq!(PolicyKind::parse(&kind.to_string()), Some(kind));
        }
    }
}
