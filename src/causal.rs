//! Per-child record of the parent versions already incorporated.
//!
//! State for the local causal policy: for every child identity, the version
//! of each parent at the time the child last accepted an edge from it. One
//! map lookup per edge, no global bookkeeping.

use std::collections::HashMap;

use crate::types::VertexIdentity;

/// Verdict for one `(child, parent)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalVerdict {
    /// Child has never accepted an edge from this parent.
    FirstSighting {
        /// Parent version now recorded.
        current: u64,
    },
    /// Child already incorporated this exact parent version.
    Duplicate {
        /// The recorded (and current) parent version.
        version: u64,
    },
    /// Child already incorporated a newer parent version than the current one.
    Stale {
        /// Version recorded against the parent.
        recorded: u64,
        /// Parent version offered now.
        current: u64,
    },
    /// Parent moved on since the child last incorporated it.
    Advanced {
        /// Version previously recorded.
        recorded: u64,
        /// Parent version now recorded.
        current: u64,
    },
}

impl CausalVerdict {
    /// Whether the edge should be forwarded.
    pub fn forwards(&self) -> bool {
        matches!(self, Self::FirstSighting { .. } | Self::Advanced { .. })
    }
}

/// Last-seen parent versions, per child identity.
#[derive(Debug, Clone, Default)]
pub struct CausalVersionTracker {
    seen: HashMap<VertexIdentity, HashMap<VertexIdentity, u64>>,
}

impl CausalVersionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the edge `child → parent` given the parent's current version,
    /// recording the version when the edge is to be forwarded.
    pub fn observe(
        &mut self,
        child: VertexIdentity,
        parent: VertexIdentity,
        parent_current: u64,
    ) -> CausalVerdict {
        let parents = self.seen.entry(child).or_default();
        match parents.get(&parent).copied() {
            None => {
                parents.insert(parent, parent_current);
                CausalVerdict::FirstSighting {
                    current: parent_current,
                }
            }
            Some(recorded) if recorded == parent_current => CausalVerdict::Duplicate {
                version: recorded,
            },
            Some(recorded) if recorded > parent_current => CausalVerdict::Stale {
                recorded,
                current: parent_current,
            },
            Some(recorded) => {
                parents.insert(parent, parent_current);
                CausalVerdict::Advanced {
                    recorded,
                    current: parent_current,
                }
            }
        }
    }

    /// Parent version recorded for `child`, if any.
    pub fn recorded(&self, child: &VertexIdentity, parent: &VertexIdentity) -> Option<u64> {
        self.seen.get(child).and_then(|parents| parents.get(parent).copied())
    }

    /// Number of children with at least one recorded parent.
    pub fn children(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> VertexIdentity {
        VertexIdentity::from_bytes([n; 16])
    }

    #[test]
    fn test_first_sighting_records() {
        let mut tracker = CausalVersionTracker::new();
        let verdict = tracker.observe(id(1), id(2), 0);
        assert_eq!(verdict, CausalVerdict::FirstSighting { current: 0 });
        assert!(verdict.forwards());
        assert_eq!(tracker.recorded(&id(1), &id(2)), Some(0));
    }

    #[test]
    fn test_same_version_is_duplicate() {
        let mut tracker = CausalVersionTracker::new();
        tracker.observe(id(1), id(2), 3);
        let verdict = tracker.observe(id(1), id(2), 3);
        assert_eq!(verdict, CausalVerdict::Duplicate { version: 3 });
        assert!(!verdict.forwards());
    }

    #[test]
    fn test_older_version_is_stale() {
        let mut tracker = CausalVersionTracker::new();
        tracker.observe(id(1), id(2), 5);
        let verdict = tracker.observe(id(1), id(2), 4);
        assert_eq!(verdict, CausalVerdict::Stale { recorded: 5, current: 4 });
        assert!(!verdict.forwards());
        // Record untouched
        assert_eq!(tracker.recorded(&id(1), &id(2)), Some(5));
    }

    #[test]
    fn test_newer_version_advances_record() {
        let mut tracker = CausalVersionTracker::new();
        tracker.observe(id(1), id(2), 0);
        let verdict = tracker.observe(id(1), id(2), 2);
        assert_eq!(verdict, CausalVerdict::Advanced { recorded: 0, current: 2 });
        assert!(verdict.forwards());
        assert_eq!(tracker.recorded(&id(1), &id(2)), Some(2));
    }

    #[test]
    fn test_records_are_per_child() {
        let mut tracker = CausalVersionTracker::new();
        tracker.observe(id(1), id(3), 0);
        assert!(tracker.observe(id(2), id(3), 0).forwards());
        assert_eq!(tracker.children(), 2);
    }
}
