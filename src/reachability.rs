//! Online cycle testing over the identity graph ("skeleton graph").
//!
//! The index records every edge the engine has accepted, keyed by vertex
//! identity rather than version, and answers whether one more edge would close
//! a loop. Versions are a presentation device layered on top; reachability
//! has to reflect the full causal graph.
//!
//! ## Modes
//!
//! | Mode | Query | Insert | Memory |
//! |------|-------|--------|--------|
//! | Closure | O(1) set lookup | O(reaching × reachable) | O(n²) worst case |
//! | Search | BFS over adjacency, optionally depth-bounded | O(1) | O(edges) |
//!
//! The index starts in closure mode. When any closure set would grow past
//! `closure_limit` the closure is discarded and the index switches to search
//! mode for the rest of its life. A depth-bounded search that runs out of
//! depth before finding an answer reports a cycle: the caller then bumps a
//! version it might not have needed to, but never emits a loop.
//!
//! ## Direction
//!
//! Edges run child → parent. Node `a` *reaches* node `b` when a chain of
//! accepted edges leads from `a` to `b`. Adding `child → parent` closes a
//! loop exactly when `parent` already reaches `child`.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::VertexIdentity;

/// Dense slot of an interned identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(u32);

impl NodeIndex {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Cost limits for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityLimits {
    /// Largest closure set allowed before switching to search mode.
    pub closure_limit: usize,
    /// Maximum BFS depth in search mode. `None` searches exhaustively.
    pub search_depth_limit: Option<usize>,
}

impl Default for ReachabilityLimits {
    fn default() -> Self {
        Self {
            closure_limit: 65_536,
            search_depth_limit: None,
        }
    }
}

/// Outcome of a search-mode reachability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Target reached.
    Found,
    /// Every path explored; target unreachable.
    NotFound,
    /// Depth limit hit with unexplored paths left.
    DepthExhausted,
}

/// Counters describing the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityStats {
    /// Interned identities.
    pub identities: usize,
    /// Distinct accepted edges.
    pub edges: usize,
    /// Whether the transitive closure is still maintained.
    pub closure_active: bool,
    /// Queries answered by search.
    pub searches: u64,
    /// Searches that ran out of depth and were answered as cycles.
    pub exhausted_searches: u64,
}

/// Transitive closure, indexed by slot.
#[derive(Debug, Default)]
struct Closure {
    /// Nodes reachable from each node.
    reachable: Vec<HashSet<NodeIndex>>,
    /// Nodes that reach each node.
    reaching: Vec<HashSet<NodeIndex>>,
}

impl Closure {
    fn push_node(&mut self) {
        self.reachable.push(HashSet::new());
        self.reaching.push(HashSet::new());
    }

    /// Fold `child → parent` into the closure.
    ///
    /// Returns the largest set size touched so the caller can enforce limits.
    fn add_edge(&mut self, child: NodeIndex, parent: NodeIndex) -> usize {
        if self.reachable[child.slot()].contains(&parent) {
            // Already implied by an existing path
            return 0;
        }

        let mut sources: Vec<NodeIndex> = self.reaching[child.slot()].iter().copied().collect();
        sources.push(child);
        let mut targets: Vec<NodeIndex> = self.reachable[parent.slot()].iter().copied().collect();
        targets.push(parent);

        let mut largest = 0;
        for source in &sources {
            let set = &mut self.reachable[source.slot()];
            set.extend(targets.iter().copied());
            largest = largest.max(set.len());
        }
        for target in &targets {
            let set = &mut self.reaching[target.slot()];
            set.extend(sources.iter().copied());
            largest = largest.max(set.len());
        }
        largest
    }

    fn reaches(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.reachable[from.slot()].contains(&to)
    }
}

/// Incremental reachability index over vertex identities.
#[derive(Debug)]
pub struct ReachabilityIndex {
    slots: HashMap<VertexIdentity, NodeIndex>,
    /// Accepted parents of each node (child → parent adjacency).
    parents: Vec<Vec<NodeIndex>>,
    closure: Option<Closure>,
    limits: ReachabilityLimits,
    edges: usize,
    searches: u64,
    exhausted_searches: u64,
}

impl Default for ReachabilityIndex {
    fn default() -> Self {
        Self::new(ReachabilityLimits::default())
    }
}

impl ReachabilityIndex {
    /// Create an empty index.
    pub fn new(limits: ReachabilityLimits) -> Self {
        // A zero limit means no closure at all
        let closure = (limits.closure_limit > 0).then(Closure::default);
        Self {
            slots: HashMap::new(),
            parents: Vec::new(),
            closure,
            limits,
            edges: 0,
            searches: 0,
            exhausted_searches: 0,
        }
    }

    /// The configured limits.
    pub fn limits(&self) -> ReachabilityLimits {
        self.limits
    }

    /// Whether the transitive closure is still maintained.
    pub fn closure_active(&self) -> bool {
        self.closure.is_some()
    }

    /// Whether adding `child → parent` would close a loop.
    ///
    /// True for self-loops and whenever `parent` already reaches `child`.
    /// In depth-bounded search mode an inconclusive search also answers true.
    pub fn will_create_cycle(&mut self, child: &VertexIdentity, parent: &VertexIdentity) -> bool {
        if child == parent {
            return true;
        }
        let (Some(&c), Some(&p)) = (self.slots.get(child), self.slots.get(parent)) else {
            // An identity with no accepted edges cannot be on a loop
            return false;
        };
        match self.query(p, c) {
            SearchOutcome::Found => true,
            SearchOutcome::NotFound => false,
            SearchOutcome::DepthExhausted => {
                self.exhausted_searches += 1;
                tracing::debug!(
                    child = %child.short(),
                    parent = %parent.short(),
                    depth_limit = ?self.limits.search_depth_limit,
                    "Reachability search exhausted depth, treating edge as cyclic"
                );
                true
            }
        }
    }

    /// Whether `from` reaches `to` through accepted edges.
    ///
    /// Exact in closure mode and in unbounded search mode; in bounded search
    /// mode an inconclusive search answers false.
    pub fn is_reachable(&mut self, from: &VertexIdentity, to: &VertexIdentity) -> bool {
        let (Some(&f), Some(&t)) = (self.slots.get(from), self.slots.get(to)) else {
            return false;
        };
        self.query(f, t) == SearchOutcome::Found
    }

    /// Record `child → parent` as accepted.
    pub fn put_edge(&mut self, child: &VertexIdentity, parent: &VertexIdentity) {
        let c = self.intern(*child);
        let p = self.intern(*parent);

        if self.parents[c.slot()].contains(&p) {
            return;
        }
        self.parents[c.slot()].push(p);
        self.edges += 1;

        let limit = self.limits.closure_limit;
        if let Some(closure) = self.closure.as_mut() {
            let largest = closure.add_edge(c, p);
            if largest > limit {
                tracing::warn!(
                    identities = self.slots.len(),
                    edges = self.edges,
                    closure_limit = limit,
                    search_depth_limit = ?self.limits.search_depth_limit,
                    "Reachability closure exceeded limit, switching to search mode"
                );
                self.closure = None;
            }
        }
    }

    /// Counters for logs and tests.
    pub fn stats(&self) -> ReachabilityStats {
        ReachabilityStats {
            identities: self.slots.len(),
            edges: self.edges,
            closure_active: self.closure.is_some(),
            searches: self.searches,
            exhausted_searches: self.exhausted_searches,
        }
    }

    fn intern(&mut self, identity: VertexIdentity) -> NodeIndex {
        if let Some(&index) = self.slots.get(&identity) {
            return index;
        }
        let index = NodeIndex(self.parents.len() as u32);
        self.slots.insert(identity, index);
        self.parents.push(Vec::new());
        if let Some(closure) = self.closure.as_mut() {
            closure.push_node();
        }
        index
    }

    fn query(&mut self, from: NodeIndex, to: NodeIndex) -> SearchOutcome {
        if let Some(closure) = &self.closure {
            return if closure.reaches(from, to) {
                SearchOutcome::Found
            } else {
                SearchOutcome::NotFound
            };
        }
        self.searches += 1;
        self.search(from, to)
    }

    /// Breadth-first search over parent adjacency.
    fn search(&self, from: NodeIndex, to: NodeIndex) -> SearchOutcome {
        let depth_limit = self.limits.search_depth_limit;
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut frontier: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        let mut truncated = false;

        visited.insert(from);
        frontier.push_back((from, 0));

        while let Some((node, depth)) = frontier.pop_front() {
            for &next in &self.parents[node.slot()] {
                if next == to {
                    return SearchOutcome::Found;
                }
                if visited.contains(&next) {
                    continue;
                }
                if depth_limit.is_some_and(|limit| depth + 1 >= limit) {
                    truncated = true;
                    continue;
                }
                visited.insert(next);
                frontier.push_back((next, depth + 1));
            }
        }

        if truncated {
            SearchOutcome::DepthExhausted
        } else {
            SearchOutcome::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> VertexIdentity {
        VertexIdentity::from_bytes([n; 16])
    }

    fn search_only(depth: Option<usize>) -> ReachabilityIndex {
        ReachabilityIndex::new(ReachabilityLimits {
            closure_limit: 0,
            search_depth_limit: depth,
        })
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let mut index = ReachabilityIndex::default();
        assert!(index.will_create_cycle(&id(1), &id(1)));
    }

    #[test]
    fn test_unknown_identities_never_cycle() {
        let mut index = ReachabilityIndex::default();
        assert!(!index.will_create_cycle(&id(1), &id(2)));
    }

    #[test]
    fn test_direct_back_edge_is_cycle() {
        let mut index = ReachabilityIndex::default();
        index.put_edge(&id(1), &id(2));

        assert!(!index.will_create_cycle(&id(1), &id(2)));
        assert!(index.will_create_cycle(&id(2), &id(1)));
    }

    #[test]
    fn test_indirect_cycle_detected() {
        let mut index = ReachabilityIndex::default();
        index.put_edge(&id(1), &id(2));
        index.put_edge(&id(2), &id(3));

        assert!(index.is_reachable(&id(1), &id(3)));
        assert!(!index.is_reachable(&id(3), &id(1)));
        assert!(index.will_create_cycle(&id(3), &id(1)));
        assert!(!index.will_create_cycle(&id(1), &id(3)));
    }

    #[test]
    fn test_closure_joins_existing_paths() {
        // 1 → 2 and 3 → 4 exist; adding 2 → 3 must connect 1 to 4
        let mut index = ReachabilityIndex::default();
        index.put_edge(&id(1), &id(2));
        index.put_edge(&id(3), &id(4));
        assert!(!index.is_reachable(&id(1), &id(4)));

        index.put_edge(&id(2), &id(3));
        assert!(index.is_reachable(&id(1), &id(4)));
        assert!(index.will_create_cycle(&id(4), &id(1)));
    }

    #[test]
    fn test_duplicate_edges_counted_once() {
        let mut index = ReachabilityIndex::default();
        index.put_edge(&id(1), &id(2));
        index.put_edge(&id(1), &id(2));
        assert_eq!(index.stats().edges, 1);
        assert_eq!(index.stats().identities, 2);
    }

    #[test]
    fn test_search_mode_matches_closure_mode() {
        let edges = [(1, 2), (2, 3), (3, 4), (5, 3), (4, 6)];
        let mut closure = ReachabilityIndex::default();
        let mut search = search_only(None);
        for (c, p) in edges {
            closure.put_edge(&id(c), &id(p));
            search.put_edge(&id(c), &id(p));
        }
        for a in 1..=6 {
            for b in 1..=6 {
                assert_eq!(
                    closure.will_create_cycle(&id(a), &id(b)),
                    search.will_create_cycle(&id(a), &id(b)),
                    "disagreement on {a} -> {b}"
                );
            }
        }
        assert!(!search.closure_active());
        assert!(search.stats().searches > 0);
    }

    #[test]
    fn test_closure_limit_switches_to_search() {
        let mut index = ReachabilityIndex::new(ReachabilityLimits {
            closure_limit: 3,
            search_depth_limit: None,
        });
        for n in 1..=3 {
            index.put_edge(&id(n), &id(n + 1));
        }
        assert!(index.closure_active());

        index.put_edge(&id(4), &id(5));
        assert!(!index.closure_active());

        // Answers stay exact after the switch
        assert!(index.will_create_cycle(&id(5), &id(1)));
        assert!(!index.will_create_cycle(&id(1), &id(5)));
    }

    #[test]
    fn test_exhausted_depth_reports_cycle() {
        let mut index = search_only(Some(2));
        for n in 1..=5 {
            index.put_edge(&id(n), &id(n + 1));
        }
        index.put_edge(&id(7), &id(8));

        // 6 has no parents: a definite answer regardless of depth
        assert!(!index.will_create_cycle(&id(1), &id(6)));
        assert_eq!(index.stats().exhausted_searches, 0);

        // 1 does not reach 7, but a depth-2 search from 1 cannot prove it
        assert!(index.will_create_cycle(&id(7), &id(1)));
        assert_eq!(index.stats().exhausted_searches, 1);
    }

    #[test]
    fn test_bounded_search_finds_short_paths() {
        let mut index = search_only(Some(2));
        index.put_edge(&id(1), &id(2));
        index.put_edge(&id(2), &id(3));
        assert!(index.will_create_cycle(&id(3), &id(1)));
        assert_eq!(index.stats().exhausted_searches, 0);
    }
}
