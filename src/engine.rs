//! Versioning engine.
//!
//! Turns a stream of vertices and edges over identities into an acyclic
//! stream of versioned vertices and edges. The engine owns the version store,
//! the cycle policy state and the downstream sink; nothing is shared.
//!
//! ## Edge execution
//!
//! | Decision | Emitted |
//! |----------|---------|
//! | `Forward` | child(current), parent(current), edge |
//! | `ForwardWithBump` | child(current + 1), parent(current), edge |
//! | `SelfLoop` | v(current), v(current + 1), edge v(current + 1) → v(current) |
//! | `Drop` | nothing |
//!
//! Vertices are only emitted when their version has not been emitted yet, so
//! each `(identity, version)` reaches the sink exactly once.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::canonical::IdentityHasher;
use crate::config::{ConfigError, FilterConfig};
use crate::policy::{CyclePolicy, DropReason, EdgeDecision};
use crate::sink::Sink;
use crate::store::{InMemoryBackend, StateBackend, StateBackendKind, VertexVersionStore};
use crate::types::{
    Annotations, Edge, Element, Event, Vertex, VersionedEdge, VersionedVertex, VertexIdentity,
};

/// Counters kept over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Vertices received.
    pub vertices_received: u64,
    /// Edges received.
    pub edges_received: u64,
    /// Inputs dropped because they failed validation.
    pub invalid_inputs: u64,
    /// Edges forwarded downstream (not counting version links).
    pub edges_forwarded: u64,
    /// Edges dropped as duplicate causality.
    pub edges_dropped_duplicate: u64,
    /// Edges dropped because the parent was older than already incorporated.
    pub edges_dropped_stale: u64,
    /// Edges dropped because the child could not be given a new version.
    pub edges_dropped_exhausted: u64,
    /// Self-loops turned into version-to-version edges.
    pub self_loops: u64,
    /// Version increments that actually advanced a version.
    pub version_bumps: u64,
    /// Version-link edges emitted.
    pub version_links: u64,
}

impl EngineStats {
    /// Total edges dropped.
    pub fn edges_dropped(&self) -> u64 {
        self.edges_dropped_duplicate + self.edges_dropped_stale + self.edges_dropped_exhausted
    }
}

/// Outcome of advancing an identity to a new version.
enum Bump {
    /// Version moved; holds the superseded snapshot.
    Advanced(VersionedVertex),
    /// Current version was never emitted, so it stays in use.
    Unobserved,
    /// Current version was emitted and is the last one available.
    Exhausted,
}

/// Streaming DAG-ification engine.
pub struct VersioningEngine<S: Sink, B: StateBackend = InMemoryBackend> {
    store: VertexVersionStore<B>,
    policy: CyclePolicy,
    hasher: Box<dyn IdentityHasher>,
    sink: S,
    keep_all_vertices: bool,
    version_link: Option<(String, String)>,
    stats: EngineStats,
}

impl<S: Sink> VersioningEngine<S, InMemoryBackend> {
    /// Build an engine over the backend named in `config`.
    pub fn new(config: &FilterConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config, sink))
    }

    /// Build from a config that has already passed [`FilterConfig::validate`].
    pub(crate) fn from_validated(config: &FilterConfig, sink: S) -> Self {
        let backend = match config.state_backend {
            StateBackendKind::Memory => InMemoryBackend::new(),
        };
        Self::assemble(config, backend, sink)
    }
}

impl<S: Sink, B: StateBackend> VersioningEngine<S, B> {
    /// Build an engine over an explicit state backend.
    pub fn with_backend(config: &FilterConfig, backend: B, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, backend, sink))
    }

    fn assemble(config: &FilterConfig, backend: B, sink: S) -> Self {
        let hasher = config.hash_algorithm.hasher();
        debug!(
            policy = %config.policy,
            hasher = hasher.name(),
            backend = backend.name(),
            "Building versioning engine"
        );
        Self {
            store: VertexVersionStore::with_backend(
                backend,
                config.initial_version,
                config.version_annotation_name.clone(),
            ),
            policy: CyclePolicy::new(config.policy, config.reachability_limits()),
            hasher,
            sink,
            keep_all_vertices: config.keep_all_vertices,
            version_link: config.version_link(),
            stats: EngineStats::default(),
        }
    }

    /// Accept one vertex.
    pub fn put_vertex(&mut self, vertex: &Vertex) {
        self.stats.vertices_received += 1;
        if let Err(e) = vertex.validate(self.store.version_key()) {
            warn!(error = %e, "Dropping invalid vertex");
            self.stats.invalid_inputs += 1;
            return;
        }

        let identity = self.register(vertex);
        if self.keep_all_vertices {
            self.store.emit_if_not_emitted(&identity, &mut self.sink);
        }
    }

    /// Accept one edge.
    pub fn put_edge(&mut self, edge: &Edge) {
        self.stats.edges_received += 1;
        if let Err(e) = edge.validate(self.store.version_key()) {
            warn!(error = %e, "Dropping invalid edge");
            self.stats.invalid_inputs += 1;
            return;
        }

        let child = self.register(&edge.child);
        let parent = self.register(&edge.parent);
        let decision = self.policy.decide(&self.store, child, parent);
        debug!(
            child = %child.short(),
            parent = %parent.short(),
            decision = ?decision,
            "Edge decided"
        );

        match decision {
            EdgeDecision::Forward => self.forward(child, parent, edge.annotations.clone()),
            EdgeDecision::ForwardWithBump => match self.advance(&child) {
                Bump::Advanced(previous) => {
                    self.forward(child, parent, edge.annotations.clone());
                    self.link_versions(child, previous);
                }
                Bump::Unobserved => self.forward(child, parent, edge.annotations.clone()),
                Bump::Exhausted => self.drop_edge(child, parent, DropReason::VersionSpaceExhausted),
            },
            EdgeDecision::SelfLoop => self.self_loop(child, edge.annotations.clone()),
            EdgeDecision::Drop(reason) => self.drop_edge(child, parent, reason),
        }
    }

    /// Accept either kind of event.
    pub fn process(&mut self, event: &Event) {
        match event {
            Event::Vertex(vertex) => self.put_vertex(vertex),
            Event::Edge(edge) => self.put_edge(edge),
        }
    }

    /// Log final counters. There is nothing to flush.
    pub fn shutdown(&mut self) -> EngineStats {
        let reachability = self.policy.reachability().map(|index| index.stats());
        info!(
            policy = %self.policy.kind(),
            identities = self.store.len(),
            stats = ?self.stats,
            reachability = ?reachability,
            "Versioning engine shut down"
        );
        self.stats
    }

    /// Identity the engine assigns to `vertex`.
    pub fn identity_of(&self, vertex: &Vertex) -> VertexIdentity {
        self.hasher.identity(vertex, self.store.version_key())
    }

    /// Current version of `vertex`, if it has been seen.
    pub fn current_version(&self, vertex: &Vertex) -> Option<u64> {
        self.store.current_version(&self.identity_of(vertex))
    }

    /// Counters so far.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Version store.
    pub fn store(&self) -> &VertexVersionStore<B> {
        &self.store
    }

    /// Policy and its state.
    pub fn policy(&self) -> &CyclePolicy {
        &self.policy
    }

    /// Downstream sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Downstream sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the engine, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn register(&mut self, vertex: &Vertex) -> VertexIdentity {
        let identity = self.identity_of(vertex);
        self.store.get_or_create(identity, vertex);
        identity
    }

    fn snapshot(&mut self, identity: &VertexIdentity) -> Option<VersionedVertex> {
        self.store.emit_if_not_emitted(identity, &mut self.sink)
    }

    fn advance(&mut self, identity: &VertexIdentity) -> Bump {
        if self.store.is_emitted(identity) != Some(true) {
            return Bump::Unobserved;
        }
        let Some(previous) = self.snapshot(identity) else {
            return Bump::Unobserved;
        };
        if self.store.increment_version(identity) {
            self.stats.version_bumps += 1;
            Bump::Advanced(previous)
        } else {
            Bump::Exhausted
        }
    }

    fn drop_edge(&mut self, child: VertexIdentity, parent: VertexIdentity, reason: DropReason) {
        match reason {
            DropReason::DuplicateCausality => self.stats.edges_dropped_duplicate += 1,
            DropReason::StaleParentVersion => self.stats.edges_dropped_stale += 1,
            DropReason::VersionSpaceExhausted => {
                self.stats.edges_dropped_exhausted += 1;
                warn!(
                    child = %child.short(),
                    parent = %parent.short(),
                    "Dropping edge, child has no version left to advance to"
                );
                return;
            }
        }
        debug!(
            child = %child.short(),
            parent = %parent.short(),
            reason = %reason,
            "Edge dropped"
        );
    }

    fn forward(&mut self, child: VertexIdentity, parent: VertexIdentity, annotations: Annotations) {
        let (Some(child), Some(parent)) = (self.snapshot(&child), self.snapshot(&parent)) else {
            return;
        };
        self.emit_edge(VersionedEdge::new(child, parent, annotations));
        self.stats.edges_forwarded += 1;
    }

    fn self_loop(&mut self, identity: VertexIdentity, mut annotations: Annotations) {
        let Some(parent) = self.snapshot(&identity) else {
            return;
        };
        if !matches!(self.advance(&identity), Bump::Advanced(_)) {
            self.drop_edge(identity, identity, DropReason::VersionSpaceExhausted);
            return;
        }
        let Some(child) = self.snapshot(&identity) else {
            return;
        };

        if let Some((key, value)) = &self.version_link {
            annotations.insert(key.clone(), value.clone());
        }
        self.emit_edge(VersionedEdge::new(child, parent, annotations));
        self.stats.edges_forwarded += 1;
        self.stats.self_loops += 1;
    }

    fn link_versions(&mut self, identity: VertexIdentity, previous: VersionedVertex) {
        let Some((key, value)) = self.version_link.clone() else {
            return;
        };
        let Some(current) = self.snapshot(&identity) else {
            return;
        };
        let mut annotations = Annotations::new();
        annotations.insert(key, value);
        self.emit_edge(VersionedEdge::new(current, previous, annotations));
        self.stats.version_links += 1;
    }

    fn emit_edge(&mut self, edge: VersionedEdge) {
        debug_assert!(!edge.is_same_version_loop(), "same-version loop {edge}");
        self.sink.emit(Element::Edge(edge));
    }
}

impl<S: Sink + std::fmt::Debug, B: StateBackend> std::fmt::Debug for VersioningEngine<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersioningEngine")
            .field("policy", &self.policy.kind())
            .field("hasher", &self.hasher.name())
            .field("identities", &self.store.len())
            .field("keep_all_vertices", &self.keep_all_vertices)
            .field("version_link", &self.version_link)
            .field("stats", &self.stats)
            .field("sink", &self.sink)
            .finish()
    }
}
