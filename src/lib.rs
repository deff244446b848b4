//! # provenance-versioner
//!
//! Streaming DAG-ification for provenance graphs.
//!
//! Provenance reporters emit vertices and edges over *identities*: the same
//! process, file or artifact shows up again and again, and the edges between
//! them can form cycles. This crate answers one question per edge:
//!
//! > Which versions should this edge connect so the output stays acyclic?
//!
//! ## Core Contract
//!
//! 1. Vertex identity is a hash of its annotations, minus the version annotation
//! 2. Every output vertex carries `version=N`; each `(identity, N)` is emitted once
//! 3. The emitted graph over `(identity, version)` never contains a cycle
//!
//! ## Architecture
//!
//! ```text
//! Vertex/Edge → VersioningFilter → VersioningEngine → Sink
//!                                     ↓         ↓
//!                        VertexVersionStore   CyclePolicy
//!                                             (LocalCausal | ReachabilityChecked)
//! ```
//!
//! ## Policies
//!
//! - `causal`: per-parent causal tokens, O(1) per edge, over-versions
//! - `reachability`: identity reachability index, bumps only on real cycles

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod store;
pub mod reachability;
pub mod causal;
pub mod policy;
pub mod sink;
pub mod engine;
pub mod config;
pub mod filter;

// Re-exports
pub use types::{
    Annotations, Edge, Element, Event, InputError, Vertex, VersionedEdge, VersionedVertex,
    VertexIdentity,
};
pub use canonical::{to_canonical_bytes, HashAlgorithm, IdentityHasher, Sha256Hasher, Xxh3Hasher};
pub use store::{InMemoryBackend, StateBackend, StateBackendKind, VertexState, VertexVersionStore};
pub use reachability::{ReachabilityIndex, ReachabilityLimits, ReachabilityStats};
pub use causal::{CausalVerdict, CausalVersionTracker};
pub use policy::{CyclePolicy, DropReason, EdgeDecision, PolicyKind};
pub use sink::{MemorySink, SharedSink, Sink};
pub use engine::{EngineStats, VersioningEngine};
pub use config::{ConfigError, FilterConfig};
pub use filter::VersioningFilter;

/// Default annotation key carrying the version number.
pub const DEFAULT_VERSION_ANNOTATION: &str = "version";
