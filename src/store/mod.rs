//! Per-identity version state.
//!
//! [`VertexVersionStore`] owns the version counter and emission flag of every
//! identity the engine has seen. Where that state physically lives is decided
//! by a [`StateBackend`]; only the in-memory backend ships today, and the
//! choice is surfaced in configuration (`stateBackend`) so a spilling backend
//! can be added without touching the engine.

pub mod memory;
pub mod versions;

use serde::{Deserialize, Serialize};

use crate::types::{Vertex, VersionedVertex, VertexIdentity};

/// Version state of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexState {
    /// Current version number.
    pub version: u64,
    /// Whether the current version was already pushed downstream.
    pub has_been_put: bool,
    /// Annotations of the identity, without the version annotation.
    pub base: Vertex,
    /// Snapshot of the current version, built on first request.
    pub(crate) snapshot: Option<VersionedVertex>,
}

impl VertexState {
    /// Fresh state at `initial_version`, not yet emitted.
    pub fn new(base: Vertex, initial_version: u64) -> Self {
        Self {
            version: initial_version,
            has_been_put: false,
            base,
            snapshot: None,
        }
    }
}

/// Storage for [`VertexState`] keyed by identity.
///
/// Implementations must keep state for the lifetime of the store; nothing is
/// ever evicted by the engine.
pub trait StateBackend {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// State of an identity.
    fn get(&self, identity: &VertexIdentity) -> Option<&VertexState>;

    /// Mutable state of an identity.
    fn get_mut(&mut self, identity: &VertexIdentity) -> Option<&mut VertexState>;

    /// State of an identity, created with `make` if absent.
    fn get_or_insert_with<F>(&mut self, identity: VertexIdentity, make: F) -> &mut VertexState
    where
        F: FnOnce() -> VertexState;

    /// Number of identities held.
    fn len(&self) -> usize;

    /// Whether no identity is held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which [`StateBackend`] holds version state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    /// [`InMemoryBackend`]: unbounded hash map.
    #[default]
    Memory,
}

impl StateBackendKind {
    /// Parse from a config value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl std::fmt::Display for StateBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
        }
    }
}

pub use memory::InMemoryBackend;
pub use versions::VertexVersionStore;
