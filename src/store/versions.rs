//! Vertex version store.

use crate::sink::Sink;
use crate::types::{Element, Vertex, VersionedVertex, VertexIdentity};
use super::{InMemoryBackend, StateBackend, VertexState};

/// Maps vertex identity to (current version, emitted flag, base annotations).
///
/// ## Invariants
///
/// - A version is pushed downstream at most once
/// - Versions only grow, one step at a time, starting at `initial_version`
/// - A version nobody has observed is never skipped: incrementing an
///   unemitted version is a no-op
#[derive(Debug)]
pub struct VertexVersionStore<B: StateBackend = InMemoryBackend> {
    backend: B,
    initial_version: u64,
    version_key: String,
}

impl VertexVersionStore<InMemoryBackend> {
    /// Create an in-memory store.
    pub fn new(initial_version: u64, version_key: impl Into<String>) -> Self {
        Self::with_backend(InMemoryBackend::new(), initial_version, version_key)
    }
}

impl<B: StateBackend> VertexVersionStore<B> {
    /// Create a store over an explicit backend.
    pub fn with_backend(backend: B, initial_version: u64, version_key: impl Into<String>) -> Self {
        Self {
            backend,
            initial_version,
            version_key: version_key.into(),
        }
    }

    /// Annotation key that carries the version number.
    pub fn version_key(&self) -> &str {
        &self.version_key
    }

    /// Version assigned to newly seen identities.
    pub fn initial_version(&self) -> u64 {
        self.initial_version
    }

    /// Register an identity on first sight; later calls return existing state.
    ///
    /// Any version annotation already present on `vertex` is stripped from
    /// the captured base annotations.
    pub fn get_or_create(&mut self, identity: VertexIdentity, vertex: &Vertex) -> &VertexState {
        let initial_version = self.initial_version;
        let version_key = &self.version_key;
        self.backend.get_or_insert_with(identity, || {
            VertexState::new(vertex.without(version_key), initial_version)
        })
    }

    /// Whether the identity has been registered.
    pub fn contains(&self, identity: &VertexIdentity) -> bool {
        self.backend.get(identity).is_some()
    }

    /// Current version of a registered identity.
    pub fn current_version(&self, identity: &VertexIdentity) -> Option<u64> {
        self.backend.get(identity).map(|state| state.version)
    }

    /// Whether the current version of an identity has been emitted.
    pub fn is_emitted(&self, identity: &VertexIdentity) -> Option<bool> {
        self.backend.get(identity).map(|state| state.has_been_put)
    }

    /// Advance the version if the current one has been emitted.
    ///
    /// Returns `true` when the version moved. An emitted version of `u64::MAX`
    /// cannot move and returns `false`. Unknown identities are an internal
    /// invariant violation: asserted in debug builds, ignored in release
    /// builds.
    pub fn increment_version(&mut self, identity: &VertexIdentity) -> bool {
        let Some(state) = self.backend.get_mut(identity) else {
            debug_assert!(false, "increment of unregistered identity {identity:?}");
            tracing::error!(identity = %identity, "Version increment for unregistered identity");
            return false;
        };
        if !state.has_been_put {
            return false;
        }
        let Some(next) = state.version.checked_add(1) else {
            tracing::error!(
                identity = %identity,
                version = state.version,
                "Version space exhausted, cannot increment"
            );
            return false;
        };
        state.version = next;
        state.has_been_put = false;
        state.snapshot = None;
        true
    }

    /// Snapshot of the current version, pushing it to `sink` if this version
    /// has not been emitted yet.
    ///
    /// Always returns the snapshot so callers can use it as an edge endpoint;
    /// repeated calls without an intervening increment return equal snapshots
    /// and emit nothing.
    pub fn emit_if_not_emitted<S: Sink + ?Sized>(
        &mut self,
        identity: &VertexIdentity,
        sink: &mut S,
    ) -> Option<VersionedVertex> {
        let version_key = &self.version_key;
        let Some(state) = self.backend.get_mut(identity) else {
            debug_assert!(false, "emit of unregistered identity {identity:?}");
            tracing::error!(identity = %identity, "Emit requested for unregistered identity");
            return None;
        };

        let snapshot = match &state.snapshot {
            Some(snapshot) => snapshot.clone(),
            None => {
                let snapshot =
                    VersionedVertex::new(*identity, state.version, &state.base, version_key);
                state.snapshot = Some(snapshot.clone());
                snapshot
            }
        };

        if !state.has_been_put {
            sink.emit(Element::Vertex(snapshot.clone()));
            state.has_been_put = true;
        }
        Some(snapshot)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
