//! In-memory version state backend.

use std::collections::HashMap;

use crate::types::VertexIdentity;
use super::{StateBackend, VertexState};

/// Hash-map backed state. Grows with the number of distinct identities.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    states: HashMap<VertexIdentity, VertexState>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with room for `capacity` identities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: HashMap::with_capacity(capacity),
        }
    }
}

impl StateBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, identity: &VertexIdentity) -> Option<&VertexState> {
        self.states.get(identity)
    }

    fn get_mut(&mut self, identity: &VertexIdentity) -> Option<&mut VertexState> {
        self.states.get_mut(identity)
    }

    fn get_or_insert_with<F>(&mut self, identity: VertexIdentity, make: F) -> &mut VertexState
    where
        F: FnOnce() -> VertexState,
    {
        self.states.entry(identity).or_insert_with(make)
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}
