//! Edge types for the versioning engine.

use serde::{Deserialize, Serialize};

use super::vertex::{Annotations, Vertex, VersionedVertex, TYPE_ANNOTATION};
use super::InputError;

/// Edge as delivered by upstream.
///
/// Direction follows the provenance convention child → parent: in
/// "process used artifact" the process is the child and the artifact the
/// parent. Deserialization fails when either endpoint is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEdge")]
pub struct Edge {
    /// Child (dependent) endpoint.
    pub child: Vertex,
    /// Parent (depended-upon) endpoint.
    pub parent: Vertex,
    /// Edge annotations.
    pub annotations: Annotations,
}

impl Edge {
    /// Create an edge without annotations.
    pub fn new(child: Vertex, parent: Vertex) -> Self {
        Self {
            child,
            parent,
            annotations: Annotations::new(),
        }
    }

    /// Builder-style annotation setter. Empty keys are ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.annotations.insert(key, value.into());
        }
        self
    }

    /// The `type` annotation, if present.
    pub fn edge_type(&self) -> Option<&str> {
        self.annotations.get(TYPE_ANNOTATION).map(String::as_str)
    }

    /// Check that both endpoints can be given an identity.
    pub fn validate(&self, version_key: &str) -> Result<(), InputError> {
        self.child
            .validate(version_key)
            .map_err(|_| InputError::MissingEndpoint("child"))?;
        self.parent
            .validate(version_key)
            .map_err(|_| InputError::MissingEndpoint("parent"))
    }
}

/// Wire shape of an edge with optional endpoints.
#[derive(Debug, Deserialize)]
struct RawEdge {
    child: Option<Vertex>,
    parent: Option<Vertex>,
    #[serde(default)]
    annotations: Annotations,
}

impl TryFrom<RawEdge> for Edge {
    type Error = InputError;

    fn try_from(raw: RawEdge) -> Result<Self, Self::Error> {
        let child = raw.child.ok_or(InputError::MissingEndpoint("child"))?;
        let parent = raw.parent.ok_or(InputError::MissingEndpoint("parent"))?;
        Ok(Self {
            child,
            parent,
            annotations: raw.annotations,
        })
    }
}

/// Edge between two vertex versions, as pushed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedEdge {
    /// Child endpoint snapshot.
    pub child: VersionedVertex,
    /// Parent endpoint snapshot.
    pub parent: VersionedVertex,
    /// Annotations copied from the incoming edge (plus any version-link marker).
    pub annotations: Annotations,
}

impl VersionedEdge {
    /// Create an edge between two snapshots.
    pub fn new(child: VersionedVertex, parent: VersionedVertex, annotations: Annotations) -> Self {
        Self {
            child,
            parent,
            annotations,
        }
    }

    /// Whether both endpoints are the same vertex version.
    pub fn is_same_version_loop(&self) -> bool {
        self.child.key() == self.parent.key()
    }
}

impl std::fmt::Display for VersionedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.child, self.parent)
    }
}
