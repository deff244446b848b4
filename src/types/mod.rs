//! Core types for the versioning engine.

pub mod identity;
pub mod vertex;
pub mod edge;

pub use identity::{VertexIdentity, IDENTITY_BYTES};
pub use vertex::{Annotations, Vertex, VersionedVertex, TYPE_ANNOTATION};
pub use edge::{Edge, VersionedEdge};

use serde::{Deserialize, Serialize};

/// Invalid upstream input. Logged and dropped, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Vertex without annotations has no identity.
    #[error("Vertex has no annotations")]
    EmptyVertex,
    /// Edge without one of its endpoints.
    #[error("Edge is missing its {0} vertex")]
    MissingEndpoint(&'static str),
}

/// Anything the engine pushes downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// A vertex version.
    Vertex(VersionedVertex),
    /// An edge between two vertex versions.
    Edge(VersionedEdge),
}

impl Element {
    /// The vertex, if this is a vertex element.
    pub fn as_vertex(&self) -> Option<&VersionedVertex> {
        match self {
            Self::Vertex(v) => Some(v),
            Self::Edge(_) => None,
        }
    }

    /// The edge, if this is an edge element.
    pub fn as_edge(&self) -> Option<&VersionedEdge> {
        match self {
            Self::Edge(e) => Some(e),
            Self::Vertex(_) => None,
        }
    }
}

/// Upstream event consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A vertex sighting.
    Vertex(Vertex),
    /// An edge between two vertices.
    Edge(Edge),
}
