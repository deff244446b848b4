//! Vertex types for the versioning engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::VertexIdentity;
use super::InputError;

/// Ordered annotation map shared by vertices and edges.
///
/// `BTreeMap` keeps iteration order stable so identity hashing is deterministic.
pub type Annotations = BTreeMap<String, String>;

/// Annotation key carrying the element type (e.g. `Process`, `Artifact`, `Used`).
pub const TYPE_ANNOTATION: &str = "type";

/// A provenance vertex as delivered by upstream.
///
/// A vertex is nothing more than its annotation set. Two vertices with the
/// same annotations are the same entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vertex {
    annotations: Annotations,
}

impl Vertex {
    /// Create an empty vertex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vertex from an annotation map.
    pub fn from_annotations(annotations: Annotations) -> Self {
        let mut vertex = Self::new();
        vertex.add_annotations(annotations);
        vertex
    }

    /// Builder-style annotation setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_annotation(key, value);
        self
    }

    /// Add an annotation. Empty keys are ignored.
    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !key.is_empty() {
            self.annotations.insert(key, value.into());
        }
    }

    /// Add every annotation from `annotations`. Empty keys are ignored.
    pub fn add_annotations(&mut self, annotations: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in annotations {
            self.add_annotation(key, value);
        }
    }

    /// Remove an annotation, returning its previous value.
    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.annotations.remove(key)
    }

    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// All annotations.
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// The `type` annotation, if present.
    pub fn vertex_type(&self) -> Option<&str> {
        self.annotation(TYPE_ANNOTATION)
    }

    /// Whether the vertex carries no annotations at all.
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Check that the vertex can be given an identity: some annotation other
    /// than `version_key` must be present.
    pub fn validate(&self, version_key: &str) -> Result<(), InputError> {
        if self.annotations.keys().all(|key| key == version_key) {
            return Err(InputError::EmptyVertex);
        }
        Ok(())
    }

    /// Copy of this vertex without the given annotation key.
    pub(crate) fn without(&self, key: &str) -> Vertex {
        let mut copy = self.clone();
        copy.annotations.remove(key);
        copy
    }
}

impl From<Annotations> for Vertex {
    fn from(annotations: Annotations) -> Self {
        Self::from_annotations(annotations)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vertex{{")?;
        for (i, (key, value)) in self.annotations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Snapshot of a vertex at one version, as pushed downstream.
///
/// Built explicitly from the identity's base annotations plus the version
/// annotation; never copied field-by-field from an upstream object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedVertex {
    /// Identity shared by every version of this entity.
    pub identity: VertexIdentity,
    /// Version number of this snapshot.
    pub version: u64,
    /// Base annotations plus the version annotation.
    pub vertex: Vertex,
}

impl VersionedVertex {
    /// Build a snapshot from base annotations.
    pub fn new(identity: VertexIdentity, version: u64, base: &Vertex, version_key: &str) -> Self {
        let vertex = base.clone().with(version_key, version.to_string());
        Self {
            identity,
            version,
            vertex,
        }
    }

    /// `(identity, version)` key of this snapshot.
    pub fn key(&self) -> (VertexIdentity, u64) {
        (self.identity, self.version)
    }
}

impl fmt::Display for VersionedVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.identity.short(), self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_keys_ignored() {
        let vertex = Vertex::new().with("", "x").with("pid", "1");
        assert_eq!(vertex.annotations().len(), 1);
        assert_eq!(vertex.annotation("pid"), Some("1"));
    }

    #[test]
    fn test_empty_vertex_invalid() {
        assert!(matches!(Vertex::new().validate("version"), Err(InputError::EmptyVertex)));
        assert!(Vertex::new().with("pid", "1").validate("version").is_ok());
    }

    #[test]
    fn test_version_only_vertex_invalid() {
        let vertex = Vertex::new().with("version", "3");
        assert!(matches!(vertex.validate("version"), Err(InputError::EmptyVertex)));
        // Under another version key the same annotation is content
        assert!(vertex.validate("rev").is_ok());
    }

    #[test]
    fn test_versioned_vertex_carries_version_annotation() {
        let base = Vertex::new().with("pid", "7").with(TYPE_ANNOTATION, "Process");
        let identity = VertexIdentity::from_bytes([1; 16]);
        let snapshot = VersionedVertex::new(identity, 3, &base, "version");

        assert_eq!(snapshot.vertex.annotation("version"), Some("3"));
        assert_eq!(snapshot.vertex.annotation("pid"), Some("7"));
        assert_eq!(snapshot.vertex.vertex_type(), Some("Process"));
        // Base is untouched
        assert!(base.annotation("version").is_none());
    }

    #[test]
    fn test_display_is_ordered() {
        let vertex = Vertex::new().with("b", "2").with("a", "1");
        assert_eq!(vertex.to_string(), "Vertex{a=1, b=2}");
    }
}
