//! Canonical annotation encoding and vertex identity hashing.
//!
//! ## Determinism Guarantees
//!
//! - Stable key order: annotations live in a `BTreeMap`
//! - Unambiguous framing: every key and value is length-prefixed, so
//!   `{"ab": "c"}` and `{"a": "bc"}` never encode to the same bytes
//! - Version-agnostic: the configured version annotation is excluded, so every
//!   version of a vertex shares one identity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_128;

use crate::types::{Annotations, Vertex, VertexIdentity, IDENTITY_BYTES};

/// Encode annotations canonically, skipping `exclude_key` if given.
pub fn to_canonical_bytes(annotations: &Annotations, exclude_key: Option<&str>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(annotations.len() * 32);
    for (key, value) in annotations {
        if Some(key.as_str()) == exclude_key {
            continue;
        }
        push_framed(&mut bytes, key.as_bytes());
        push_framed(&mut bytes, value.as_bytes());
    }
    bytes
}

fn push_framed(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u64).to_le_bytes());
    out.extend_from_slice(field);
}

/// Produces a stable content hash for a vertex.
pub trait IdentityHasher: Send + Sync {
    /// Short algorithm name for logs.
    fn name(&self) -> &'static str;

    /// Hash canonical annotation bytes to an identity.
    fn hash_bytes(&self, bytes: &[u8]) -> VertexIdentity;

    /// Identity of `vertex`, ignoring the `version_key` annotation.
    fn identity(&self, vertex: &Vertex, version_key: &str) -> VertexIdentity {
        self.hash_bytes(&to_canonical_bytes(vertex.annotations(), Some(version_key)))
    }
}

/// XXH3-128. Fast, non-cryptographic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Hasher;

impl IdentityHasher for Xxh3Hasher {
    fn name(&self) -> &'static str {
        "xxh3"
    }

    fn hash_bytes(&self, bytes: &[u8]) -> VertexIdentity {
        VertexIdentity::from_bytes(xxh3_128(bytes).to_be_bytes())
    }
}

/// SHA-256 truncated to 128 bits. For streams where identities must resist
/// deliberate collisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl IdentityHasher for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hash_bytes(&self, bytes: &[u8]) -> VertexIdentity {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; IDENTITY_BYTES];
        out.copy_from_slice(&digest[..IDENTITY_BYTES]);
        VertexIdentity::from_bytes(out)
    }
}

/// Selectable identity hash algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// [`Xxh3Hasher`].
    #[default]
    Xxh3,
    /// [`Sha256Hasher`].
    Sha256,
}

impl HashAlgorithm {
    /// Parse from a config value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "xxh3" => Some(Self::Xxh3),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Build the hasher.
    pub fn hasher(self) -> Box<dyn IdentityHasher> {
        match self {
            Self::Xxh3 => Box::new(Xxh3Hasher),
            Self::Sha256 => Box::new(Sha256Hasher),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xxh3 => write!(f, "xxh3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(pid: &str) -> Vertex {
        Vertex::new().with("type", "Process").with("pid", pid)
    }

    #[test]
    fn test_determinism() {
        let hasher = Xxh3Hasher;
        let h1 = hasher.identity(&process("1"), "version");
        let h2 = hasher.identity(&process("1"), "version");
        assert_eq!(h1, h2);
        assert_ne!(h1, hasher.identity(&process("2"), "version"));
    }

    #[test]
    fn test_version_annotation_ignored() {
        for algorithm in [HashAlgorithm::Xxh3, HashAlgorithm::Sha256] {
            let hasher = algorithm.hasher();
            let plain = hasher.identity(&process("1"), "version");
            let versioned = hasher.identity(&process("1").with("version", "4"), "version");
            assert_eq!(plain, versioned, "{} must ignore the version key", hasher.name());
        }
    }

    #[test]
    fn test_framing_is_unambiguous() {
        let a = Vertex::new().with("ab", "c");
        let b = Vertex::new().with("a", "bc");
        assert_ne!(
            to_canonical_bytes(a.annotations(), None),
            to_canonical_bytes(b.annotations(), None)
        );
    }

    #[test]
    fn test_algorithms_differ() {
        let v = process("1");
        assert_ne!(
            Xxh3Hasher.identity(&v, "version"),
            Sha256Hasher.identity(&v, "version")
        );
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(HashAlgorithm::parse("SHA256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("md5"), None);
    }
}
