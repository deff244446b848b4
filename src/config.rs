//! Filter configuration.
//!
//! ## Sources
//!
//! Configuration is a flat set of keys, read from (lowest priority first):
//!
//! 1. a config file of `key=value` lines (`#` starts a comment),
//! 2. an argument string such as `versionAnnotationName=version initialVersion=0`
//!    (values may be wrapped in `'` or `"` to include spaces).
//!
//! The same structure can also be read from JSON.
//!
//! ## Keys
//!
//! | Key | Required | Default |
//! |-----|----------|---------|
//! | `versionAnnotationName` | yes | |
//! | `initialVersion` | yes | |
//! | `policy` | no | `reachability` |
//! | `keepAllVertices` | no | `true` |
//! | `edgeAnnoKey` / `edgeAnnoValue` | no (both or neither) | unset |
//! | `closureLimit` | no | `65536` (`0` = search only) |
//! | `searchDepthLimit` | no | `0` (unbounded) |
//! | `hashAlgorithm` | no | `xxh3` |
//! | `stateBackend` | no | `memory` |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::canonical::HashAlgorithm;
use crate::policy::PolicyKind;
use crate::reachability::ReachabilityLimits;
use crate::store::StateBackendKind;

/// Key for the version annotation name.
pub const KEY_VERSION_ANNOTATION_NAME: &str = "versionAnnotationName";
/// Key for the initial version.
pub const KEY_INITIAL_VERSION: &str = "initialVersion";
/// Key for the cycle policy.
pub const KEY_POLICY: &str = "policy";
/// Key for eager vertex emission.
pub const KEY_KEEP_ALL_VERTICES: &str = "keepAllVertices";
/// Key for the version-link edge annotation key.
pub const KEY_EDGE_ANNO_KEY: &str = "edgeAnnoKey";
/// Key for the version-link edge annotation value.
pub const KEY_EDGE_ANNO_VALUE: &str = "edgeAnnoValue";
/// Key for the reachability closure limit.
pub const KEY_CLOSURE_LIMIT: &str = "closureLimit";
/// Key for the reachability search depth limit.
pub const KEY_SEARCH_DEPTH_LIMIT: &str = "searchDepthLimit";
/// Key for the identity hash algorithm.
pub const KEY_HASH_ALGORITHM: &str = "hashAlgorithm";
/// Key for the state backend.
pub const KEY_STATE_BACKEND: &str = "stateBackend";

const KNOWN_KEYS: &[&str] = &[
    KEY_VERSION_ANNOTATION_NAME,
    KEY_INITIAL_VERSION,
    KEY_POLICY,
    KEY_KEEP_ALL_VERTICES,
    KEY_EDGE_ANNO_KEY,
    KEY_EDGE_ANNO_VALUE,
    KEY_CLOSURE_LIMIT,
    KEY_SEARCH_DEPTH_LIMIT,
    KEY_HASH_ALGORITHM,
    KEY_STATE_BACKEND,
];

const DEFAULT_CLOSURE_LIMIT: usize = 65_536;

/// Configuration error. The only error class that stops the filter.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key is absent.
    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),
    /// A key has a value that cannot be used.
    #[error("Invalid value '{value}' for key '{key}': {reason}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Argument string or config file line could not be tokenized.
    #[error("Malformed arguments: {0}")]
    MalformedArguments(String),
    /// Config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// JSON config could not be parsed.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_closure_limit() -> usize {
    DEFAULT_CLOSURE_LIMIT
}

/// Versioning filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Annotation key that carries the version number on output vertices.
    pub version_annotation_name: String,
    /// Version given to newly seen identities.
    pub initial_version: u64,
    /// Cycle policy.
    #[serde(default)]
    pub policy: PolicyKind,
    /// Emit vertices as soon as they arrive rather than when an edge uses them.
    #[serde(default = "default_true")]
    pub keep_all_vertices: bool,
    /// Annotation key marking version-link edges.
    #[serde(default)]
    pub edge_anno_key: Option<String>,
    /// Annotation value marking version-link edges.
    #[serde(default)]
    pub edge_anno_value: Option<String>,
    /// Largest reachability closure set before falling back to search.
    #[serde(default = "default_closure_limit")]
    pub closure_limit: usize,
    /// Maximum reachability search depth; `0` is unbounded.
    #[serde(default)]
    pub search_depth_limit: usize,
    /// Identity hash algorithm.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Where version state lives.
    #[serde(default)]
    pub state_backend: StateBackendKind,
}

impl FilterConfig {
    /// Configuration with the required values and defaults elsewhere.
    pub fn new(version_annotation_name: impl Into<String>, initial_version: u64) -> Self {
        Self {
            version_annotation_name: version_annotation_name.into(),
            initial_version,
            policy: PolicyKind::default(),
            keep_all_vertices: true,
            edge_anno_key: None,
            edge_anno_value: None,
            closure_limit: DEFAULT_CLOSURE_LIMIT,
            search_depth_limit: 0,
            hash_algorithm: HashAlgorithm::default(),
            state_backend: StateBackendKind::default(),
        }
    }

    /// Builder-style policy setter.
    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    /// Builder-style setter for eager vertex emission.
    pub fn with_keep_all_vertices(mut self, keep: bool) -> Self {
        self.keep_all_vertices = keep;
        self
    }

    /// Builder-style setter for the version-link edge annotation.
    pub fn with_version_link(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.edge_anno_key = Some(key.into());
        self.edge_anno_value = Some(value.into());
        self
    }

    /// Builder-style setter for reachability limits (`0` depth = unbounded).
    pub fn with_reachability_limits(mut self, closure_limit: usize, search_depth_limit: usize) -> Self {
        self.closure_limit = closure_limit;
        self.search_depth_limit = search_depth_limit;
        self
    }

    /// Builder-style setter for the hash algorithm.
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Parse an argument string.
    pub fn from_arguments(arguments: &str) -> Result<Self, ConfigError> {
        Self::load(arguments, None)
    }

    /// Merge an optional config file with an argument string (arguments win).
    pub fn load(arguments: &str, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut map = match config_file {
            Some(path) => read_config_file(path)?,
            None => BTreeMap::new(),
        };
        map.extend(parse_key_value_pairs(arguments)?);
        Self::from_map(&map)
    }

    /// Parse JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from already-tokenized key/value pairs.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Ignoring unknown configuration key");
            }
        }

        let version_annotation_name = map
            .get(KEY_VERSION_ANNOTATION_NAME)
            .ok_or(ConfigError::MissingKey(KEY_VERSION_ANNOTATION_NAME))?
            .clone();
        let initial_version = parse_required(map, KEY_INITIAL_VERSION)?;

        let mut config = Self::new(version_annotation_name, initial_version);

        if let Some(value) = map.get(KEY_POLICY) {
            config.policy = PolicyKind::parse(value).ok_or_else(|| {
                ConfigError::invalid(KEY_POLICY, value, "expected 'causal' or 'reachability'")
            })?;
        }
        if let Some(value) = map.get(KEY_KEEP_ALL_VERTICES) {
            config.keep_all_vertices = parse_bool(value)
                .ok_or_else(|| ConfigError::invalid(KEY_KEEP_ALL_VERTICES, value, "expected a boolean"))?;
        }
        config.edge_anno_key = map.get(KEY_EDGE_ANNO_KEY).cloned();
        config.edge_anno_value = map.get(KEY_EDGE_ANNO_VALUE).cloned();
        if let Some(limit) = parse_optional(map, KEY_CLOSURE_LIMIT)? {
            config.closure_limit = limit;
        }
        if let Some(depth) = parse_optional(map, KEY_SEARCH_DEPTH_LIMIT)? {
            config.search_depth_limit = depth;
        }
        if let Some(value) = map.get(KEY_HASH_ALGORITHM) {
            config.hash_algorithm = HashAlgorithm::parse(value).ok_or_else(|| {
                ConfigError::invalid(KEY_HASH_ALGORITHM, value, "expected 'xxh3' or 'sha256'")
            })?;
        }
        if let Some(value) = map.get(KEY_STATE_BACKEND) {
            config.state_backend = StateBackendKind::parse(value)
                .ok_or_else(|| ConfigError::invalid(KEY_STATE_BACKEND, value, "expected 'memory'"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version_annotation_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                KEY_VERSION_ANNOTATION_NAME,
                &self.version_annotation_name,
                "must not be empty",
            ));
        }
        match (&self.edge_anno_key, &self.edge_anno_value) {
            (None, None) => {}
            (Some(key), Some(_)) if key.trim().is_empty() => {
                return Err(ConfigError::invalid(KEY_EDGE_ANNO_KEY, key, "must not be empty"));
            }
            (Some(key), Some(_)) if *key == self.version_annotation_name => {
                return Err(ConfigError::invalid(
                    KEY_EDGE_ANNO_KEY,
                    key,
                    "must differ from the version annotation name",
                ));
            }
            (Some(_), Some(_)) => {}
            (Some(key), None) => {
                return Err(ConfigError::invalid(
                    KEY_EDGE_ANNO_KEY,
                    key,
                    format!("requires '{KEY_EDGE_ANNO_VALUE}'"),
                ));
            }
            (None, Some(value)) => {
                return Err(ConfigError::invalid(
                    KEY_EDGE_ANNO_VALUE,
                    value,
                    format!("requires '{KEY_EDGE_ANNO_KEY}'"),
                ));
            }
        }
        Ok(())
    }

    /// Reachability index limits.
    pub fn reachability_limits(&self) -> ReachabilityLimits {
        ReachabilityLimits {
            closure_limit: self.closure_limit,
            search_depth_limit: (self.search_depth_limit > 0).then_some(self.search_depth_limit),
        }
    }

    /// Annotation placed on version-link edges, when configured.
    pub fn version_link(&self) -> Option<(String, String)> {
        match (&self.edge_anno_key, &self.edge_anno_value) {
            (Some(key), Some(value)) => Some((key.clone(), value.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}={}, {}={}, {}={}, {}={}, {}={}, {}={}, {}={}, {}={}, {}={}, {}={}}}",
            KEY_VERSION_ANNOTATION_NAME,
            self.version_annotation_name,
            KEY_INITIAL_VERSION,
            self.initial_version,
            KEY_POLICY,
            self.policy,
            KEY_KEEP_ALL_VERTICES,
            self.keep_all_vertices,
            KEY_EDGE_ANNO_KEY,
            self.edge_anno_key.as_deref().unwrap_or("-"),
            KEY_EDGE_ANNO_VALUE,
            self.edge_anno_value.as_deref().unwrap_or("-"),
            KEY_CLOSURE_LIMIT,
            self.closure_limit,
            KEY_SEARCH_DEPTH_LIMIT,
            self.search_depth_limit,
            KEY_HASH_ALGORITHM,
            self.hash_algorithm,
            KEY_STATE_BACKEND,
            self.state_backend,
        )
    }
}

fn parse_required<T>(map: &BTreeMap<String, String>, key: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    parse_optional(map, key)?.ok_or(ConfigError::MissingKey(key))
}

fn parse_optional<T>(map: &BTreeMap<String, String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn pair_regex() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| {
        Regex::new(r#"([^\s=]+)=(?:"([^"]*)"|'([^']*)'|(\S*))"#).expect("valid key=value pattern")
    })
}

/// Tokenize `a=b c='d' e="f f"` into key/value pairs.
///
/// Later duplicates override earlier ones. Anything between pairs other than
/// whitespace is rejected.
pub fn parse_key_value_pairs(arguments: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut map = BTreeMap::new();
    let mut cursor = 0;

    for caps in pair_regex().captures_iter(arguments) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = &arguments[cursor..whole.start()];
        if !gap.trim().is_empty() {
            return Err(ConfigError::MalformedArguments(format!(
                "unexpected '{}'",
                gap.trim()
            )));
        }
        cursor = whole.end();

        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        map.insert(key.to_string(), value.to_string());
    }

    let rest = &arguments[cursor..];
    if !rest.trim().is_empty() {
        return Err(ConfigError::MalformedArguments(format!(
            "unexpected '{}'",
            rest.trim()
        )));
    }
    Ok(map)
}

/// Read `key=value` lines from a file. A missing file yields no keys.
pub fn read_config_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Config file absent, using arguments only");
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut map = BTreeMap::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedArguments(format!(
                "{}:{}: expected key=value",
                path.display(),
                number + 1
            )));
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_arguments() {
        let config = FilterConfig::from_arguments("versionAnnotationName=version initialVersion=0").unwrap();
        assert_eq!(config, FilterConfig::new("version", 0));
        assert_eq!(config.policy, PolicyKind::Reachability);
        assert!(config.keep_all_vertices);
        assert_eq!(config.version_link(), None);
    }

    #[test]
    fn test_full_arguments() {
        let args = "versionAnnotationName='vow version' initialVersion=3 policy=causal \
                    keepAllVertices=no edgeAnnoKey=operation edgeAnnoValue=\"update version\" \
                    closureLimit=10 searchDepthLimit=4 hashAlgorithm=sha256 stateBackend=memory";
        let config = FilterConfig::from_arguments(args).unwrap();

        assert_eq!(config.version_annotation_name, "vow version");
        assert_eq!(config.initial_version, 3);
        assert_eq!(config.policy, PolicyKind::Causal);
        assert!(!config.keep_all_vertices);
        assert_eq!(
            config.version_link(),
            Some(("operation".to_string(), "update version".to_string()))
        );
        assert_eq!(
            config.reachability_limits(),
            ReachabilityLimits { closure_limit: 10, search_depth_limit: Some(4) }
        );
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_missing_required_keys() {
        let err = FilterConfig::from_arguments("initialVersion=0").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(KEY_VERSION_ANNOTATION_NAME)));

        let err = FilterConfig::from_arguments("versionAnnotationName=version").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(KEY_INITIAL_VERSION)));
    }

    #[test]
    fn test_unparseable_version() {
        let err = FilterConfig::from_arguments("versionAnnotationName=v initialVersion=one").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_INITIAL_VERSION));

        let err = FilterConfig::from_arguments("versionAnnotationName=v initialVersion=-1").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_version_name_rejected() {
        let err = FilterConfig::from_arguments("versionAnnotationName='' initialVersion=0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_half_version_link_rejected() {
        let err = FilterConfig::from_arguments(
            "versionAnnotationName=version initialVersion=0 edgeAnnoKey=operation",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_EDGE_ANNO_KEY));
    }

    #[test]
    fn test_bad_enum_values_rejected() {
        for args in [
            "versionAnnotationName=v initialVersion=0 policy=magic",
            "versionAnnotationName=v initialVersion=0 hashAlgorithm=md5",
            "versionAnnotationName=v initialVersion=0 stateBackend=rocksdb",
            "versionAnnotationName=v initialVersion=0 keepAllVertices=maybe",
        ] {
            assert!(FilterConfig::from_arguments(args).is_err(), "{args} should fail");
        }
    }

    #[test]
    fn test_malformed_arguments() {
        let err = parse_key_value_pairs("a=b garbage c=d").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedArguments(_)));
        assert!(parse_key_value_pairs("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_values() {
        let map = parse_key_value_pairs(r#"a=b c='d' e="f f""#).unwrap();
        assert_eq!(map.get("a").map(String::as_str), Some("b"));
        assert_eq!(map.get("c").map(String::as_str), Some("d"));
        assert_eq!(map.get("e").map(String::as_str), Some("f f"));
    }

    #[test]
    fn test_config_file_overridden_by_arguments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# versioning defaults").unwrap();
        writeln!(file, "versionAnnotationName = version").unwrap();
        writeln!(file, "initialVersion = 1").unwrap();
        writeln!(file, "policy = causal").unwrap();

        let config = FilterConfig::load("initialVersion=5", Some(file.path())).unwrap();
        assert_eq!(config.version_annotation_name, "version");
        assert_eq!(config.initial_version, 5);
        assert_eq!(config.policy, PolicyKind::Causal);
    }

    #[test]
    fn test_missing_config_file_ignored() {
        let path = Path::new("/nonexistent/provenance-versioner.config");
        let config = FilterConfig::load("versionAnnotationName=v initialVersion=0", Some(path)).unwrap();
        assert_eq!(config.initial_version, 0);
    }

    #[test]
    fn test_malformed_config_file_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "versionAnnotationName").unwrap();
        let err = read_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedArguments(_)));
    }

    #[test]
    fn test_json_config() {
        let config = FilterConfig::from_json(
            r#"{"versionAnnotationName": "version", "initialVersion": 2, "policy": "causal"}"#,
        )
        .unwrap();
        assert_eq!(config.initial_version, 2);
        assert_eq!(config.policy, PolicyKind::Causal);
        assert!(config.keep_all_vertices);
        assert_eq!(config.closure_limit, DEFAULT_CLOSURE_LIMIT);

        assert!(FilterConfig::from_json(r#"{"initialVersion": 2}"#).is_err());
    }
}
