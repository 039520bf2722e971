//! Core data types for dirscout.
//!
//! This module defines the data structures shared by the cache, the bounded
//! search and the fuzzy index. Persisted types serialize to the exact JSON
//! shapes of the cache and index files; the rest are produced fresh per call.

use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which cached directory set a discovered directory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    /// Directories holding registry workbooks
    Registry,
    /// Directories holding test data
    Inf,
}

impl DirectoryKind {
    /// All kinds in the order the bounded search consults them.
    pub const ALL: [DirectoryKind; 2] = [DirectoryKind::Registry, DirectoryKind::Inf];

    /// Name used in log messages and status output
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryKind::Registry => "registry",
            DirectoryKind::Inf => "inf",
        }
    }
}

impl fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted state of the directory cache.
///
/// Every path stored here existed when it was written. Existence is checked
/// again lazily when the path is read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheRecord {
    /// Directories that held registry-like matches
    pub registry_directories: Vec<String>,

    /// Directories that held inf-like matches
    pub inf_directories: Vec<String>,

    /// Logical target name to the absolute path it resolved to
    pub exact_paths: BTreeMap<String, String>,
}

impl CacheRecord {
    /// Directory set for a kind.
    pub fn directories(&self, kind: DirectoryKind) -> &[String] {
        match kind {
            DirectoryKind::Registry => &self.registry_directories,
            DirectoryKind::Inf => &self.inf_directories,
        }
    }

    /// Mutable directory set for a kind.
    pub fn directories_mut(&mut self, kind: DirectoryKind) -> &mut Vec<String> {
        match kind {
            DirectoryKind::Registry => &mut self.registry_directories,
            DirectoryKind::Inf => &mut self.inf_directories,
        }
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.registry_directories.is_empty()
            && self.inf_directories.is_empty()
            && self.exact_paths.is_empty()
    }
}

/// Summary of the cache for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub cache_file: PathBuf,
    pub cache_exists: bool,
    pub registry_directories: usize,
    pub inf_directories: usize,
    pub valid_registry_directories: usize,
    pub valid_inf_directories: usize,
    pub exact_paths: usize,
    pub is_valid: bool,
}

/// One named thing to find: a logical name and the literal file or directory
/// name it corresponds to on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    /// Caller-facing key (e.g. `LAB_REGISTRY_FILE`)
    pub logical_name: String,

    /// Name to match on disk, case-insensitively (e.g. `Registro LAB.xlsx`)
    pub literal_name: String,
}

impl SearchTarget {
    pub fn new(logical_name: impl Into<String>, literal_name: impl Into<String>) -> Self {
        SearchTarget {
            logical_name: logical_name.into(),
            literal_name: literal_name.into(),
        }
    }

    /// Lowercased literal name used for matching
    pub fn literal_lower(&self) -> String {
        self.literal_name.to_lowercase()
    }

    /// Whether the literal name looks like a file (has an extension).
    pub fn expects_file(&self) -> bool {
        Path::new(self.literal_name.trim())
            .extension()
            .is_some_and(|ext| !ext.is_empty())
    }
}

/// An ordered, validated set of search targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    targets: Vec<SearchTarget>,
}

impl TargetSet {
    /// Build a target set from `(logical, literal)` pairs.
    ///
    /// Fails on empty names or a logical name given twice.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let targets = pairs
            .into_iter()
            .map(|(logical, literal)| SearchTarget::new(logical, literal))
            .collect();
        Self::new(targets)
    }

    /// Build a target set from already constructed targets.
    pub fn new(targets: Vec<SearchTarget>) -> Result<Self> {
        let mut seen = HashSet::new();
        for target in &targets {
            if target.logical_name.trim().is_empty() {
                return Err(ScoutError::invalid_target(format!(
                    "empty logical name for literal '{}'",
                    target.literal_name
                )));
            }
            if target.literal_name.trim().is_empty() {
                return Err(ScoutError::invalid_target(format!(
                    "empty literal name for '{}'",
                    target.logical_name
                )));
            }
            if !seen.insert(target.logical_name.as_str()) {
                return Err(ScoutError::invalid_target(format!(
                    "duplicate logical name '{}'",
                    target.logical_name
                )));
            }
        }
        Ok(TargetSet { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchTarget> {
        self.targets.iter()
    }

    /// Look up a target by logical name.
    pub fn get(&self, logical_name: &str) -> Option<&SearchTarget> {
        self.targets.iter().find(|t| t.logical_name == logical_name)
    }

    /// Keep only the targets accepted by `keep`, preserving order.
    pub fn filtered(&self, mut keep: impl FnMut(&SearchTarget) -> bool) -> TargetSet {
        TargetSet {
            targets: self.targets.iter().filter(|t| keep(t)).cloned().collect(),
        }
    }
}

/// Where a resolved path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    /// The exact-path cache entry still existed
    ExactCache,
    /// Found by a bounded scan of a cached directory
    CachedDirectory,
    /// Found by the full walk of the root
    FullWalk,
    /// Supplied by the user
    Manual,
}

impl fmt::Display for MatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOrigin::ExactCache => write!(f, "exact-cache"),
            MatchOrigin::CachedDirectory => write!(f, "cached-directory"),
            MatchOrigin::FullWalk => write!(f, "full-walk"),
            MatchOrigin::Manual => write!(f, "manual"),
        }
    }
}

/// Resolution state of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub logical_name: String,
    pub literal_name: String,
    pub path: Option<PathBuf>,
    pub origin: Option<MatchOrigin>,
}

/// Result of resolving a target set: every logical name maps to an optional
/// path. Unresolved targets stay in the result as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    targets: Vec<ResolvedTarget>,
}

impl Resolution {
    /// Start a resolution with every target unresolved.
    pub fn unresolved(targets: &TargetSet) -> Self {
        Resolution {
            targets: targets
                .iter()
                .map(|t| ResolvedTarget {
                    logical_name: t.logical_name.clone(),
                    literal_name: t.literal_name.clone(),
                    path: None,
                    origin: None,
                })
                .collect(),
        }
    }

    /// Record a hit for a logical name. Returns false if the name is unknown.
    pub fn resolve(&mut self, logical_name: &str, path: PathBuf, origin: MatchOrigin) -> bool {
        match self.targets.iter_mut().find(|t| t.logical_name == logical_name) {
            Some(target) => {
                target.path = Some(path);
                target.origin = Some(origin);
                true
            }
            None => false,
        }
    }

    /// Resolved path for a logical name.
    pub fn get(&self, logical_name: &str) -> Option<&Path> {
        self.targets
            .iter()
            .find(|t| t.logical_name == logical_name)
            .and_then(|t| t.path.as_deref())
    }

    /// How a logical name was resolved.
    pub fn origin(&self, logical_name: &str) -> Option<MatchOrigin> {
        self.targets
            .iter()
            .find(|t| t.logical_name == logical_name)
            .and_then(|t| t.origin)
    }

    pub fn is_resolved(&self, logical_name: &str) -> bool {
        self.get(logical_name).is_some()
    }

    /// True when every target has a path.
    pub fn is_complete(&self) -> bool {
        self.targets.iter().all(|t| t.path.is_some())
    }

    pub fn found_count(&self) -> usize {
        self.targets.iter().filter(|t| t.path.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Logical names still without a path, in target order.
    pub fn missing(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.path.is_none())
            .map(|t| t.logical_name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTarget> {
        self.targets.iter()
    }

    /// Plain logical name to optional path map.
    pub fn to_map(&self) -> BTreeMap<String, Option<PathBuf>> {
        self.targets
            .iter()
            .map(|t| (t.logical_name.clone(), t.path.clone()))
            .collect()
    }
}

/// One candidate file in the fuzzy index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Normalized identifier this entry is filed under (the map key on disk)
    #[serde(skip)]
    pub id: String,

    /// Absolute path of the file
    pub path: String,

    /// Filename including extension
    pub name: String,

    /// Four-digit year extracted from the filename, if any
    pub year: Option<String>,

    /// Modification time in seconds since the Unix epoch
    pub mtime: f64,
}

impl IndexEntry {
    /// Restore the skipped identifier after deserialization.
    pub fn init_id(&mut self, id: &str) {
        if self.id.is_empty() {
            self.id = id.to_string();
        }
    }
}

/// Fingerprint of the indexed tree taken at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexMetadata {
    /// Build time in seconds since the Unix epoch
    pub generated_on: f64,

    /// Number of files with an indexed extension
    pub file_count: u64,

    /// Latest modification time among those files
    pub max_mtime: f64,
}
