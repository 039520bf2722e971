//! Configuration management for dirscout.
//!
//! Configuration is stored in TOML format in a platform-appropriate location.
//! Every field has a default, so an absent or partial file is fine.

use crate::cache::{CACHE_FILE_NAME, CACHE_PATH_ENV};
use crate::error::{Result, ScoutError};
use crate::types::{DirectoryKind, TargetSet};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure for dirscout.
///
/// ## Example Configuration File (dirscout.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
///
/// [search]
/// max_depth = 3
/// dir_timeout_ms = 2000
///
/// [index]
/// marker = "LF"
/// rebuild_interval_secs = 3600
///
/// [roots]
/// anchor = "UTE_wrk"
///
/// [targets]
/// LAB_REGISTRY_FILE = "Registro LAB.xlsx"
/// NOISE_TEST_DIR = "Tests Rumore"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Bounded search tuning
    pub search: SearchConfig,

    /// Fuzzy index settings
    pub index: IndexConfig,

    /// Search root discovery
    pub roots: RootsConfig,

    /// Logical name to literal file/directory name
    pub targets: TargetsConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Cache file location (None = environment or default location)
    pub cache_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            cache_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Bounded search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Levels below a cached directory that the fast path looks into
    pub max_depth: usize,

    /// Time budget for scanning one cached directory, in milliseconds
    pub dir_timeout_ms: u64,

    /// Names starting with this are office lock/temp files and never match
    pub temp_file_prefix: String,

    /// Matched names containing one of these are registry-like
    pub registry_keywords: Vec<String>,

    /// Matched names containing one of these are inf-like
    pub inf_keywords: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_depth: 3,
            dir_timeout_ms: 2000,
            temp_file_prefix: "~".to_string(),
            registry_keywords: vec!["registro".to_string(), "lab".to_string()],
            inf_keywords: vec!["prove".to_string(), "test".to_string(), ".inf".to_string()],
        }
    }
}

impl SearchConfig {
    /// Time budget per cached directory
    pub fn dir_timeout(&self) -> Duration {
        Duration::from_millis(self.dir_timeout_ms)
    }

    /// Whether a name is an office temp/lock file
    pub fn is_temp_file(&self, name: &str) -> bool {
        !self.temp_file_prefix.is_empty() && name.starts_with(&self.temp_file_prefix)
    }

    /// Bucket a matched name into a directory kind. Registry keywords win when
    /// both match; names matching neither are not cached at directory level.
    pub fn classify(&self, name: &str) -> Option<DirectoryKind> {
        let lower = name.to_lowercase();
        let hit = |keywords: &[String]| {
            keywords
                .iter()
                .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
        };
        if hit(&self.registry_keywords) {
            Some(DirectoryKind::Registry)
        } else if hit(&self.inf_keywords) {
            Some(DirectoryKind::Inf)
        } else {
            None
        }
    }
}

/// Fuzzy index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File extensions to index, with leading dot
    pub extensions: Vec<String>,

    /// Token that introduces an identifier in filenames
    pub marker: String,

    /// Seconds after which an index is rebuilt regardless of its fingerprint
    pub rebuild_interval_secs: u64,

    /// Name of the index file created inside the indexed root
    pub file_name: String,

    /// Explicit index file location (None = inside the indexed root)
    pub index_path: Option<PathBuf>,

    /// Root to index (None = the resolved `index_root_target`)
    pub root: Option<PathBuf>,

    /// Logical target whose resolved directory is indexed by default
    pub index_root_target: String,

    /// Start a background rebuild when the index is known stale on open
    pub background: bool,

    /// Files starting with this (Office lock files) are never indexed
    pub temp_file_prefix: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            extensions: vec![
                ".xls".to_string(),
                ".xlsx".to_string(),
                ".xlsm".to_string(),
                ".xlsb".to_string(),
            ],
            marker: "LF".to_string(),
            rebuild_interval_secs: 3600,
            file_name: ".lf_index_cache.json".to_string(),
            index_path: None,
            root: None,
            index_root_target: "LF_BASE_DIR".to_string(),
            background: true,
            temp_file_prefix: "~".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_secs)
    }

    /// Whether a lowercase extension (without dot) is indexed
    pub fn indexes_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    pub fn is_temp_file(&self, name: &str) -> bool {
        !self.temp_file_prefix.is_empty() && name.starts_with(&self.temp_file_prefix)
    }

    /// Index file for a root: the explicit path, or `file_name` inside it.
    pub fn index_file_for(&self, root: &Path) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| root.join(&self.file_name))
    }
}

/// Search root discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootsConfig {
    /// Explicit search root; skips sync folder discovery
    pub root: Option<PathBuf>,

    /// Directory under the sync root that narrows every search
    pub anchor: Option<String>,

    /// Relative locations under the sync root checked for the anchor first
    pub anchor_subpaths: Vec<PathBuf>,

    /// How deep to look for the anchor when it is not at a known location
    pub anchor_max_depth: usize,
}

impl Default for RootsConfig {
    fn default() -> Self {
        RootsConfig {
            root: None,
            anchor: Some("UTE_wrk".to_string()),
            anchor_subpaths: vec![
                PathBuf::from("ENG & Quality/UTE_wrk"),
                PathBuf::from("Engineering/UTE_wrk"),
                PathBuf::from("UTE_wrk"),
            ],
            anchor_max_depth: 3,
        }
    }
}

/// The named targets to resolve at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetsConfig(pub BTreeMap<String, String>);

impl Default for TargetsConfig {
    fn default() -> Self {
        let pairs = [
            ("PERFORMANCE_TEST_DIR", "ProveEffettuate"),
            ("NOISE_TEST_DIR", "Tests Rumore"),
            ("LAB_REGISTRY_FILE", "Registro LAB.xlsx"),
            ("NOISE_REGISTRY_FILE", "REGISTRO RUMORE.xlsx"),
            ("LF_REGISTRY_FILE", "REGISTRO LF .xlsx"),
            ("LF_BASE_DIR", "RELIABIL"),
            ("TEST_LAB_CARICHI_DIR", "CARICHI NOMINALI"),
        ];
        TargetsConfig(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl TargetsConfig {
    /// Validated target set
    pub fn target_set(&self) -> Result<TargetSet> {
        TargetSet::from_pairs(self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| ScoutError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| ScoutError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "dirscout").ok_or_else(|| ScoutError::ConfigError {
            reason: "Could not determine home directory".to_string(),
        })
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("dirscout.toml"))
    }

    /// Get the default per-user data directory.
    pub fn default_data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Cache file location.
    ///
    /// Priority: `explicit` argument, then the `DIRSCOUT_CACHE_FILE`
    /// environment variable, then `general.cache_path`, then the per-user
    /// data directory.
    pub fn cache_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let env = std::env::var_os(CACHE_PATH_ENV).map(PathBuf::from);
        self.cache_path_with(explicit, env)
    }

    fn cache_path_with(&self, explicit: Option<&Path>, env: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(path);
        }
        if let Some(ref path) = self.general.cache_path {
            return Ok(path.clone());
        }
        Ok(Self::default_data_dir()?.join(CACHE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.max_depth, 3);
        assert_eq!(config.search.dir_timeout(), Duration::from_secs(2));
        assert_eq!(config.index.rebuild_interval_secs, 3600);
        assert_eq!(config.index.marker, "LF");
        assert!(config.targets.0.contains_key("LAB_REGISTRY_FILE"));
        assert!(config.targets.target_set().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.search.max_depth = 5;
        config.targets.0.insert("EXTRA".to_string(), "Extra Dir".to_string());

        config.save_to(&config_path).unwrap();
        let loaded = Config::load_from(&config_path).unwrap();

        assert_eq!(loaded.search.max_depth, 5);
        assert_eq!(loaded.targets.0.get("EXTRA").map(String::as_str), Some("Extra Dir"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[search]\ndir_timeout_ms = 500\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.search.dir_timeout_ms, 500);
        assert_eq!(config.search.max_depth, 3);
        assert_eq!(config.index.file_name, ".lf_index_cache.json");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[search\nmax_depth = ").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, ScoutError::ConfigError { .. }));
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.search.max_depth, 3);
    }

    #[test]
    fn test_classify() {
        let search = SearchConfig::default();
        assert_eq!(search.classify("Registro LAB.xlsx"), Some(DirectoryKind::Registry));
        assert_eq!(search.classify("REGISTRO RUMORE.xlsx"), Some(DirectoryKind::Registry));
        assert_eq!(search.classify("ProveEffettuate"), Some(DirectoryKind::Inf));
        assert_eq!(search.classify("Tests Rumore"), Some(DirectoryKind::Inf));
        assert_eq!(search.classify("CARICHI NOMINALI"), None);
    }

    #[test]
    fn test_temp_file_prefix() {
        let search = SearchConfig::default();
        assert!(search.is_temp_file("~$Registro LAB.xlsx"));
        assert!(!search.is_temp_file("Registro LAB.xlsx"));

        let index = IndexConfig::default();
        assert!(index.is_temp_file("~$LF 053-18.xlsx"));
        assert!(!index.is_temp_file("LF 053-18.xlsx"));
    }

    #[test]
    fn test_cache_path_priority() {
        let mut config = Config::default();
        let explicit = PathBuf::from("/explicit/cache.json");
        let env = PathBuf::from("/env/cache.json");

        assert_eq!(
            config.cache_path_with(Some(&explicit), Some(env.clone())).unwrap(),
            explicit
        );
        assert_eq!(config.cache_path_with(None, Some(env.clone())).unwrap(), env);

        config.general.cache_path = Some(PathBuf::from("/configured/cache.json"));
        assert_eq!(
            config.cache_path_with(None, None).unwrap(),
            PathBuf::from("/configured/cache.json")
        );
        assert_eq!(
            config.cache_path_with(None, Some(PathBuf::new())).unwrap(),
            PathBuf::from("/configured/cache.json")
        );
    }

    #[test]
    fn test_index_extension_and_file() {
        let index = IndexConfig::default();
        assert!(index.indexes_extension("xlsx"));
        assert!(index.indexes_extension("XLSB"));
        assert!(!index.indexes_extension("csv"));
        assert_eq!(
            index.index_file_for(Path::new("/lf")),
            PathBuf::from("/lf/.lf_index_cache.json")
        );
    }
}
