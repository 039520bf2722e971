//! Application-level path locator.
//!
//! `Locator` owns everything needed to answer "where is X?" for the configured
//! named targets: the filesystem, the directory cache, the bounded search and
//! the resolution state. Nothing is resolved at construction; the first
//! `initialize` or `ensure_initialized` call does the work, and asking for a
//! path before that is an error rather than a silent `None`.

use crate::backend::{FileSystem, LocalFileSystem};
use crate::cache::DirectoryCache;
use crate::config::Config;
use crate::error::{Result, ScoutError};
use crate::fuzzy_index::{FuzzyFileIndex, RebuildHandle};
use crate::roots;
use crate::search::TreeSearch;
use crate::types::{CacheInfo, DirectoryKind, MatchOrigin, Resolution, SearchTarget, TargetSet};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Resolution state of a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorState {
    Uninitialized,
    Resolved { root: PathBuf, resolution: Resolution },
}

/// Resolves and remembers the configured named targets.
pub struct Locator {
    config: Config,
    fs: Arc<dyn FileSystem>,
    search: TreeSearch,
    targets: TargetSet,
    state: RwLock<LocatorState>,
}

impl Locator {
    /// Locator over the local filesystem with the cache at its configured
    /// location.
    pub fn new(config: Config) -> Result<Self> {
        let cache_path = config.cache_path(None)?;
        let cache = Arc::new(DirectoryCache::open(cache_path));
        Self::with_parts(config, LocalFileSystem::shared(), cache)
    }

    /// Locator over an explicit filesystem and cache.
    pub fn with_parts(config: Config, fs: Arc<dyn FileSystem>, cache: Arc<DirectoryCache>) -> Result<Self> {
        let targets = config.targets.target_set()?;
        let search = TreeSearch::new(fs.clone(), cache, config.search.clone());
        Ok(Locator {
            config,
            fs,
            search,
            targets,
            state: RwLock::new(LocatorState::Uninitialized),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        self.search.cache()
    }

    pub fn state(&self) -> LocatorState {
        self.state.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), LocatorState::Resolved { .. })
    }

    /// Root the current resolution was made under.
    pub fn root(&self) -> Option<PathBuf> {
        match &*self.state.read() {
            LocatorState::Resolved { root, .. } => Some(root.clone()),
            LocatorState::Uninitialized => None,
        }
    }

    /// Resolve every configured target under `root` and remember the result.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn initialize(&self, root: &Path) -> Resolution {
        let resolution = self.search.resolve(root, &self.targets);
        info!(
            found = resolution.found_count(),
            total = resolution.len(),
            "Locator initialized"
        );
        *self.state.write() = LocatorState::Resolved {
            root: root.to_path_buf(),
            resolution: resolution.clone(),
        };
        resolution
    }

    /// Resolve an ad-hoc target set under `root` through the shared cache,
    /// leaving the locator state alone.
    pub fn resolve(&self, root: &Path, targets: &TargetSet) -> Resolution {
        self.search.resolve(root, targets)
    }

    /// The search root from the roots configuration: the explicit root, or
    /// the sync root narrowed to the anchor.
    pub fn discover_root(&self) -> Result<PathBuf> {
        roots::discover_search_root(self.fs.as_ref(), &self.config.roots)
    }

    /// The current resolution, discovering the root and resolving first if
    /// nothing has been resolved yet.
    pub fn ensure_initialized(&self) -> Result<Resolution> {
        if let LocatorState::Resolved { resolution, .. } = &*self.state.read() {
            return Ok(resolution.clone());
        }
        let root = self.discover_root()?;
        Ok(self.initialize(&root))
    }

    /// The current resolution.
    pub fn resolution(&self) -> Result<Resolution> {
        match &*self.state.read() {
            LocatorState::Resolved { resolution, .. } => Ok(resolution.clone()),
            LocatorState::Uninitialized => Err(ScoutError::NotInitialized),
        }
    }

    /// Resolved path of a configured target.
    pub fn path(&self, logical_name: &str) -> Result<Option<PathBuf>> {
        self.target(logical_name)?;
        match &*self.state.read() {
            LocatorState::Resolved { resolution, .. } => {
                Ok(resolution.get(logical_name).map(Path::to_path_buf))
            }
            LocatorState::Uninitialized => Err(ScoutError::NotInitialized),
        }
    }

    /// Point a target at a user-supplied path.
    ///
    /// Directory targets need an existing directory. File targets need an
    /// existing file with the same extension as the target's literal name. The
    /// path is cached so later runs pick it up without walking.
    pub fn set_manual_path(&self, logical_name: &str, path: impl AsRef<Path>) -> Result<PathBuf> {
        let target = self.target(logical_name)?.clone();
        let path = path.as_ref().to_path_buf();
        validate_manual_path(&target, &path)?;

        let cache = self.search.cache();
        cache.cache_exact_path(logical_name, &path);
        if let Some(parent) = path.parent() {
            let kind = self.config.search.classify(&target.literal_name).unwrap_or(
                if target.expects_file() {
                    DirectoryKind::Registry
                } else {
                    DirectoryKind::Inf
                },
            );
            // Keeps the cache valid so the exact path is consulted next time
            cache.add_directory(kind, parent);
        }

        if let LocatorState::Resolved { resolution, .. } = &mut *self.state.write() {
            resolution.resolve(logical_name, path.clone(), MatchOrigin::Manual);
        }
        info!(target = %logical_name, path = %path.display(), "Manually set target path");
        Ok(path)
    }

    /// Drop the cache and resolve everything again from scratch.
    ///
    /// Uses the current root when initialized, otherwise discovers one.
    pub fn refresh(&self) -> Result<Resolution> {
        let root = match self.root() {
            Some(root) => root,
            None => self.discover_root()?,
        };
        Ok(self.refresh_under(&root))
    }

    /// Drop the cache and resolve everything again under `root`.
    pub fn refresh_under(&self, root: &Path) -> Resolution {
        info!(root = %root.display(), "Refreshing directory cache");
        self.invalidate_cache();
        self.initialize(root)
    }

    /// Delete the directory cache. The next resolution walks the tree.
    pub fn invalidate_cache(&self) {
        self.search.cache().invalidate();
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.search.cache().info()
    }

    /// Open the fuzzy index over the configured index root, or over the
    /// resolved index root target when none is configured.
    pub fn fuzzy_index(&self) -> Result<(FuzzyFileIndex, Option<RebuildHandle>)> {
        let root = match &self.config.index.root {
            Some(root) => root.clone(),
            None => {
                let name = &self.config.index.index_root_target;
                self.ensure_initialized()?;
                self.path(name)?.ok_or_else(|| ScoutError::RootUnavailable {
                    reason: format!("index root target {} was not found", name),
                })?
            }
        };
        FuzzyFileIndex::open_with_background(root, self.config.index.clone(), self.fs.clone())
    }

    fn target(&self, logical_name: &str) -> Result<&SearchTarget> {
        self.targets
            .get(logical_name)
            .ok_or_else(|| ScoutError::UnknownTarget {
                name: logical_name.to_string(),
            })
    }
}

fn validate_manual_path(target: &SearchTarget, path: &Path) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        warn!(target = %target.logical_name, path = %path.display(), reason, "Rejected manual path");
        Err(ScoutError::InvalidManualPath {
            name: target.logical_name.clone(),
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
    };

    if !target.expects_file() {
        if !path.is_dir() {
            return invalid("not an existing directory");
        }
        return Ok(());
    }

    if !path.is_file() {
        return invalid("not an existing file");
    }
    let wanted = Path::new(target.literal_name.trim()).extension();
    let actual = path.extension();
    let matches = match (wanted, actual) {
        (Some(w), Some(a)) => w.to_string_lossy().eq_ignore_ascii_case(&a.to_string_lossy()),
        _ => false,
    };
    if !matches {
        return invalid("file extension does not match the target");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CountingFileSystem;
    use crate::cache::CACHE_FILE_NAME;
    use crate::config::TargetsConfig;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        _state: TempDir,
        fs: Arc<CountingFileSystem>,
        locator: Locator,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let mut targets = BTreeMap::new();
        targets.insert("LAB_REGISTRY_FILE".to_string(), "Registro LAB.xlsx".to_string());
        targets.insert("PERFORMANCE_TEST_DIR".to_string(), "ProveEffettuate".to_string());
        let config = Config {
            targets: TargetsConfig(targets),
            ..Config::default()
        };
        let cache = Arc::new(DirectoryCache::open(state.path().join(CACHE_FILE_NAME)));
        let fs = Arc::new(CountingFileSystem::new(LocalFileSystem::shared()));
        let locator = Locator::with_parts(config, fs.clone(), cache).unwrap();
        Fixture {
            root,
            _state: state,
            fs,
            locator,
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_path_before_initialize() {
        let f = fixture();
        assert!(!f.locator.is_initialized());
        assert!(matches!(
            f.locator.path("LAB_REGISTRY_FILE"),
            Err(ScoutError::NotInitialized)
        ));
        assert!(matches!(f.locator.resolution(), Err(ScoutError::NotInitialized)));
        assert!(matches!(
            f.locator.path("NOPE"),
            Err(ScoutError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_initialize_and_query() {
        let f = fixture();
        let registry = f.root.path().join("A/Registro LAB.xlsx");
        touch(&registry);

        let resolution = f.locator.initialize(f.root.path());
        assert_eq!(resolution.found_count(), 1);
        assert!(f.fs.listings() > 0);
        assert_eq!(f.locator.path("LAB_REGISTRY_FILE").unwrap(), Some(registry));
        assert_eq!(f.locator.path("PERFORMANCE_TEST_DIR").unwrap(), None);
        assert_eq!(f.locator.root().as_deref(), Some(f.root.path()));
        assert!(f.locator.is_initialized());
    }

    #[test]
    fn test_manual_directory_path() {
        let f = fixture();
        let manual = f.root.path().join("elsewhere/Prove");
        fs::create_dir_all(&manual).unwrap();

        f.locator.initialize(f.root.path());
        f.locator.set_manual_path("PERFORMANCE_TEST_DIR", &manual).unwrap();
        assert_eq!(f.locator.path("PERFORMANCE_TEST_DIR").unwrap(), Some(manual.clone()));
        assert_eq!(
            f.locator.resolution().unwrap().origin("PERFORMANCE_TEST_DIR"),
            Some(MatchOrigin::Manual)
        );
        assert_eq!(f.locator.cache().exact_path("PERFORMANCE_TEST_DIR"), Some(manual.clone()));

        // A fresh resolution is served from the cache
        let resolution = f.locator.initialize(f.root.path());
        assert_eq!(resolution.get("PERFORMANCE_TEST_DIR"), Some(manual.as_path()));
        assert_eq!(resolution.origin("PERFORMANCE_TEST_DIR"), Some(MatchOrigin::ExactCache));
    }

    #[test]
    fn test_manual_path_validation() {
        let f = fixture();
        let dir = f.root.path().join("dir");
        fs::create_dir_all(&dir).unwrap();
        let csv = f.root.path().join("registry.csv");
        touch(&csv);
        let xlsx = f.root.path().join("mine.XLSX");
        touch(&xlsx);

        let err = f.locator.set_manual_path("PERFORMANCE_TEST_DIR", &csv).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(matches!(
            f.locator.set_manual_path("LAB_REGISTRY_FILE", &dir),
            Err(ScoutError::InvalidManualPath { .. })
        ));
        assert!(matches!(
            f.locator.set_manual_path("LAB_REGISTRY_FILE", &csv),
            Err(ScoutError::InvalidManualPath { .. })
        ));
        assert!(matches!(
            f.locator.set_manual_path("UNKNOWN", &dir),
            Err(ScoutError::UnknownTarget { .. })
        ));
        // Accepted before initialization too; only the cache changes
        assert_eq!(f.locator.set_manual_path("LAB_REGISTRY_FILE", &xlsx).unwrap(), xlsx);
        assert!(!f.locator.is_initialized());
    }

    #[test]
    fn test_refresh_rescans() {
        let f = fixture();
        let old = f.root.path().join("old/ProveEffettuate");
        fs::create_dir_all(&old).unwrap();
        f.locator.initialize(f.root.path());
        assert_eq!(f.locator.path("PERFORMANCE_TEST_DIR").unwrap(), Some(old.clone()));

        fs::remove_dir(&old).unwrap();
        let new = f.root.path().join("new/ProveEffettuate");
        fs::create_dir_all(&new).unwrap();

        let resolution = f.locator.refresh().unwrap();
        assert_eq!(resolution.get("PERFORMANCE_TEST_DIR"), Some(new.as_path()));
        assert_eq!(resolution.origin("PERFORMANCE_TEST_DIR"), Some(MatchOrigin::FullWalk));
    }

    #[test]
    fn test_invalidate_and_info() {
        let f = fixture();
        touch(&f.root.path().join("A/Registro LAB.xlsx"));
        f.locator.initialize(f.root.path());

        let info = f.locator.cache_info();
        assert!(info.cache_exists);
        assert!(info.is_valid);
        assert_eq!(info.registry_directories, 1);
        assert_eq!(info.exact_paths, 1);

        f.locator.invalidate_cache();
        let info = f.locator.cache_info();
        assert!(!info.cache_exists);
        assert!(!info.is_valid);
        assert_eq!(info.exact_paths, 0);
    }

    #[test]
    fn test_ensure_initialized_with_configured_root() {
        let root = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        touch(&root.path().join("RELIABIL/LF 053-18.xlsx"));

        let mut config = Config::default();
        config.roots.root = Some(root.path().to_path_buf());
        config.index.background = false;
        let cache = Arc::new(DirectoryCache::open(state.path().join(CACHE_FILE_NAME)));
        let locator = Locator::with_parts(config, LocalFileSystem::shared(), cache).unwrap();

        let resolution = locator.ensure_initialized().unwrap();
        assert!(resolution.is_resolved("LF_BASE_DIR"));
        // Second call reuses the stored resolution
        assert_eq!(locator.ensure_initialized().unwrap(), resolution);

        let (index, handle) = locator.fuzzy_index().unwrap();
        assert!(handle.is_none());
        assert_eq!(
            index.best_file("53", Some("18")),
            Some(root.path().join("RELIABIL/LF 053-18.xlsx"))
        );
    }
}
