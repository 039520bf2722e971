//! Bounded tree search for named targets.
//!
//! `TreeSearch` resolves a set of targets (logical name + literal on-disk name)
//! under a root that may be a huge synced tree. It works in two phases:
//!
//! 1. **Cached fast path.** Each target is first looked up in the exact-path
//!    cache. When the directory cache also holds at least one directory that
//!    still exists, targets still missing are searched for in the cached
//!    directories with a shallow, time-boxed walk.
//! 2. **Full walk.** Targets still missing are matched together in one
//!    unbounded walk of the root, which stops as soon as nothing is left to
//!    find. Discoveries are written back to the cache for the next run.
//!
//! Matching is by case-insensitive whole name against both files and
//! directories. Office lock files (names starting with `~`) never match.
//! Nothing here fails: unresolved targets come back as `None` and are logged.

use crate::backend::FileSystem;
use crate::cache::DirectoryCache;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::types::{DirectoryKind, MatchOrigin, Resolution, SearchTarget, TargetSet};
use crate::walk::{LoggingProgress, WalkControl, WalkLimits, Walker};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Resolves named targets under a root, consulting and feeding the cache.
pub struct TreeSearch {
    fs: Arc<dyn FileSystem>,
    cache: Arc<DirectoryCache>,
    config: SearchConfig,
}

impl TreeSearch {
    pub fn new(fs: Arc<dyn FileSystem>, cache: Arc<DirectoryCache>, config: SearchConfig) -> Self {
        TreeSearch { fs, cache, config }
    }

    /// The cache this search reads and writes.
    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Resolve `(logical, literal)` pairs. Fails only when the pairs are
    /// malformed.
    pub fn resolve_pairs<I, K, V>(&self, root: &Path, pairs: I) -> Result<Resolution>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let targets = TargetSet::from_pairs(pairs)?;
        Ok(self.resolve(root, &targets))
    }

    /// Resolve every target under `root`.
    #[instrument(skip(self, targets), fields(root = %root.display(), targets = targets.len()))]
    pub fn resolve(&self, root: &Path, targets: &TargetSet) -> Resolution {
        let mut resolution = Resolution::unresolved(targets);
        if targets.is_empty() {
            return resolution;
        }

        self.resolve_exact_paths(targets, &mut resolution);
        if resolution.is_complete() {
            info!("All targets found in exact path cache");
            return resolution;
        }

        if self.cache.is_valid() {
            info!("Using cached directories (fast path)");
            self.resolve_from_cache(targets, &mut resolution);

            if resolution.is_complete() {
                info!("All targets found in cache");
                return resolution;
            }
            info!(missing = ?resolution.missing(), "Cache gave partial results");
        }

        let remaining = targets.filtered(|t| !resolution.is_resolved(&t.logical_name));
        self.full_walk(root, &remaining, &mut resolution);

        for target in targets.iter() {
            if !resolution.is_resolved(&target.logical_name) {
                warn!(
                    target = %target.literal_name,
                    key = %target.logical_name,
                    root = %root.display(),
                    "Could not find a path for target"
                );
            }
        }

        info!(
            found = resolution.found_count(),
            total = resolution.len(),
            "Directory search complete"
        );
        resolution
    }

    /// Phase 1a: remembered exact paths that still exist.
    fn resolve_exact_paths(&self, targets: &TargetSet, resolution: &mut Resolution) {
        for target in targets.iter() {
            let Some(path) = self.cache.exact_path(&target.logical_name) else {
                continue;
            };
            if path.exists() {
                info!(target = %target.literal_name, path = %path.display(), "Found in exact path cache");
                resolution.resolve(&target.logical_name, path, MatchOrigin::ExactCache);
            } else {
                debug!(target = %target.literal_name, path = %path.display(), "Cached exact path is gone");
            }
        }
    }

    /// Phase 1b: bounded scans of cached directories for what is still missing.
    fn resolve_from_cache(&self, targets: &TargetSet, resolution: &mut Resolution) {
        let cached_dirs: Vec<(DirectoryKind, PathBuf)> = DirectoryKind::ALL
            .iter()
            .flat_map(|kind| {
                self.cache
                    .existing_directories(*kind)
                    .into_iter()
                    .map(move |dir| (*kind, dir))
            })
            .collect();

        for target in targets.iter() {
            if resolution.is_resolved(&target.logical_name) {
                continue;
            }
            for (kind, dir) in &cached_dirs {
                if let Some(found) = self.find_bounded(dir, target) {
                    info!(
                        target = %target.literal_name,
                        kind = %kind,
                        path = %found.display(),
                        "Found in cached directory"
                    );
                    self.cache.cache_exact_path(&target.logical_name, &found);
                    resolution.resolve(&target.logical_name, found, MatchOrigin::CachedDirectory);
                    break;
                }
            }
        }
    }

    /// Depth- and time-bounded search for one target below `dir`.
    pub fn find_bounded(&self, dir: &Path, target: &SearchTarget) -> Option<PathBuf> {
        let wanted = target.literal_lower();
        let limits = WalkLimits::bounded(self.config.max_depth, self.config.dir_timeout());
        let mut found = None;

        Walker::new(self.fs.as_ref(), limits).walk(dir, |_, _, entries| {
            let hit = entries.iter().find(|entry| {
                !self.config.is_temp_file(&entry.name) && entry.name.to_lowercase() == wanted
            });
            match hit {
                Some(entry) => {
                    found = Some(entry.path.clone());
                    WalkControl::Stop
                }
                None => WalkControl::Continue,
            }
        });

        found
    }

    /// Phase 2: one unbounded walk matching all remaining targets at once.
    fn full_walk(&self, root: &Path, targets: &TargetSet, resolution: &mut Resolution) {
        if targets.is_empty() {
            return;
        }
        if !self.fs.is_dir(root) {
            warn!(root = %root.display(), "Search root does not exist");
            return;
        }

        info!(
            targets = targets.len(),
            root = %root.display(),
            "Starting full directory search"
        );

        // Several logical names may share one literal name
        let mut remaining: HashMap<String, Vec<String>> = HashMap::new();
        for target in targets.iter() {
            remaining
                .entry(target.literal_lower())
                .or_default()
                .push(target.logical_name.clone());
        }

        let mut found_dirs: HashMap<DirectoryKind, Vec<PathBuf>> = HashMap::new();
        let mut discoveries: Vec<(String, PathBuf)> = Vec::new();
        let progress = LoggingProgress::new("full search");

        let report = Walker::new(self.fs.as_ref(), WalkLimits::unbounded())
            .with_progress(&progress)
            .walk(root, |dir, _, entries| {
                for entry in entries {
                    if remaining.is_empty() {
                        break;
                    }
                    if self.config.is_temp_file(&entry.name) {
                        continue;
                    }
                    let Some(logicals) = remaining.remove(&entry.name.to_lowercase()) else {
                        continue;
                    };

                    if let Some(kind) = self.config.classify(&entry.name) {
                        let dirs = found_dirs.entry(kind).or_default();
                        if !dirs.iter().any(|d| d == dir) {
                            dirs.push(dir.to_path_buf());
                        }
                    }
                    for logical in logicals {
                        info!(name = %entry.name, key = %logical, path = %entry.path.display(), "Found target");
                        resolution.resolve(&logical, entry.path.clone(), MatchOrigin::FullWalk);
                        discoveries.push((logical, entry.path.clone()));
                    }
                }

                if remaining.is_empty() {
                    info!("All targets found, halting search early");
                    WalkControl::Stop
                } else {
                    WalkControl::Continue
                }
            });

        debug!(
            outcome = ?report.outcome,
            dirs = report.stats.dirs_visited,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Full walk finished"
        );

        for kind in DirectoryKind::ALL {
            if let Some(dirs) = found_dirs.remove(&kind) {
                self.cache.merge_directories(kind, dirs);
            }
        }
        for (logical, path) in discoveries {
            self.cache.cache_exact_path(&logical, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CountingFileSystem, DenyingFileSystem, LocalFileSystem};
    use crate::cache::CACHE_FILE_NAME;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        _state: TempDir,
        fs: Arc<CountingFileSystem>,
        search: TreeSearch,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let cache = Arc::new(DirectoryCache::open(state.path().join(CACHE_FILE_NAME)));
        let fs = Arc::new(CountingFileSystem::new(LocalFileSystem::shared()));
        let search = TreeSearch::new(fs.clone(), cache, SearchConfig::default());
        Fixture {
            root,
            _state: state,
            fs,
            search,
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_registry_scenario() {
        let f = fixture();
        let dir_a = f.root.path().join("A");
        let registry = dir_a.join("Registro LAB.xlsx");
        touch(&registry);

        let resolution = f
            .search
            .resolve_pairs(f.root.path(), [("LAB_REGISTRY_FILE", "Registro LAB.xlsx")])
            .unwrap();

        assert_eq!(resolution.get("LAB_REGISTRY_FILE"), Some(registry.as_path()));
        assert_eq!(resolution.origin("LAB_REGISTRY_FILE"), Some(MatchOrigin::FullWalk));
        assert_eq!(
            f.search.cache().directories(DirectoryKind::Registry),
            vec![dir_a]
        );
        assert!(f.search.cache().directories(DirectoryKind::Inf).is_empty());
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let f = fixture();
        touch(&f.root.path().join("x/y/Registro LAB.xlsx"));
        fs::create_dir_all(f.root.path().join("q/ProveEffettuate")).unwrap();
        let targets = TargetSet::from_pairs([
            ("LAB_REGISTRY_FILE", "Registro LAB.xlsx"),
            ("PERFORMANCE_TEST_DIR", "ProveEffettuate"),
        ])
        .unwrap();

        let first = f.search.resolve(f.root.path(), &targets);
        assert!(first.is_complete());
        assert!(f.fs.listings() > 0);

        f.fs.reset();
        let second = f.search.resolve(f.root.path(), &targets);
        assert_eq!(second.to_map(), first.to_map());
        assert_eq!(f.fs.listings(), 0);
        assert_eq!(second.origin("PERFORMANCE_TEST_DIR"), Some(MatchOrigin::ExactCache));
    }

    #[test]
    fn test_case_insensitive_match() {
        let f = fixture();
        let dir = f.root.path().join("deep/er/Tests RUMORE");
        fs::create_dir_all(&dir).unwrap();

        let resolution = f
            .search
            .resolve_pairs(f.root.path(), [("NOISE_TEST_DIR", "tests rumore")])
            .unwrap();
        assert_eq!(resolution.get("NOISE_TEST_DIR"), Some(dir.as_path()));
        // Parent of a test-like match is cached as an inf directory
        assert_eq!(
            f.search.cache().directories(DirectoryKind::Inf),
            vec![f.root.path().join("deep/er")]
        );
    }

    #[test]
    fn test_office_temp_files_never_match() {
        let f = fixture();
        touch(&f.root.path().join("~$Registro LAB.xlsx"));

        let resolution = f
            .search
            .resolve_pairs(f.root.path(), [("LOCK", "~$Registro LAB.xlsx")])
            .unwrap();
        assert!(!resolution.is_resolved("LOCK"));
        assert_eq!(resolution.missing(), vec!["LOCK"]);
    }

    #[test]
    fn test_missing_root_resolves_nothing() {
        let f = fixture();
        let resolution = f
            .search
            .resolve_pairs(&f.root.path().join("not-there"), [("A", "a"), ("B", "b.xlsx")])
            .unwrap();
        assert_eq!(resolution.found_count(), 0);
        assert_eq!(resolution.len(), 2);
        assert!(!f.search.cache().exists());
    }

    #[test]
    fn test_malformed_pairs_are_rejected() {
        let f = fixture();
        let err = f
            .search
            .resolve_pairs(f.root.path(), [("A", "")])
            .unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_shared_literal_resolves_all_keys() {
        let f = fixture();
        let dir = f.root.path().join("lab/ProveEffettuate");
        fs::create_dir_all(&dir).unwrap();

        let resolution = f
            .search
            .resolve_pairs(
                f.root.path(),
                [("PRIMARY", "ProveEffettuate"), ("ALIAS", "proveeffettuate")],
            )
            .unwrap();
        assert_eq!(resolution.get("PRIMARY"), Some(dir.as_path()));
        assert_eq!(resolution.get("ALIAS"), Some(dir.as_path()));
    }

    #[test]
    fn test_cached_directory_scan_is_depth_bounded() {
        let f = fixture();
        let lab = f.root.path().join("LAB");
        touch(&lab.join("a/b/Shallow.xlsx"));
        touch(&lab.join("a/b/c/Deep.xlsx"));
        f.search.cache().add_directory(DirectoryKind::Registry, &lab);

        let resolution = f
            .search
            .resolve_pairs(f.root.path(), [("SHALLOW", "shallow.xlsx"), ("DEEP", "deep.xlsx")])
            .unwrap();

        assert_eq!(resolution.origin("SHALLOW"), Some(MatchOrigin::CachedDirectory));
        // Beyond the bound, so only the full walk finds it
        assert_eq!(resolution.origin("DEEP"), Some(MatchOrigin::FullWalk));
        assert!(resolution.is_complete());
        assert_eq!(
            f.search.cache().exact_path("SHALLOW"),
            Some(lab.join("a/b/Shallow.xlsx"))
        );
    }

    #[test]
    fn test_find_bounded_respects_time_budget() {
        let root = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        touch(&root.path().join("a/b/target.txt"));
        let cache = Arc::new(DirectoryCache::open(state.path().join(CACHE_FILE_NAME)));
        let config = SearchConfig {
            dir_timeout_ms: 0,
            ..SearchConfig::default()
        };
        let search = TreeSearch::new(LocalFileSystem::shared(), cache, config);

        let target = SearchTarget::new("T", "target.txt");
        // With a zero budget at most the first listing happens
        assert!(search.find_bounded(root.path(), &target).is_none());
    }

    #[test]
    fn test_stale_exact_path_falls_back() {
        let f = fixture();
        let lab = f.root.path().join("LAB");
        let old = lab.join("old/Registro LAB.xlsx");
        touch(&old);

        let first = f
            .search
            .resolve_pairs(f.root.path(), [("LAB_REGISTRY_FILE", "Registro LAB.xlsx")])
            .unwrap();
        assert_eq!(first.get("LAB_REGISTRY_FILE"), Some(old.as_path()));

        // The file moves to another folder
        fs::remove_file(&old).unwrap();
        let moved = lab.join("new/Registro LAB.xlsx");
        touch(&moved);

        let second = f
            .search
            .resolve_pairs(f.root.path(), [("LAB_REGISTRY_FILE", "Registro LAB.xlsx")])
            .unwrap();
        assert_eq!(second.get("LAB_REGISTRY_FILE"), Some(moved.as_path()));
        assert_eq!(
            f.search.cache().exact_path("LAB_REGISTRY_FILE"),
            Some(moved)
        );
    }

    #[test]
    fn test_exact_path_without_keyword_skips_walk() {
        let f = fixture();
        let dir = f.root.path().join("x/CARICHI NOMINALI");
        fs::create_dir_all(&dir).unwrap();
        let targets = TargetSet::from_pairs([("TEST_LAB_CARICHI_DIR", "CARICHI NOMINALI")]).unwrap();

        let first = f.search.resolve(f.root.path(), &targets);
        assert_eq!(first.get("TEST_LAB_CARICHI_DIR"), Some(dir.as_path()));
        // No keyword in the name, so no directory was cached
        assert!(!f.search.cache().is_valid());
        assert_eq!(f.search.cache().exact_path("TEST_LAB_CARICHI_DIR"), Some(dir.clone()));

        f.fs.reset();
        let second = f.search.resolve(f.root.path(), &targets);
        assert_eq!(second.get("TEST_LAB_CARICHI_DIR"), Some(dir.as_path()));
        assert_eq!(second.origin("TEST_LAB_CARICHI_DIR"), Some(MatchOrigin::ExactCache));
        assert_eq!(f.fs.listings(), 0);
    }

    #[test]
    fn test_unreadable_directory_does_not_stop_search() {
        let root = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        touch(&root.path().join("locked/Registro LAB.xlsx"));
        let dir = root.path().join("open/deeper/ProveEffettuate");
        fs::create_dir_all(&dir).unwrap();

        let cache = Arc::new(DirectoryCache::open(state.path().join(CACHE_FILE_NAME)));
        let fs: Arc<dyn FileSystem> = Arc::new(DenyingFileSystem {
            denied: root.path().join("locked"),
        });
        let search = TreeSearch::new(fs, cache, SearchConfig::default());

        let resolution = search
            .resolve_pairs(
                root.path(),
                [
                    ("LAB_REGISTRY_FILE", "Registro LAB.xlsx"),
                    ("PERFORMANCE_TEST_DIR", "ProveEffettuate"),
                ],
            )
            .unwrap();
        assert_eq!(resolution.get("PERFORMANCE_TEST_DIR"), Some(dir.as_path()));
        assert_eq!(resolution.missing(), vec!["LAB_REGISTRY_FILE"]);
    }
}
