//! Persistent cache of discovered directories and exact paths.
//!
//! The cache remembers where targets were found so later runs can skip the
//! full walk. It is a single JSON document:
//!
//! ```json
//! {
//!   "registry_directories": ["/sync/UTE_wrk/LAB"],
//!   "inf_directories": ["/sync/UTE_wrk/ProveEffettuate"],
//!   "exact_paths": { "LAB_REGISTRY_FILE": "/sync/UTE_wrk/LAB/Registro LAB.xlsx" }
//! }
//! ```
//!
//! Every mutation is written through immediately with an atomic replace.
//! Updates are rare, so there is no batching.

use crate::error::Result;
use crate::persist::{self, LoadOutcome};
use crate::types::{CacheInfo, CacheRecord, DirectoryKind};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default file name of the cache document
pub const CACHE_FILE_NAME: &str = "directory_cache.json";

/// Environment variable overriding the full cache file path
pub const CACHE_PATH_ENV: &str = "DIRSCOUT_CACHE_FILE";

/// Durable store of previously discovered locations.
///
/// The in-memory record is guarded by a lock; each mutation holds the write
/// lock across the disk write so concurrent callers in one process never
/// interleave partial updates.
///
/// ## Example
///
/// ```rust,ignore
/// use dirscout_core::{DirectoryCache, DirectoryKind};
///
/// let cache = DirectoryCache::open("/tmp/directory_cache.json");
/// cache.add_directory(DirectoryKind::Registry, "/sync/UTE_wrk/LAB");
/// assert!(cache.is_valid());
/// ```
pub struct DirectoryCache {
    /// Location of the backing file
    path: PathBuf,

    /// Current state
    record: RwLock<CacheRecord>,
}

impl DirectoryCache {
    /// Open the cache backed by `path`, loading it if present.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let record = Self::read_record(&path);
        DirectoryCache {
            path,
            record: RwLock::new(record),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file currently exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Re-read the backing file, replacing the in-memory state.
    ///
    /// Never fails: a missing file gives an empty record, an unparseable one
    /// is quarantined and also gives an empty record.
    pub fn load(&self) -> CacheRecord {
        let record = Self::read_record(&self.path);
        *self.record.write() = record.clone();
        record
    }

    fn read_record(path: &Path) -> CacheRecord {
        match persist::read_json_or_quarantine::<CacheRecord>(path, "directory cache") {
            LoadOutcome::Loaded(record) => {
                info!(
                    path = %path.display(),
                    registry = record.registry_directories.len(),
                    inf = record.inf_directories.len(),
                    exact = record.exact_paths.len(),
                    "Loaded directory cache"
                );
                record
            }
            LoadOutcome::Missing => {
                debug!(path = %path.display(), "No directory cache yet");
                CacheRecord::default()
            }
            LoadOutcome::Quarantined { .. } | LoadOutcome::Unreadable { .. } => {
                CacheRecord::default()
            }
        }
    }

    /// Atomically write `record` and make it the in-memory state.
    pub fn save(&self, record: &CacheRecord) -> Result<()> {
        let mut current = self.record.write();
        persist::write_json_atomic(&self.path, record)?;
        *current = record.clone();
        Ok(())
    }

    /// Snapshot of the in-memory state.
    pub fn record(&self) -> CacheRecord {
        self.record.read().clone()
    }

    /// Apply `mutate` and write the result through. Write failures are logged;
    /// the in-memory state keeps the change either way.
    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut CacheRecord) -> bool,
    {
        let mut record = self.record.write();
        if !mutate(&mut record) {
            return;
        }
        if let Err(e) = persist::write_json_atomic(&self.path, &*record) {
            warn!(path = %self.path.display(), error = %e, "Could not save directory cache");
        }
    }

    /// Cached directories of a kind, as stored (existence not checked).
    pub fn directories(&self, kind: DirectoryKind) -> Vec<PathBuf> {
        self.record
            .read()
            .directories(kind)
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Cached directories of a kind that still exist.
    pub fn existing_directories(&self, kind: DirectoryKind) -> Vec<PathBuf> {
        self.directories(kind)
            .into_iter()
            .filter(|d| d.is_dir())
            .collect()
    }

    /// Replace the directories of a kind. Paths that no longer exist are
    /// dropped and duplicates collapsed, keeping first-seen order.
    pub fn set_directories<I, P>(&self, kind: DirectoryKind, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let valid = existing_unique(dirs);
        let count = valid.len();
        self.update(|record| {
            *record.directories_mut(kind) = valid;
            true
        });
        info!(kind = %kind, count, "Cached directories");
    }

    /// Add directories of a kind to those already cached. The read and the
    /// write happen under one lock.
    pub fn merge_directories<I, P>(&self, kind: DirectoryKind, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let additions: Vec<PathBuf> = dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect();
        let mut count = 0;
        self.update(|record| {
            let current = record.directories_mut(kind);
            let merged = existing_unique(
                current
                    .iter()
                    .map(PathBuf::from)
                    .chain(additions.iter().cloned()),
            );
            count = merged.len();
            if *current == merged {
                return false;
            }
            *current = merged;
            true
        });
        info!(kind = %kind, count, "Merged cached directories");
    }

    /// Add one directory. Returns true if the cache changed.
    pub fn add_directory(&self, kind: DirectoryKind, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        if !dir.exists() {
            return false;
        }
        let entry = path_string(dir);
        let mut added = false;
        self.update(|record| {
            let dirs = record.directories_mut(kind);
            if dirs.contains(&entry) {
                return false;
            }
            dirs.push(entry.clone());
            added = true;
            true
        });
        if added {
            info!(kind = %kind, dir = %dir.display(), "Added directory to cache");
        }
        added
    }

    /// Exact path cached for a logical name (existence not checked).
    pub fn exact_path(&self, name: &str) -> Option<PathBuf> {
        self.record.read().exact_paths.get(name).map(PathBuf::from)
    }

    /// Remember the exact path of a logical name. Caching the same pair again
    /// is a no-op.
    pub fn cache_exact_path(&self, name: &str, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !path.exists() {
            debug!(name, path = %path.display(), "Not caching a path that does not exist");
            return;
        }
        let value = path_string(path);
        let mut changed = false;
        self.update(|record| {
            if record.exact_paths.get(name) == Some(&value) {
                return false;
            }
            record.exact_paths.insert(name.to_string(), value.clone());
            changed = true;
            true
        });
        if changed {
            info!(name, path = %path.display(), "Cached exact path");
        }
    }

    /// True iff at least one cached directory still exists. This decides
    /// between the cached fast path and the full walk.
    pub fn is_valid(&self) -> bool {
        let record = self.record.read();
        DirectoryKind::ALL
            .iter()
            .flat_map(|kind| record.directories(*kind))
            .any(|d| Path::new(d).exists())
    }

    /// Clear all state and delete the backing file.
    pub fn invalidate(&self) {
        let mut record = self.record.write();
        *record = CacheRecord::default();
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Directory cache invalidated"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not delete cache file"),
        }
    }

    /// Counts of cached and still-existing entries.
    pub fn info(&self) -> CacheInfo {
        let record = self.record.read();
        let count_existing =
            |dirs: &[String]| dirs.iter().filter(|d| Path::new(d.as_str()).exists()).count();
        let valid_registry = count_existing(&record.registry_directories);
        let valid_inf = count_existing(&record.inf_directories);

        CacheInfo {
            cache_file: self.path.clone(),
            cache_exists: self.path.exists(),
            registry_directories: record.registry_directories.len(),
            inf_directories: record.inf_directories.len(),
            valid_registry_directories: valid_registry,
            valid_inf_directories: valid_inf,
            exact_paths: record.exact_paths.len(),
            is_valid: valid_registry + valid_inf > 0,
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn existing_unique<I, P>(dirs: I) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut out: Vec<String> = Vec::new();
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.exists() {
            continue;
        }
        let entry = path_string(dir);
        if !out.contains(&entry) {
            out.push(entry);
        }
    }
    out
}
