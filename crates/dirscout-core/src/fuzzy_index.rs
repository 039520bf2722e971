//! Persisted index from filename identifiers to candidate files.
//!
//! `FuzzyFileIndex` walks a root once, extracts `(identifier, year)` pairs from
//! every workbook name (see [`crate::identifier`]) and keeps a map from
//! normalized identifier to candidate files. The map is persisted as JSON next
//! to the data, so later processes answer lookups without walking.
//!
//! ## Staleness
//!
//! Every build records a fingerprint of the tree: the number of indexed files
//! and their latest modification time. The index is stale when it was never
//! built, when the rebuild interval has elapsed, or when a fresh fingerprint
//! differs from the recorded one. Computing the fingerprint walks the tree but
//! reads no file contents, so it is much cheaper than a rebuild.
//!
//! ## Threading
//!
//! The index is a cheap `Clone` handle over shared state. Readers take a read
//! lock; builds are serialized by a separate build lock so a background rebuild
//! and a foreground `refresh_if_stale` never walk the tree twice at once.

use crate::backend::FileSystem;
use crate::config::IndexConfig;
use crate::error::Result;
use crate::identifier::{normalize_id, normalize_year, IdentifierExtractor};
use crate::persist::{self, LoadOutcome};
use crate::types::{IndexEntry, IndexMetadata};
use crate::walk::{LoggingProgress, WalkControl, WalkLimits, Walker};
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

/// On-disk layout of the index file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    metadata: Option<IndexMetadata>,

    #[serde(default)]
    index: BTreeMap<String, Vec<IndexEntry>>,
}

/// Borrowed form of [`IndexDocument`] for saving without cloning.
#[derive(Serialize)]
struct IndexDocumentRef<'a> {
    metadata: &'a Option<IndexMetadata>,
    index: &'a BTreeMap<String, Vec<IndexEntry>>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: BTreeMap<String, Vec<IndexEntry>>,
    metadata: Option<IndexMetadata>,
}

impl IndexState {
    fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// What a call to [`FuzzyFileIndex::build`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The tree was walked and the index replaced
    Built {
        files: u64,
        ids: usize,
        entries: usize,
    },
    /// The index was fresh and non-empty; nothing was done
    Skipped,
    /// The root does not exist or is not a directory
    RootUnavailable,
}

/// Summary of the index for status output.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub root: PathBuf,
    pub index_file: PathBuf,
    pub index_exists: bool,
    pub unique_ids: usize,
    pub entries: usize,
    pub metadata: Option<IndexMetadata>,
    pub stale: bool,
}

/// Completion handle for a background rebuild.
pub struct RebuildHandle {
    receiver: Receiver<BuildOutcome>,
}

impl RebuildHandle {
    /// Block until the rebuild finishes. `None` if the build failed and the
    /// worker went away without reporting.
    pub fn wait(self) -> Option<BuildOutcome> {
        self.receiver.recv().ok()
    }

}

/// One indexed file found by a scan.
struct ScannedFile {
    path: PathBuf,
    name: String,
    mtime: f64,
}

struct IndexInner {
    root: PathBuf,
    index_file: PathBuf,
    config: IndexConfig,
    fs: Arc<dyn FileSystem>,
    extractor: IdentifierExtractor,
    state: RwLock<IndexState>,
    build_lock: Mutex<()>,
}

/// Identifier index over one root. Cloning shares the same index.
#[derive(Clone)]
pub struct FuzzyFileIndex {
    inner: Arc<IndexInner>,
}

impl FuzzyFileIndex {
    /// Open the index for `root`, loading the persisted index if there is one.
    ///
    /// Never walks the tree. A corrupt index file is quarantined and the index
    /// starts empty.
    pub fn open(root: impl AsRef<Path>, config: IndexConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let root = absolute(root.as_ref());
        let index_file = config.index_file_for(&root);
        let extractor = IdentifierExtractor::new(&config.marker)?;

        let state = match persist::read_json_or_quarantine::<IndexDocument>(&index_file, "fuzzy index") {
            LoadOutcome::Loaded(doc) => {
                let mut entries = doc.index;
                for (id, list) in entries.iter_mut() {
                    for entry in list.iter_mut() {
                        entry.init_id(id);
                    }
                }
                let state = IndexState {
                    entries,
                    metadata: doc.metadata,
                };
                debug!(
                    path = %index_file.display(),
                    entries = state.entry_count(),
                    "Loaded fuzzy index"
                );
                state
            }
            LoadOutcome::Missing => {
                debug!(path = %index_file.display(), "No fuzzy index yet, will build on demand");
                IndexState::default()
            }
            LoadOutcome::Quarantined { .. } | LoadOutcome::Unreadable { .. } => IndexState::default(),
        };

        Ok(FuzzyFileIndex {
            inner: Arc::new(IndexInner {
                root,
                index_file,
                config,
                fs,
                extractor,
                state: RwLock::new(state),
                build_lock: Mutex::new(()),
            }),
        })
    }

    /// Open the index and, if `background` is configured and the index is
    /// known stale without walking (never built, or interval elapsed), start a
    /// forced rebuild on the rayon pool.
    pub fn open_with_background(
        root: impl AsRef<Path>,
        config: IndexConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<(Self, Option<RebuildHandle>)> {
        let index = Self::open(root, config, fs)?;
        let handle = if index.inner.config.background && index.needs_rebuild_cheap() {
            Some(index.spawn_rebuild())
        } else {
            None
        };
        Ok((index, handle))
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn index_file(&self) -> &Path {
        &self.inner.index_file
    }

    pub fn metadata(&self) -> Option<IndexMetadata> {
        self.inner.state.read().metadata
    }

    /// Start a forced rebuild on the rayon pool.
    ///
    /// A panicking build is caught and logged; the index keeps its previous
    /// state and the handle reports nothing.
    pub fn spawn_rebuild(&self) -> RebuildHandle {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let index = self.clone();
        debug!(root = %self.inner.root.display(), "Starting background index build");
        rayon::spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| index.build(true))) {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(root = %index.inner.root.display(), "Background index build failed");
                    return;
                }
            };
            if sender.send(outcome).is_err() {
                debug!("Background index build finished with nobody waiting");
            }
        });
        RebuildHandle { receiver }
    }

    /// Walk the root and rebuild the index.
    ///
    /// Without `force`, a fresh and non-empty index is left alone. Persist
    /// failures are logged; the in-memory index is still replaced.
    #[instrument(skip(self), fields(root = %self.inner.root.display()))]
    pub fn build(&self, force: bool) -> BuildOutcome {
        let _guard = self.inner.build_lock.lock();

        if !self.inner.fs.is_dir(&self.inner.root) {
            warn!(root = %self.inner.root.display(), "Index root not available");
            return BuildOutcome::RootUnavailable;
        }

        if !force {
            let state = self.inner.state.read();
            if !state.entries.is_empty() && !self.interval_elapsed(state.metadata.as_ref()) {
                debug!("Fuzzy index is fresh, skipping rebuild");
                return BuildOutcome::Skipped;
            }
        }

        info!(root = %self.inner.root.display(), "Building fuzzy index");
        let now = unix_seconds(SystemTime::now());
        let files = self.scan();
        let extractor = &self.inner.extractor;

        let entries: Vec<IndexEntry> = files
            .par_iter()
            .flat_map_iter(|file| {
                let path = file.path.to_string_lossy().into_owned();
                extractor
                    .extract(&file.name)
                    .into_iter()
                    .map(move |candidate| IndexEntry {
                        id: candidate.id,
                        path: path.clone(),
                        name: file.name.clone(),
                        year: candidate.year,
                        mtime: file.mtime,
                    })
            })
            .collect();

        let entry_count = entries.len();
        let mut grouped: BTreeMap<String, Vec<IndexEntry>> = BTreeMap::new();
        for entry in entries {
            grouped.entry(entry.id.clone()).or_default().push(entry);
        }

        let metadata = IndexMetadata {
            generated_on: now,
            file_count: files.len() as u64,
            max_mtime: max_mtime(&files),
        };
        let ids = grouped.len();

        let mut state = self.inner.state.write();
        state.entries = grouped;
        state.metadata = Some(metadata);
        let state = parking_lot::RwLockWriteGuard::downgrade(state);

        let doc = IndexDocumentRef {
            metadata: &state.metadata,
            index: &state.entries,
        };
        match persist::write_json_atomic(&self.inner.index_file, &doc) {
            Ok(()) => debug!(path = %self.inner.index_file.display(), "Saved fuzzy index"),
            Err(e) => warn!(path = %self.inner.index_file.display(), error = %e, "Could not save fuzzy index"),
        }

        info!(
            files = metadata.file_count,
            ids,
            entries = entry_count,
            "Fuzzy index built"
        );
        BuildOutcome::Built {
            files: metadata.file_count,
            ids,
            entries: entry_count,
        }
    }

    /// Current fingerprint of the tree: indexed file count and latest mtime.
    pub fn fingerprint(&self) -> (u64, f64) {
        let files = self.scan();
        (files.len() as u64, max_mtime(&files))
    }

    /// Never built, interval elapsed, or the tree changed since the last build.
    pub fn is_stale(&self) -> bool {
        let Some(metadata) = self.metadata() else {
            return true;
        };
        if self.interval_elapsed(Some(&metadata)) {
            return true;
        }
        let (file_count, max_mtime) = self.fingerprint();
        file_count != metadata.file_count || max_mtime != metadata.max_mtime
    }

    /// Rebuild when stale. Returns true when a rebuild happened.
    pub fn refresh_if_stale(&self) -> bool {
        if !self.is_stale() {
            return false;
        }
        matches!(self.build(true), BuildOutcome::Built { .. })
    }

    /// Every entry filed under the identifier.
    pub fn candidates(&self, id: &str) -> Vec<IndexEntry> {
        if id.trim().is_empty() {
            return Vec::new();
        }
        let key = normalize_id(id);
        self.inner
            .state
            .read()
            .entries
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Best file for an identifier and optional year.
    ///
    /// Refreshes a stale index first, then narrows the candidates: entries
    /// naming the identifier right after the marker, then entries from the
    /// requested year, then the most recently modified.
    pub fn best_file(&self, id: &str, year: Option<&str>) -> Option<PathBuf> {
        if id.trim().is_empty() {
            return None;
        }
        self.refresh_if_stale();

        let key = normalize_id(id);
        let candidates = self.candidates(&key);
        if candidates.is_empty() {
            debug!(id = %key, "No index candidates");
            return None;
        }

        let mut pool: Vec<&IndexEntry> = candidates.iter().collect();

        let marked: Vec<&IndexEntry> = pool
            .iter()
            .copied()
            .filter(|c| self.inner.extractor.names_identifier(&c.name, &key))
            .collect();
        if !marked.is_empty() {
            pool = marked;
        }

        if let Some(year) = year.and_then(normalize_year) {
            let same_year: Vec<&IndexEntry> = pool
                .iter()
                .copied()
                .filter(|c| c.year.as_deref() == Some(year.as_str()))
                .collect();
            if !same_year.is_empty() {
                pool = same_year;
            }
        }

        // First of the newest wins ties
        let best = pool
            .into_iter()
            .reduce(|best, c| if c.mtime > best.mtime { c } else { best })?;
        debug!(id = %key, path = %best.path, "Best index candidate");
        Some(PathBuf::from(&best.path))
    }

    /// Counts, metadata and staleness. Computing staleness walks the tree.
    pub fn status(&self) -> IndexStatus {
        let (unique_ids, entries, metadata) = {
            let state = self.inner.state.read();
            (state.entries.len(), state.entry_count(), state.metadata)
        };
        IndexStatus {
            root: self.inner.root.clone(),
            index_file: self.inner.index_file.clone(),
            index_exists: self.inner.index_file.exists(),
            unique_ids,
            entries,
            metadata,
            stale: self.is_stale(),
        }
    }

    /// Staleness that can be decided without walking.
    fn needs_rebuild_cheap(&self) -> bool {
        let metadata = self.metadata();
        metadata.is_none() || self.interval_elapsed(metadata.as_ref())
    }

    fn interval_elapsed(&self, metadata: Option<&IndexMetadata>) -> bool {
        let Some(metadata) = metadata else {
            return true;
        };
        let age = unix_seconds(SystemTime::now()) - metadata.generated_on;
        age > self.inner.config.rebuild_interval().as_secs_f64()
    }

    /// All files under the root with an indexed extension.
    fn scan(&self) -> Vec<ScannedFile> {
        let fs = self.inner.fs.as_ref();
        let config = &self.inner.config;
        let mut found: Vec<(PathBuf, String)> = Vec::new();
        let progress = LoggingProgress::new("fuzzy index");

        Walker::new(fs, WalkLimits::unbounded())
            .with_progress(&progress)
            .walk(&self.inner.root, |_, _, entries| {
                for entry in entries.iter().filter(|e| e.is_file()) {
                    if config.is_temp_file(&entry.name) {
                        continue;
                    }
                    let indexed = entry
                        .extension_lower()
                        .map_or(false, |ext| config.indexes_extension(&ext));
                    if indexed {
                        found.push((entry.path.clone(), entry.name.clone()));
                    }
                }
                WalkControl::Continue
            });

        found
            .into_par_iter()
            .map(|(path, name)| {
                let mtime = match fs.modified(&path) {
                    Ok(time) => unix_seconds(time),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Cannot read modification time");
                        0.0
                    }
                };
                ScannedFile { path, name, mtime }
            })
            .collect()
    }
}

impl std::fmt::Debug for FuzzyFileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("FuzzyFileIndex")
            .field("root", &self.inner.root)
            .field("index_file", &self.inner.index_file)
            .field("ids", &state.entries.len())
            .field("metadata", &state.metadata)
            .finish()
    }
}

fn max_mtime(files: &[ScannedFile]) -> f64 {
    files.iter().map(|f| f.mtime).fold(0.0, f64::max)
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
