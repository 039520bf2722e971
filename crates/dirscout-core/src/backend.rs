//! Filesystem access trait.
//!
//! Every walk in dirscout reads the disk through `FileSystem`. The search and
//! index logic only see directory listings and modification times, which keeps
//! them independent of the platform and lets tests count or fake disk access.
//!
//! ## Error Handling
//!
//! Implementations return plain `io::Result`. Callers treat any error on a
//! single directory or file as "not there" and move on; a flaky network share
//! must never abort a walk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Kind of a directory entry, as reported by the listing (symlinks are not
/// followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name without path
    pub name: String,

    /// Full path of the entry
    pub path: PathBuf,

    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        DirEntry {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Lowercased extension, if any
    pub fn extension_lower(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// Abstract filesystem used by the walkers.
///
/// Implementations must be `Send + Sync`; the fuzzy index rebuild runs on a
/// worker thread.
pub trait FileSystem: Send + Sync {
    /// List the entries of one directory, without recursion.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Last modification time of a path.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Whether a path is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// The real, local filesystem (including mounted network shares and sync
/// folders).
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem
    }

    /// Shared handle, the form the rest of the crate takes.
    pub fn shared() -> Arc<dyn FileSystem> {
        Arc::new(LocalFileSystem)
    }
}

impl FileSystem for LocalFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            // A single unreadable entry does not spoil the listing
            let Ok(entry) = entry else { continue };
            let kind = match entry.file_type() {
                Ok(ft) if ft.is_dir() => EntryKind::Dir,
                Ok(ft) if ft.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                kind,
            });
        }
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Wraps another filesystem and counts the calls made through it.
///
/// Used to check that cached lookups really avoid touching the tree.
pub struct CountingFileSystem {
    inner: Arc<dyn FileSystem>,
    listings: AtomicU64,
    stats: AtomicU64,
}

impl CountingFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        CountingFileSystem {
            inner,
            listings: AtomicU64::new(0),
            stats: AtomicU64::new(0),
        }
    }

    /// Number of directory listings so far
    pub fn listings(&self) -> u64 {
        self.listings.load(Ordering::Acquire)
    }

    /// Number of modification time lookups so far
    pub fn stats(&self) -> u64 {
        self.stats.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.listings.store(0, Ordering::Release);
        self.stats.store(0, Ordering::Release);
    }
}

impl FileSystem for CountingFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        self.listings.fetch_add(1, Ordering::AcqRel);
        self.inner.read_dir(dir)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.stats.fetch_add(1, Ordering::AcqRel);
        self.inner.modified(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }
}

/// Local filesystem where listing one chosen directory fails, as an
/// unreadable folder on a share would.
#[cfg(test)]
pub(crate) struct DenyingFileSystem {
    pub denied: PathBuf,
}

#[cfg(test)]
impl FileSystem for DenyingFileSystem {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        if dir == self.denied {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        LocalFileSystem.read_dir(dir)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        LocalFileSystem.modified(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        LocalFileSystem.is_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_read_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("Sub")).unwrap();
        fs::write(temp_dir.path().join("Report.XLSX"), b"x").unwrap();

        let mut entries = LocalFileSystem.read_dir(temp_dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Report.XLSX");
        assert!(entries[0].is_file());
        assert_eq!(entries[0].extension_lower().as_deref(), Some("xlsx"));
        assert_eq!(entries[1].name, "Sub");
        assert!(entries[1].is_dir());
        assert_eq!(entries[1].extension_lower(), None);
    }

    #[test]
    fn test_read_dir_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(LocalFileSystem.read_dir(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_counting_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"x").unwrap();

        let counting = CountingFileSystem::new(LocalFileSystem::shared());
        counting.read_dir(temp_dir.path()).unwrap();
        counting.read_dir(temp_dir.path()).unwrap();
        counting.modified(&file).unwrap();

        assert_eq!(counting.listings(), 2);
        assert_eq!(counting.stats(), 1);

        counting.reset();
        assert_eq!(counting.listings(), 0);
    }

    #[test]
    fn test_denying_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();

        let denying = DenyingFileSystem {
            denied: locked.clone(),
        };
        assert!(denying.read_dir(&locked).is_err());
        assert_eq!(denying.read_dir(temp_dir.path()).unwrap().len(), 1);
    }
}
