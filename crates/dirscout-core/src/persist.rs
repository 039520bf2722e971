//! Durable JSON documents.
//!
//! Both persisted documents (the directory cache and the fuzzy index) go
//! through this module. It provides:
//!
//! - Atomic writes: the document is serialized to a temporary file next to the
//!   target and renamed over it, so a reader never sees a half-written file and
//!   a crash mid-write leaves the previous version in place.
//! - Corruption recovery: a document that fails to parse is renamed aside to
//!   `<name>.corrupt-<unix timestamp>` and the caller starts from empty.
//!
//! There is no locking. Two processes writing the same document race, and the
//! last rename wins.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Suffix marker for quarantined documents
pub const CORRUPT_MARKER: &str = ".corrupt-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Outcome of reading a persisted document.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// The file does not exist
    Missing,

    /// The document parsed
    Loaded(T),

    /// The document did not parse and was moved aside
    Quarantined {
        /// Where the bad file went, if the rename succeeded
        moved_to: Option<PathBuf>,
        reason: String,
    },

    /// The file exists but could not be read (permissions, offline share)
    Unreadable { reason: String },
}

/// Serialize `value` as pretty JSON (2-space indent, UTF-8 unescaped) and
/// atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    let written = write_temp(&temp_path, value);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    debug!(path = %path.display(), "Document written");
    Ok(())
}

fn write_temp<T: Serialize>(temp_path: &Path, value: &T) -> Result<()> {
    let file = File::create(temp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read and parse a JSON document, quarantining it when it does not parse.
///
/// `what` names the document in log messages.
pub fn read_json_or_quarantine<T: DeserializeOwned>(path: &Path, what: &str) -> LoadOutcome<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read {}", what);
            return LoadOutcome::Unreadable {
                reason: e.to_string(),
            };
        }
    };

    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => LoadOutcome::Loaded(value),
        Err(e) => {
            let reason = e.to_string();
            let moved_to = quarantine(path);
            warn!(
                path = %path.display(),
                quarantined = ?moved_to,
                error = %reason,
                "{} is corrupted, starting empty",
                what
            );
            LoadOutcome::Quarantined { moved_to, reason }
        }
    }
}

/// Move a bad file aside. Returns the new location on success.
pub fn quarantine(path: &Path) -> Option<PathBuf> {
    let target = quarantine_path(path, chrono::Utc::now().timestamp());
    match fs::rename(path, &target) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not quarantine file");
            None
        }
    }
}

/// `<path>.corrupt-<timestamp>`
pub fn quarantine_path(path: &Path, timestamp: i64) -> PathBuf {
    let mut name = file_name_of(path);
    name.push(format!("{}{}", CORRUPT_MARKER, timestamp));
    path.with_file_name(name)
}

/// Temporary sibling used while writing; unique per call.
fn temp_path_for(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = file_name_of(path);
    name.push(format!(".tmp-{}-{}", std::process::id(), seq));
    path.with_file_name(name)
}

fn file_name_of(path: &Path) -> OsString {
    path.file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("document"))
}
