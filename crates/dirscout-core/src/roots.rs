//! Search root discovery.
//!
//! Targets live somewhere under the user's cloud-sync folder. Searching the
//! whole folder is slow, so the locator narrows the root in two steps: find
//! the sync root, then find an anchor directory under it that is known to
//! contain the data. Either step may come up empty; the caller decides what to
//! fall back to.

use crate::backend::FileSystem;
use crate::config::RootsConfig;
use crate::error::{Result, ScoutError};
use crate::walk::{WalkControl, WalkLimits, Walker};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variables naming the sync root, in priority order.
pub const SYNC_ROOT_ENV_VARS: [&str; 3] = ["OneDrive", "OneDriveCommercial", "OneDriveConsumer"];

/// Prefix of sync folder names in the home directory (compared lowercase).
const SYNC_FOLDER_PREFIX: &str = "onedrive";

/// Business and school folders are named `OneDrive - <Organization>`.
const ORGANIZATION_SEPARATOR: &str = " - ";

/// Locate the cloud-sync root from the environment, then the home directory.
pub fn find_sync_root(fs: &dyn FileSystem) -> Option<PathBuf> {
    let env_values: Vec<Option<PathBuf>> = SYNC_ROOT_ENV_VARS
        .iter()
        .map(|var| std::env::var_os(var).map(PathBuf::from))
        .collect();
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    find_sync_root_from(fs, &env_values, home.as_deref())
}

/// [`find_sync_root`] with the environment and home directory supplied.
pub fn find_sync_root_from(
    fs: &dyn FileSystem,
    env_values: &[Option<PathBuf>],
    home: Option<&Path>,
) -> Option<PathBuf> {
    for path in env_values.iter().flatten() {
        if !path.as_os_str().is_empty() && fs.is_dir(path) {
            info!(path = %path.display(), "Found sync root via environment");
            return Some(path.clone());
        }
    }

    let Some(home) = home else {
        warn!("No home directory, cannot look for a sync root");
        return None;
    };

    let mut folders: Vec<PathBuf> = match fs.read_dir(home) {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| e.is_dir() && e.name.to_lowercase().starts_with(SYNC_FOLDER_PREFIX))
            .map(|e| e.path)
            .collect(),
        Err(e) => {
            warn!(home = %home.display(), error = %e, "Cannot list home directory");
            return None;
        }
    };
    folders.sort();

    if let Some(business) = folders.iter().find(|p| {
        p.file_name()
            .map_or(false, |n| n.to_string_lossy().contains(ORGANIZATION_SEPARATOR))
    }) {
        info!(path = %business.display(), "Found organization sync root");
        return Some(business.clone());
    }

    match folders.into_iter().next() {
        Some(personal) => {
            info!(path = %personal.display(), "Found sync root");
            Some(personal)
        }
        None => {
            warn!(home = %home.display(), "No sync folder found in home directory");
            None
        }
    }
}

/// Find the anchor directory under `root`.
///
/// Checks `common_subpaths` first, then searches case-insensitively for a
/// directory named `anchor` up to `max_depth` levels below the root.
pub fn find_anchor(
    fs: &dyn FileSystem,
    root: &Path,
    anchor: &str,
    common_subpaths: &[PathBuf],
    max_depth: usize,
) -> Option<PathBuf> {
    for sub in common_subpaths {
        let candidate = root.join(sub);
        if fs.is_dir(&candidate) {
            info!(path = %candidate.display(), "Found anchor at common location");
            return Some(candidate);
        }
    }

    debug!(anchor, root = %root.display(), "Anchor not at a common location, searching");
    let wanted = anchor.to_lowercase();
    let mut found = None;

    // Listing depths 0..=max_depth finds anchors up to max_depth + 1 levels down
    let limits = WalkLimits {
        max_depth: Some(max_depth + 1),
        time_budget: None,
    };
    Walker::new(fs, limits).walk(root, |_, _, entries| {
        match entries
            .iter()
            .find(|e| e.is_dir() && e.name.to_lowercase() == wanted)
        {
            Some(entry) => {
                found = Some(entry.path.clone());
                WalkControl::Stop
            }
            None => WalkControl::Continue,
        }
    });

    match &found {
        Some(path) => info!(path = %path.display(), "Found anchor directory"),
        None => warn!(anchor, root = %root.display(), "Anchor directory not found"),
    }
    found
}

/// The root to search under, following the roots configuration.
///
/// An explicit root wins. Otherwise the sync root is discovered and narrowed
/// to the anchor when one is configured and found.
pub fn discover_search_root(fs: &dyn FileSystem, config: &RootsConfig) -> Result<PathBuf> {
    if let Some(root) = &config.root {
        if fs.is_dir(root) {
            return Ok(root.clone());
        }
        return Err(ScoutError::RootUnavailable {
            reason: format!("configured root {} is not a directory", root.display()),
        });
    }

    let sync_root = find_sync_root(fs).ok_or_else(|| ScoutError::RootUnavailable {
        reason: "no cloud sync folder found".to_string(),
    })?;
    Ok(narrow_to_anchor(fs, &sync_root, config))
}

/// `root` narrowed to the configured anchor, or `root` itself.
pub fn narrow_to_anchor(fs: &dyn FileSystem, root: &Path, config: &RootsConfig) -> PathBuf {
    match config.anchor.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(anchor) => find_anchor(fs, root, anchor, &config.anchor_subpaths, config.anchor_max_depth)
            .unwrap_or_else(|| {
                info!(root = %root.display(), "Falling back to searching the whole root");
                root.to_path_buf()
            }),
        None => root.to_path_buf(),
    }
}
