//! Cooperative directory tree walker.
//!
//! One walker serves both the bounded target search and the fuzzy index build.
//! It visits directories depth-first in listing order and hands each listing to
//! a visitor, which can stop the walk early.
//!
//! Limits are cooperative: the depth bound prevents descending further, and the
//! time budget is checked before each directory listing. A single slow listing
//! on a hung share can still overrun the budget, but once the budget is spent no
//! further directory is opened.

use crate::backend::{DirEntry, FileSystem};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Report progress every this many directories
const PROGRESS_INTERVAL: u64 = 500;

/// Depth and time bounds for one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkLimits {
    /// Directories deeper than this below the root are not listed. The root is
    /// depth 0, so `Some(1)` lists the root only.
    pub max_depth: Option<usize>,

    /// Wall-clock budget for the whole walk
    pub time_budget: Option<Duration>,
}

impl WalkLimits {
    /// No depth or time bound.
    pub fn unbounded() -> Self {
        WalkLimits::default()
    }

    pub fn bounded(max_depth: usize, time_budget: Duration) -> Self {
        WalkLimits {
            max_depth: Some(max_depth),
            time_budget: Some(time_budget),
        }
    }

    fn allows_depth(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

/// What the visitor wants after seeing a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every reachable directory within the depth bound was visited
    Completed,
    /// The visitor asked to stop
    Stopped,
    /// The time budget ran out
    TimedOut,
    /// The root itself could not be listed
    RootUnreadable,
}

/// Counters collected during a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub dirs_visited: u64,
    pub entries_seen: u64,
    pub unreadable_dirs: u64,
}

/// Outcome plus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    pub outcome: WalkOutcome,
    pub stats: WalkStats,
    pub elapsed: Duration,
}

/// Progress reporting for long walks
pub trait WalkProgress: Send + Sync {
    /// Called periodically with the running counters
    fn on_progress(&self, stats: &WalkStats);

    /// Called once when the walk ends
    fn on_complete(&self, report: &WalkReport);
}

/// A simple progress reporter that logs to tracing
pub struct LoggingProgress {
    label: String,
}

impl LoggingProgress {
    pub fn new(label: impl Into<String>) -> Self {
        LoggingProgress {
            label: label.into(),
        }
    }
}

impl WalkProgress for LoggingProgress {
    fn on_progress(&self, stats: &WalkStats) {
        debug!(
            walk = %self.label,
            dirs = stats.dirs_visited,
            entries = stats.entries_seen,
            "Walking"
        );
    }

    fn on_complete(&self, report: &WalkReport) {
        debug!(
            walk = %self.label,
            outcome = ?report.outcome,
            dirs = report.stats.dirs_visited,
            entries = report.stats.entries_seen,
            unreadable = report.stats.unreadable_dirs,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Walk finished"
        );
    }
}

/// Depth-first walker over a `FileSystem`.
pub struct Walker<'a> {
    fs: &'a dyn FileSystem,
    limits: WalkLimits,
    progress: Option<&'a dyn WalkProgress>,
}

impl<'a> Walker<'a> {
    pub fn new(fs: &'a dyn FileSystem, limits: WalkLimits) -> Self {
        Walker {
            fs,
            limits,
            progress: None,
        }
    }

    /// Attach a progress reporter.
    pub fn with_progress(mut self, progress: &'a dyn WalkProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Walk `root`, calling `visit(dir, depth, entries)` once per listed
    /// directory.
    pub fn walk<F>(&self, root: &Path, mut visit: F) -> WalkReport
    where
        F: FnMut(&Path, usize, &[DirEntry]) -> WalkControl,
    {
        let start = Instant::now();
        let mut stats = WalkStats::default();
        let mut stack: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];
        let mut outcome = WalkOutcome::Completed;

        while let Some((dir, depth)) = stack.pop() {
            if let Some(budget) = self.limits.time_budget {
                if start.elapsed() > budget {
                    warn!(
                        root = %root.display(),
                        budget_ms = budget.as_millis() as u64,
                        dirs = stats.dirs_visited,
                        "Search time budget exceeded"
                    );
                    outcome = WalkOutcome::TimedOut;
                    break;
                }
            }

            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    stats.unreadable_dirs += 1;
                    if depth == 0 {
                        debug!(root = %dir.display(), error = %e, "Cannot list walk root");
                        outcome = WalkOutcome::RootUnreadable;
                        break;
                    }
                    trace!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            stats.dirs_visited += 1;
            stats.entries_seen += entries.len() as u64;
            if let Some(progress) = self.progress {
                if stats.dirs_visited % PROGRESS_INTERVAL == 0 {
                    progress.on_progress(&stats);
                }
            }

            if visit(&dir, depth, &entries) == WalkControl::Stop {
                outcome = WalkOutcome::Stopped;
                break;
            }

            let child_depth = depth + 1;
            if self.limits.allows_depth(child_depth) {
                // Reverse so the first listed subdirectory is visited first
                for entry in entries.iter().rev().filter(|e| e.is_dir()) {
                    stack.push((entry.path.clone(), child_depth));
                }
            }
        }

        let report = WalkReport {
            outcome,
            stats,
            elapsed: start.elapsed(),
        };
        if let Some(progress) = self.progress {
            progress.on_complete(&report);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DenyingFileSystem, LocalFileSystem};
    use std::fs;
    use tempfile::TempDir;

    fn make_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c/d")).unwrap();
        fs::write(root.join("top.txt"), b"x").unwrap();
        fs::write(root.join("a/b/c/d/deep.txt"), b"x").unwrap();
        temp_dir
    }

    #[test]
    fn test_unbounded_walk_visits_everything() {
        let temp_dir = make_tree();
        let fs = LocalFileSystem;
        let mut depths = Vec::new();

        let report = Walker::new(&fs, WalkLimits::unbounded()).walk(temp_dir.path(), |_, depth, _| {
            depths.push(depth);
            WalkControl::Continue
        });

        assert_eq!(report.outcome, WalkOutcome::Completed);
        assert_eq!(depths, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.stats.dirs_visited, 5);
    }

    #[test]
    fn test_depth_bound() {
        let temp_dir = make_tree();
        let fs = LocalFileSystem;
        let mut max_seen = 0;

        let limits = WalkLimits::bounded(3, Duration::from_secs(60));
        let report = Walker::new(&fs, limits).walk(temp_dir.path(), |_, depth, _| {
            max_seen = max_seen.max(depth);
            WalkControl::Continue
        });

        assert_eq!(report.outcome, WalkOutcome::Completed);
        assert_eq!(max_seen, 2);
        assert_eq!(report.stats.dirs_visited, 3);
    }

    #[test]
    fn test_visitor_can_stop() {
        let temp_dir = make_tree();
        let fs = LocalFileSystem;

        let report = Walker::new(&fs, WalkLimits::unbounded()).walk(temp_dir.path(), |_, _, entries| {
            if entries.iter().any(|e| e.name == "top.txt") {
                WalkControl::Stop
            } else {
                WalkControl::Continue
            }
        });

        assert_eq!(report.outcome, WalkOutcome::Stopped);
        assert_eq!(report.stats.dirs_visited, 1);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let temp_dir = make_tree();
        let fs = LocalFileSystem;
        let limits = WalkLimits::bounded(10, Duration::ZERO);

        let mut visited = 0;
        let report = Walker::new(&fs, limits).walk(temp_dir.path(), |_, _, _| {
            visited += 1;
            std::thread::sleep(Duration::from_millis(2));
            WalkControl::Continue
        });

        assert_eq!(report.outcome, WalkOutcome::TimedOut);
        assert!(visited <= 1);
    }

    #[test]
    fn test_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let fs = LocalFileSystem;
        let report = Walker::new(&fs, WalkLimits::unbounded())
            .walk(&temp_dir.path().join("missing"), |_, _, _| WalkControl::Continue);
        assert_eq!(report.outcome, WalkOutcome::RootUnreadable);
        assert_eq!(report.stats.dirs_visited, 0);
    }

    #[test]
    fn test_unreadable_directory_is_skipped() {
        let temp_dir = make_tree();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("z")).unwrap();
        fs::write(root.join("z/found.txt"), b"x").unwrap();
        let fs = DenyingFileSystem {
            denied: root.join("a"),
        };

        let mut seen = Vec::new();
        let report = Walker::new(&fs, WalkLimits::unbounded()).walk(root, |dir, _, entries| {
            seen.extend(entries.iter().map(|e| e.name.clone()));
            assert!(!dir.starts_with(root.join("a")));
            WalkControl::Continue
        });

        assert_eq!(report.outcome, WalkOutcome::Completed);
        assert_eq!(report.stats.unreadable_dirs, 1);
        assert_eq!(report.stats.dirs_visited, 2);
        assert!(seen.contains(&"found.txt".to_string()));
        assert!(!seen.contains(&"b".to_string()));
    }
}
