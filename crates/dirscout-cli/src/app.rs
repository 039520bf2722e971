//! Application state management.

use anyhow::Context;
use dirscout_core::{
    Config, DirectoryCache, FuzzyFileIndex, LocalFileSystem, Locator, RebuildHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared application state.
pub struct App {
    /// Resolves configured targets through the directory cache
    pub locator: Locator,
}

impl App {
    /// Create a new application instance.
    pub fn new(config: Config, cache_file: Option<&Path>) -> anyhow::Result<Self> {
        let cache_path = config
            .cache_path(cache_file)
            .context("Could not determine the cache file location")?;
        let cache = Arc::new(DirectoryCache::open(&cache_path));
        let locator = Locator::with_parts(config, LocalFileSystem::shared(), cache)
            .context("Invalid target configuration")?;

        debug!(
            cache_file = %cache_path.display(),
            targets = locator.targets().len(),
            "Application initialized"
        );

        Ok(App { locator })
    }

    pub fn config(&self) -> &Config {
        self.locator.config()
    }

    /// The explicit root, or the one discovered from the roots configuration.
    pub fn search_root(&self, root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        match root {
            Some(root) => Ok(root),
            None => self
                .locator
                .discover_root()
                .context("No search root; pass --root or set roots.root in the config"),
        }
    }

    /// Open the fuzzy index over `root`, or over the resolved index root
    /// target. The handle is set when a background rebuild was started.
    pub fn open_index(
        &self,
        root: Option<PathBuf>,
    ) -> anyhow::Result<(FuzzyFileIndex, Option<RebuildHandle>)> {
        let opened = match root.or_else(|| self.config().index.root.clone()) {
            Some(root) => FuzzyFileIndex::open_with_background(
                root,
                self.config().index.clone(),
                LocalFileSystem::shared(),
            ),
            None => self.locator.fuzzy_index(),
        };
        let (index, handle) = opened.context("Could not open the fuzzy index")?;

        info!(
            root = %index.root().display(),
            index_file = %index.index_file().display(),
            "Opened fuzzy index"
        );
        Ok((index, handle))
    }
}
