//! Refresh command - drop the cache and search again.

use crate::app::App;
use crate::commands::resolve::print_resolution;
use crate::OutputFormat;
use std::path::PathBuf;
use std::time::Instant;

/// Run the refresh command.
pub fn run(app: &App, root: Option<PathBuf>, output: OutputFormat) -> anyhow::Result<()> {
    let root = app.search_root(root)?;

    eprintln!("Refreshing cache under {} ...", root.display());
    let start = Instant::now();
    let resolution = app.locator.refresh_under(&root);

    print_resolution(&resolution, &output)?;
    eprintln!();
    eprintln!(
        "Cache refresh complete. Found {}/{} targets in {:.2}s",
        resolution.found_count(),
        resolution.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
