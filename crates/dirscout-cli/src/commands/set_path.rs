//! Set-path command - point a target at a path by hand.

use crate::app::App;
use anyhow::Context;
use std::path::Path;

/// Run the set-path command.
pub fn run(app: &App, name: &str, path: &Path) -> anyhow::Result<()> {
    let stored = app
        .locator
        .set_manual_path(name, path)
        .with_context(|| format!("Could not set the path of {}", name))?;

    println!("✓ {} -> {}", name, stored.display());
    println!("Cached in {}", app.locator.cache().path().display());
    Ok(())
}
