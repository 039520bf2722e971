//! Invalidate command - delete the directory cache.

use crate::app::App;
use std::io::{self, Write};

/// Run the invalidate command.
pub fn run(app: &App, skip_confirm: bool) -> anyhow::Result<()> {
    let info = app.locator.cache_info();

    if !info.cache_exists {
        println!("No cache found. Nothing to invalidate.");
        return Ok(());
    }

    if !skip_confirm {
        print!(
            "This will delete {} and force a full search next time. Are you sure? [y/N] ",
            info.cache_file.display()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    app.locator.invalidate_cache();
    println!("Cache invalidated.");

    Ok(())
}
