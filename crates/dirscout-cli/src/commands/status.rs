//! Status command - show directory cache status.

use crate::app::App;
use crate::OutputFormat;

/// Run the status command.
pub fn run(app: &App, output: OutputFormat) -> anyhow::Result<()> {
    let info = app.locator.cache_info();

    if let OutputFormat::Json = output {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("dirscout Cache Status");
    println!("=====================");
    println!();
    println!("Cache file: {}", info.cache_file.display());

    if !info.cache_exists {
        println!();
        println!("No cache yet. Run 'dirscout resolve' to build it.");
        return Ok(());
    }

    let validity = if info.is_valid {
        "✓ valid"
    } else {
        "⚠ no cached directory exists any more"
    };

    println!();
    println!("Summary:");
    println!(
        "  Registry directories: {} ({} still exist)",
        info.registry_directories, info.valid_registry_directories
    );
    println!(
        "  Test directories:     {} ({} still exist)",
        info.inf_directories, info.valid_inf_directories
    );
    println!("  Exact paths:          {}", info.exact_paths);
    println!("  State:                {}", validity);

    let record = app.locator.cache().record();
    if !record.exact_paths.is_empty() {
        println!();
        println!("Cached paths:");
        for (name, path) in &record.exact_paths {
            println!("  {}  {}", name, path);
        }
    }

    Ok(())
}
