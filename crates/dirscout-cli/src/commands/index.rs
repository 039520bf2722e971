//! Index commands - build, query and inspect the fuzzy file index.

use crate::app::App;
use crate::OutputFormat;
use chrono::{DateTime, Local};
use dirscout_core::{BuildOutcome, FuzzyFileIndex, RebuildHandle};
use std::path::PathBuf;
use std::time::Instant;

/// Run `index build`.
pub fn build(app: &App, root: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let (index, handle) = app.open_index(root)?;

    println!("Building fuzzy index for {} ...", index.root().display());
    let start = Instant::now();

    // A background build already walked the tree; only force walks again
    let background = handle.and_then(RebuildHandle::wait);
    let outcome = match background {
        Some(outcome) if !force => outcome,
        _ => index.build(force),
    };
    let elapsed = start.elapsed();

    match outcome {
        BuildOutcome::Built {
            files,
            ids,
            entries,
        } => {
            println!();
            println!("Indexing complete!");
            println!("  Files:       {}", files);
            println!("  Identifiers: {}", ids);
            println!("  Entries:     {}", entries);
            println!("  Time:        {:.2}s", elapsed.as_secs_f64());
            println!("  Index file:  {}", index.index_file().display());
        }
        BuildOutcome::Skipped => {
            println!("Index is fresh. Use --force to rebuild from scratch.");
        }
        BuildOutcome::RootUnavailable => {
            anyhow::bail!("Index root {} is not available", index.root().display());
        }
    }

    Ok(())
}

/// Run `index lookup`.
pub fn lookup(
    app: &App,
    root: Option<PathBuf>,
    id: &str,
    year: Option<&str>,
    all: bool,
) -> anyhow::Result<()> {
    let index = ready_index(app, root)?;

    match index.best_file(id, year) {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("No file found for identifier {}", id),
    }

    if all {
        let candidates = index.candidates(id);
        eprintln!();
        eprintln!("{} candidates:", candidates.len());
        for c in &candidates {
            eprintln!(
                "  {}  year={}  modified={}",
                c.path,
                c.year.as_deref().unwrap_or("-"),
                format_timestamp(c.mtime)
            );
        }
    }

    Ok(())
}

/// Run `index status`.
pub fn status(app: &App, root: Option<PathBuf>, output: OutputFormat) -> anyhow::Result<()> {
    let index = ready_index(app, root)?;
    let status = index.status();

    if let OutputFormat::Json = output {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("dirscout Index Status");
    println!("=====================");
    println!();
    println!("Root:       {}", status.root.display());
    println!("Index file: {}", status.index_file.display());

    let Some(metadata) = status.metadata else {
        println!();
        println!("Index has not been built. Run 'dirscout index build'.");
        return Ok(());
    };

    let freshness = if status.stale { "⚠ stale" } else { "✓ fresh" };
    println!();
    println!("Summary:");
    println!("  Identifiers:   {}", status.unique_ids);
    println!("  Entries:       {}", status.entries);
    println!("  Files:         {}", metadata.file_count);
    println!("  Built:         {}", format_timestamp(metadata.generated_on));
    println!("  Newest file:   {}", format_timestamp(metadata.max_mtime));
    println!("  State:         {}", freshness);

    Ok(())
}

/// Open the index, waiting for a background build if one was started.
fn ready_index(app: &App, root: Option<PathBuf>) -> anyhow::Result<FuzzyFileIndex> {
    let (index, handle) = app.open_index(root)?;
    if let Some(handle) = handle {
        eprintln!("Index is stale, rebuilding ...");
        handle.wait();
    }
    Ok(index)
}

fn format_timestamp(seconds: f64) -> String {
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) if seconds > 0.0 => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "-");
        assert_eq!(format_timestamp(-5.0), "-");
        let formatted = format_timestamp(1_700_000_000.5);
        assert_eq!(formatted.len(), "2023-11-14 22:13:20".len());
        assert!(formatted.starts_with("2023-11-1"));
    }
}
