//! Resolve command - find target paths.

use crate::app::App;
use crate::OutputFormat;
use anyhow::{bail, Context};
use dirscout_core::{Resolution, TargetSet};
use std::path::PathBuf;
use std::time::Instant;

/// Run the resolve command.
///
/// Without `--target`, resolves the configured targets and stores them in the
/// locator; with it, resolves just the given pairs.
pub fn run(
    app: &App,
    root: Option<PathBuf>,
    targets: &[String],
    output: OutputFormat,
) -> anyhow::Result<()> {
    let root = app.search_root(root)?;
    let start = Instant::now();

    let resolution = if targets.is_empty() {
        app.locator.initialize(&root)
    } else {
        let pairs = targets
            .iter()
            .map(|t| parse_target(t))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let set = TargetSet::from_pairs(pairs).context("Invalid --target list")?;
        app.locator.resolve(&root, &set)
    };

    print_resolution(&resolution, &output)?;
    eprintln!();
    eprintln!(
        "Found {}/{} targets under {} in {:.2}s",
        resolution.found_count(),
        resolution.len(),
        root.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Split `NAME=LITERAL`. The literal may itself contain `=`.
pub fn parse_target(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((name, literal)) = raw.split_once('=') else {
        bail!("Target '{}' is not of the form NAME=LITERAL", raw);
    };
    let (name, literal) = (name.trim(), literal.trim());
    if name.is_empty() || literal.is_empty() {
        bail!("Target '{}' has an empty name or literal", raw);
    }
    Ok((name.to_string(), literal.to_string()))
}

/// Print a resolution as aligned text or JSON.
pub fn print_resolution(resolution: &Resolution, output: &OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Text => {
            let width = resolution
                .iter()
                .map(|t| t.logical_name.len())
                .max()
                .unwrap_or(0);
            for target in resolution.iter() {
                match (&target.path, target.origin) {
                    (Some(path), Some(origin)) => println!(
                        "{:width$}  {}  ({})",
                        target.logical_name,
                        path.display(),
                        origin,
                        width = width
                    ),
                    (Some(path), None) => {
                        println!("{:width$}  {}", target.logical_name, path.display(), width = width)
                    }
                    (None, _) => println!(
                        "{:width$}  <not found: {}>",
                        target.logical_name,
                        target.literal_name,
                        width = width
                    ),
                }
            }
        }
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = resolution
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.logical_name,
                        "literal": t.literal_name,
                        "path": t.path,
                        "origin": t.origin,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("LAB=Registro LAB.xlsx").unwrap(),
            ("LAB".to_string(), "Registro LAB.xlsx".to_string())
        );
        assert_eq!(
            parse_target(" A = b=c ").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_target("no-separator").is_err());
        assert!(parse_target("=literal").is_err());
        assert!(parse_target("NAME=").is_err());
    }
}
