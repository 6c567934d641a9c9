//! Init command - write an example local config

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use scanhub::config::write_example_config;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !dir.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir.display());
    }

    let (config_path, created) = write_example_config(&dir)
        .with_context(|| format!("Failed to write config into {}", dir.display()))?;

    if created {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        println!("\nNext steps:");
        println!("  1. Edit {} to pick tools and reporters", config_path.display());
        println!("  2. Run {}", style("scanhub tools").cyan());
        println!("  3. Run {}", style("scanhub scan .").cyan());
    } else {
        println!(
            "{} Config already exists at {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
    }
    Ok(())
}
