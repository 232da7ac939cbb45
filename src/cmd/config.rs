//! Configuration view and setup: `taskboard config`.

use anyhow::{Context, Result};
use std::path::Path;

use taskboard::config::{self, TaskboardConfig};

use super::super::ConfigCommands;

pub fn cmd_config(
    project_dir: &Path,
    explicit: Option<&Path>,
    effective: &TaskboardConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let default_path = config::config_path(project_dir);
    let config_path = explicit.unwrap_or(default_path.as_path());

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No taskboard.toml found at {}", config_path.display());
                println!("Using defaults.");
            }
            println!();
            println!("Effective values (with env overrides):");
            println!();
            let rendered =
                toml::to_string_pretty(effective).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }
            TaskboardConfig::default().save(config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }

    Ok(())
}
