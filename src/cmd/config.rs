//! Configuration view and validation commands: `medbot config`.

use anyhow::Result;

use medbot::config::{MedbotConfig, MedbotToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &MedbotConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("medbot configuration");
            println!("====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No medbot.toml found at {}; using defaults.", config_path.display());
            }
            println!();

            let toml = &config.toml;
            println!("[platform]");
            println!("  base_url = \"{}\"", toml.platform.base_url);
            println!("  timeout_secs = {}", toml.platform.timeout_secs);
            println!();
            println!("[artifacts]");
            println!("  source_dir = \"{}\"", toml.artifacts.source_dir.display());
            println!("  dist_dir = \"{}\"", toml.artifacts.dist_dir.display());
            println!("  source_extension = \"{}\"", toml.artifacts.source_extension);
            println!("  dist_extension = \"{}\"", toml.artifacts.dist_extension);
            println!();
            println!("[report]");
            println!("  enabled = {}", toml.report.enabled);
            println!("  dir = \"{}\"", toml.report.dir.display());
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  base_url = \"{}\"", config.base_url());
            println!("  source_dir = \"{}\"", config.source_dir().display());
            println!("  dist_dir = \"{}\"", config.dist_dir().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No medbot.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("medbot.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            MedbotToml::default().save(config_path)?;

            println!("Created medbot.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [platform] base_url, timeout_secs");
            println!("  - [artifacts] source_dir, dist_dir and extensions");
            println!("  - [report] enabled, dir");
            println!();
        }
    }

    Ok(())
}
