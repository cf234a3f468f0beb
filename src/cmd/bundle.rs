//! Dry run: build the transaction bundle and write it to disk without
//! touching the platform. Placeholders are left unresolved.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use medbot::config::MedbotConfig;
use medbot::deploy::build_bundle;
use medbot::registry;
use medbot::ui::icons::{CHECK, PACKAGE};

pub fn cmd_bundle(config: &MedbotConfig, output: &Path) -> Result<()> {
    let descriptors = registry::bots();
    registry::validate(&descriptors)?;
    let bundle = build_bundle(&descriptors, &super::artifact_store(config))?;

    let output = if output.is_absolute() {
        output.to_path_buf()
    } else {
        config.project_dir.join(output)
    };
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&bundle).context("Failed to serialize bundle")?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}Built bundle with {} entries for {} bots",
        PACKAGE,
        style(bundle.entry.len()).cyan(),
        descriptors.len()
    );
    println!("{}Wrote {}", CHECK, style(output.display()).bold());
    Ok(())
}
