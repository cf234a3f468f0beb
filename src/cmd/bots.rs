//! Registry listing and local handler invocation: `medbot bots`, `medbot invoke`.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use medbot::config::MedbotConfig;
use medbot::handlers::{self, BotEvent, Secret};
use medbot::registry;
use medbot::ui::icons::{LINK, ROBOT};

pub fn cmd_bots_list() -> Result<()> {
    let bots = registry::bots();
    println!();
    println!("Registered bots ({})", bots.len());
    println!("====================");
    println!();
    for bot in &bots {
        println!("{}{}", ROBOT, style(&bot.name).yellow().bold());
        match &bot.criteria {
            Some(criteria) => println!("    {}subscription: {}", LINK, criteria),
            None => println!("    {}", style("no subscription").dim()),
        }
        for ext in &bot.extension {
            let value = ext
                .value_string
                .as_deref()
                .or(ext.value_code.as_deref())
                .unwrap_or("-");
            println!("    extension: {} = {}", style(&ext.url).dim(), value);
        }
        if bot.wants_admin() {
            println!("    admin membership");
        }
        if let Some(cron) = &bot.cron {
            println!("    cron: {}", cron);
        }
    }
    println!();
    Ok(())
}

/// Read secrets from a JSON file of `{"NAME": "value"}`.
fn load_secrets(path: &Path) -> Result<HashMap<String, Secret>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
    let values: HashMap<String, String> =
        serde_json::from_str(&content).context("Secrets file must be a JSON object of strings")?;
    Ok(values
        .into_iter()
        .map(|(name, value)| {
            let secret = Secret {
                name: name.clone(),
                value_string: Some(value),
            };
            (name, secret)
        })
        .collect())
}

pub async fn cmd_invoke(
    config: &MedbotConfig,
    bot: &str,
    input: &str,
    secrets: Option<&Path>,
) -> Result<()> {
    let input: Value = serde_json::from_str(input).context("--input must be valid JSON")?;
    let secrets = match secrets {
        Some(path) => load_secrets(path)?,
        None => HashMap::new(),
    };
    let event = BotEvent { input, secrets };

    let (client, _session) = super::connect(config).await?;
    let output = handlers::invoke(bot, &client, &event).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
