use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medbot::config::MedbotConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "medbot")]
#[command(version, about = "Deploy and run Medplum bots")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to medbot.toml (relative paths resolve against the project directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Platform base URL. Overrides MEDPLUM_BASE_URL and medbot.toml.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, reconcile, submit and deploy every registered bot
    Deploy {
        /// Do not write a deploy report
        #[arg(long)]
        no_report: bool,
    },
    /// Build the transaction bundle and write it to a file without deploying
    Bundle {
        #[arg(short, long, default_value = "bundle.json")]
        output: PathBuf,
    },
    /// Inspect the bot registry
    Bots {
        #[command(subcommand)]
        command: BotsCommands,
    },
    /// Run a bot handler locally against the platform
    Invoke {
        /// Bot name, e.g. get-practitioner
        bot: String,

        /// Event input as JSON
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// JSON file of secrets, {"NAME": "value"}
        #[arg(long)]
        secrets: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BotsCommands {
    /// List registered bots and their subscriptions
    List,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    medbot::logging::init(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    // Env files must be loaded before anything reads configuration.
    medbot::config::load_dotenv(&project_dir)?;
    let config = MedbotConfig::new(project_dir, cli.config.clone())?.with_base_url(cli.base_url.clone());

    let result = match &cli.command {
        Commands::Deploy { no_report } => cmd::cmd_deploy(&config, *no_report, cli.log_json).await,
        Commands::Bundle { output } => cmd::cmd_bundle(&config, output),
        Commands::Bots { command } => match command {
            BotsCommands::List => cmd::cmd_bots_list(),
        },
        Commands::Invoke {
            bot,
            input,
            secrets,
        } => cmd::cmd_invoke(&config, bot, input, secrets.as_deref()).await,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone()),
    };

    if let Err(e) = &result {
        tracing::error!("command failed: {:#}", e);
    }
    result
}
