//! Layered configuration for medbot.
//!
//! Settings are read from `medbot.toml` in the project directory, then
//! overridden by environment variables, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [platform]
//! base_url = "https://api.medplum.com/"
//! timeout_secs = 30
//!
//! [artifacts]
//! source_dir = "src/bots"
//! dist_dir = "dist/bots"
//! source_extension = "ts"
//! dist_extension = "js"
//!
//! [report]
//! enabled = true
//! dir = ".medbot/deploys"
//! ```
//!
//! Deploy credentials are never read from the file. They come from
//! `DEPLOY_MEDPLUM_CLIENT_ID` / `DEPLOY_MEDPLUM_CLIENT_SECRET`, optionally
//! loaded from `env/.env` or `.env` by [`load_dotenv`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::DeployError;

pub const CONFIG_FILE: &str = "medbot.toml";
pub const DEFAULT_BASE_URL: &str = "https://api.medplum.com/";

pub const ENV_BASE_URL: &str = "MEDPLUM_BASE_URL";
pub const ENV_CLIENT_ID: &str = "DEPLOY_MEDPLUM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DEPLOY_MEDPLUM_CLIENT_SECRET";

/// Remote platform settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSection {
    /// Base URL of the Medplum server (FHIR lives under `fhir/R4/`)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where the build leaves bot source and compiled code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsSection {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    #[serde(default = "default_dist_extension")]
    pub dist_extension: String,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src/bots")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist/bots")
}

fn default_source_extension() -> String {
    "ts".to_string()
}

fn default_dist_extension() -> String {
    "js".to_string()
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            dist_dir: default_dist_dir(),
            source_extension: default_source_extension(),
            dist_extension: default_dist_extension(),
        }
    }
}

/// Deploy report settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
}

fn default_report_enabled() -> bool {
    true
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".medbot/deploys")
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            enabled: default_report_enabled(),
            dir: default_report_dir(),
        }
    }
}

/// Contents of `medbot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedbotToml {
    #[serde(default)]
    pub platform: PlatformSection,
    #[serde(default)]
    pub artifacts: ArtifactsSection,
    #[serde(default)]
    pub report: ReportSection,
}

impl MedbotToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse medbot.toml")
    }

    /// Load from `path`, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize medbot.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match reqwest::Url::parse(&self.platform.base_url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => warnings.push(format!(
                "Invalid base_url '{}': scheme must be http or https",
                self.platform.base_url
            )),
            Ok(_) => {}
            Err(e) => warnings.push(format!(
                "Invalid base_url '{}': {}",
                self.platform.base_url, e
            )),
        }

        if self.platform.timeout_secs == 0 {
            warnings.push("timeout_secs must be greater than zero".to_string());
        }

        for (key, ext) in [
            ("source_extension", &self.artifacts.source_extension),
            ("dist_extension", &self.artifacts.dist_extension),
        ] {
            if ext.is_empty() || ext.starts_with('.') {
                warnings.push(format!(
                    "Invalid {} '{}': expected a bare extension like \"js\"",
                    key, ext
                ));
            }
        }

        warnings
    }
}

/// Runtime configuration: `medbot.toml` merged with environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct MedbotConfig {
    pub project_dir: PathBuf,
    pub config_path: PathBuf,
    pub toml: MedbotToml,
    /// CLI override for the platform base URL
    pub cli_base_url: Option<String>,
}

impl MedbotConfig {
    /// Load configuration for a project directory.
    ///
    /// `config_path` defaults to `<project_dir>/medbot.toml`; relative paths are
    /// resolved against the project directory.
    pub fn new(project_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_path = match config_path {
            Some(p) if p.is_absolute() => p,
            Some(p) => project_dir.join(p),
            None => project_dir.join(CONFIG_FILE),
        };
        let toml = MedbotToml::load_or_default(&config_path)?;

        Ok(Self {
            project_dir,
            config_path,
            toml,
            cli_base_url: None,
        })
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.cli_base_url = base_url;
        self
    }

    /// Platform base URL (CLI → env → file), always ending in `/`.
    pub fn base_url(&self) -> String {
        let url = self
            .cli_base_url
            .clone()
            .or_else(|| std::env::var(ENV_BASE_URL).ok())
            .unwrap_or_else(|| self.toml.platform.base_url.clone());
        if url.ends_with('/') {
            url
        } else {
            format!("{}/", url)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.platform.timeout_secs)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.artifacts.source_dir)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.artifacts.dist_dir)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.report.dir)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

/// Client-credentials pair used to log in before deploying.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read both credentials from the environment. Either being absent or empty is fatal.
    pub fn from_env() -> Result<Self, DeployError> {
        Ok(Self {
            client_id: required_env(ENV_CLIENT_ID)?,
            client_secret: required_env(ENV_CLIENT_SECRET)?,
        })
    }
}

fn required_env(name: &str) -> Result<String, DeployError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DeployError::Config(format!(
            "{} is not set; export it or add it to env/.env",
            name
        ))),
    }
}

/// Load `env/.env` then `.env` from the project directory, if present.
///
/// Variables already set in the process environment win.
pub fn load_dotenv(project_dir: &Path) -> Result<()> {
    for candidate in [project_dir.join("env").join(".env"), project_dir.join(".env")] {
        if candidate.exists() {
            dotenvy::from_path(&candidate)
                .with_context(|| format!("Failed to load {}", candidate.display()))?;
            tracing::debug!(path = %candidate.display(), "loaded environment file");
        }
    }
    Ok(())
}
