//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled          |
//! |----------|---------------------------|
//! | `deploy` | `Deploy`                  |
//! | `bundle` | `Bundle`                  |
//! | `bots`   | `Bots`, `Invoke`          |
//! | `config` | `Config`                  |

pub mod bots;
pub mod bundle;
pub mod config;
pub mod deploy;

pub use bots::{cmd_bots_list, cmd_invoke};
pub use bundle::cmd_bundle;
pub use config::cmd_config;
pub use deploy::cmd_deploy;

use medbot::config::{Credentials, MedbotConfig};
use medbot::deploy::FsArtifactStore;
use medbot::errors::DeployError;
use medbot::platform::{MedplumClient, Session};

/// Artifact store laid out per `[artifacts]`.
fn artifact_store(config: &MedbotConfig) -> FsArtifactStore {
    let artifacts = &config.toml.artifacts;
    FsArtifactStore::new(config.source_dir(), config.dist_dir())
        .with_extensions(&artifacts.source_extension, &artifacts.dist_extension)
}

/// Read credentials and log in.
async fn connect(config: &MedbotConfig) -> Result<(MedplumClient, Session), DeployError> {
    let credentials = Credentials::from_env()?;
    let mut client = MedplumClient::new(&config.base_url(), config.timeout())?;
    let session = client.login(&credentials).await?;
    Ok((client, session))
}
