//! Push compiled code to each bot's runtime once the transaction has landed.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use medbot_common::{Bundle, Resource};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use super::bundle::bot_definitions;
use super::context::DeployContext;
use crate::errors::DeployError;
use crate::platform::FhirPlatform;

/// One successful `$deploy` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedCode {
    pub bot: String,
    pub bot_id: String,
    pub sha256: String,
    pub bytes: usize,
}

pub fn code_digest(code: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code);
    format!("{:x}", hasher.finalize())
}

/// Text sent to `$deploy`. Bytes that are not UTF-8 map one-to-one onto
/// Latin-1 characters, so no byte is dropped or replaced.
pub fn code_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Decoded compiled bytes for `bot_name`, looked up through its definition's
/// `executableCode.url` in the unresolved bundle.
pub fn compiled_code(bundle: &Bundle, bot_name: &str) -> Result<Vec<u8>, DeployError> {
    let bot = bot_definitions(bundle)
        .find(|b| b.name == bot_name)
        .ok_or_else(|| {
            DeployError::IntegrityViolation(format!("no bot definition for '{}' in bundle", bot_name))
        })?;
    let url = bot
        .executable_code
        .as_ref()
        .map(|c| c.url.as_str())
        .ok_or_else(|| {
            DeployError::IntegrityViolation(format!("bot '{}' has no executable code", bot_name))
        })?;

    let data = match bundle.find_by_full_url(url).map(|e| &e.resource) {
        Some(Resource::Binary(binary)) => binary.data.as_deref(),
        _ => None,
    }
    .ok_or_else(|| {
        DeployError::IntegrityViolation(format!(
            "compiled binary {} for bot '{}' is missing from bundle",
            url, bot_name
        ))
    })?;

    STANDARD.decode(data).map_err(|e| {
        DeployError::IntegrityViolation(format!(
            "compiled binary for bot '{}' is not valid base64: {}",
            bot_name, e
        ))
    })
}

/// Deploy every bot's compiled code in bundle order. The first failure stops
/// the run; bots deployed before it stay in `deployed`.
pub async fn deploy_code(
    platform: &dyn FhirPlatform,
    ctx: &DeployContext,
    bundle: &Bundle,
    deployed: &mut Vec<DeployedCode>,
) -> Result<(), DeployError> {
    for bot in bot_definitions(bundle) {
        let name = bot.name.as_str();
        let bytes = compiled_code(bundle, name)?;
        let bot_id = ctx.bot_id(name).ok_or_else(|| {
            DeployError::IntegrityViolation(format!("bot '{}' was never reconciled", name))
        })?;

        platform.deploy_bot(bot_id, &code_text(&bytes)).await?;
        info!(bot = name, id = bot_id, bytes = bytes.len(), "deployed bot code");
        deployed.push(DeployedCode {
            bot: name.to_string(),
            bot_id: bot_id.to_string(),
            sha256: code_digest(&bytes),
            bytes: bytes.len(),
        });
    }
    Ok(())
}
