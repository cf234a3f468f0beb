//! Bot handlers: the code that runs inside each deployed bot.
//!
//! Each handler takes the platform boundary and a [`BotEvent`] and returns a
//! JSON result (`null` when there is nothing to return). `medbot invoke` runs
//! them locally against a live project.

pub mod awell;
pub mod get_practitioner;
pub mod resource_manager;
pub mod start_triage;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::HandlerError;
use crate::platform::FhirPlatform;

/// A project secret as delivered to a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

/// What a bot receives when triggered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotEvent {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub secrets: HashMap<String, Secret>,
}

impl BotEvent {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            secrets: HashMap::new(),
        }
    }

    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(
            name.to_string(),
            Secret {
                name: name.to_string(),
                value_string: Some(value.to_string()),
            },
        );
        self
    }

    /// Non-empty secret value, or `MissingSecret`.
    pub fn secret(&self, name: &str) -> Result<&str, HandlerError> {
        self.secrets
            .get(name)
            .and_then(|s| s.value_string.as_deref())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HandlerError::MissingSecret(name.to_string()))
    }
}

/// Names of every bot with a local handler.
pub const HANDLER_NAMES: &[&str] = &[
    start_triage::NAME,
    get_practitioner::NAME,
    resource_manager::NAME,
];

/// Run the handler registered under `bot_name`.
pub async fn invoke(
    bot_name: &str,
    platform: &dyn FhirPlatform,
    event: &BotEvent,
) -> Result<Value, HandlerError> {
    tracing::info!(bot = bot_name, "invoking bot handler");
    match bot_name {
        start_triage::NAME => start_triage::handler(platform, event).await,
        get_practitioner::NAME => get_practitioner::handler(platform, event).await,
        resource_manager::NAME => resource_manager::handler(platform, event).await,
        other => Err(HandlerError::UnknownBot(other.to_string())),
    }
}
