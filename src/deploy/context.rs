use medbot_common::reference_string;
use serde::Serialize;
use std::collections::HashMap;

/// A bot's identity on the remote platform after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteBotIdentity {
    pub id: String,
    pub membership_id: Option<String>,
    pub is_admin: bool,
    /// The bot did not exist and was created during this run.
    pub created: bool,
    /// The membership admin flag was changed during this run.
    pub membership_updated: bool,
}

/// State threaded through one deploy run.
///
/// Filled in during reconciliation, then only read by resolution and code
/// deployment.
#[derive(Debug, Clone)]
pub struct DeployContext {
    pub project_id: String,
    identities: HashMap<String, RemoteBotIdentity>,
}

impl DeployContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            identities: HashMap::new(),
        }
    }

    pub fn record(&mut self, bot_name: &str, identity: RemoteBotIdentity) {
        self.identities.insert(bot_name.to_string(), identity);
    }

    pub fn identity(&self, bot_name: &str) -> Option<&RemoteBotIdentity> {
        self.identities.get(bot_name)
    }

    pub fn bot_id(&self, bot_name: &str) -> Option<&str> {
        self.identity(bot_name).map(|i| i.id.as_str())
    }

    /// `Bot/<id>` for a reconciled bot.
    pub fn reference(&self, bot_name: &str) -> Option<String> {
        self.bot_id(bot_name).map(|id| reference_string("Bot", id))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
