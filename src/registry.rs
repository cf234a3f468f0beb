//! Static bot registry.
//!
//! Every bot the project ships is declared here. The deployer processes
//! descriptors in the order they appear in [`bots`].

use medbot_common::Extension;
use serde::Serialize;

use crate::errors::DeployError;

pub const SUPPORTED_INTERACTION_URL: &str =
    "https://medplum.com/fhir/StructureDefinition/subscription-supported-interaction";
pub const FHIRPATH_CRITERIA_URL: &str =
    "https://medplum.com/fhir/StructureDefinition/fhir-path-criteria-expression";

const TRIAGE_TASK_CRITERIA: &str = "Task.code.text='Trigger Triage'";

/// Build-time description of a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotDescriptor {
    pub name: String,
    /// Subscription criteria; a Subscription is deployed only when present.
    pub criteria: Option<String>,
    pub extension: Vec<Extension>,
    pub needs_admin_membership: Option<bool>,
    pub cron: Option<String>,
}

impl BotDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            criteria: None,
            extension: Vec::new(),
            needs_admin_membership: None,
            cron: None,
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn with_admin_membership(mut self, admin: bool) -> Self {
        self.needs_admin_membership = Some(admin);
        self
    }

    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = Some(cron.into());
        self
    }

    /// Whether the bot's membership should carry the admin flag. Absent means no.
    pub fn wants_admin(&self) -> bool {
        self.needs_admin_membership.unwrap_or(false)
    }
}

/// Which subscription interactions trigger a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Create,
    Update,
    Delete,
    /// No restriction.
    All,
}

impl Interaction {
    fn value_code(self) -> Option<&'static str> {
        match self {
            Interaction::Create => Some("create"),
            Interaction::Update => Some("update"),
            Interaction::Delete => Some("delete"),
            Interaction::All => None,
        }
    }
}

/// Subscription extension restricting which interactions fire the bot.
pub fn subscription_interaction_extension(interaction: Interaction) -> Extension {
    Extension {
        url: SUPPORTED_INTERACTION_URL.to_string(),
        value_code: interaction.value_code().map(str::to_string),
        value_string: None,
    }
}

/// Subscription extension filtering events with a FHIRPath expression.
pub fn fhirpath_criteria_extension(expression: impl Into<String>) -> Extension {
    Extension {
        url: FHIRPATH_CRITERIA_URL.to_string(),
        value_code: None,
        value_string: Some(expression.into()),
    }
}

/// The project's bots, in deploy order.
pub fn bots() -> Vec<BotDescriptor> {
    vec![
        BotDescriptor::new("start-triage")
            .with_criteria("Task")
            .with_extension(fhirpath_criteria_extension(TRIAGE_TASK_CRITERIA)),
        BotDescriptor::new("get-practitioner"),
        BotDescriptor::new("resource-manager"),
    ]
}

/// Bot names are embedded in placeholder tokens, so they are limited to
/// `[A-Za-z0-9_-]` and must be unique.
pub fn validate(descriptors: &[BotDescriptor]) -> Result<(), DeployError> {
    let mut seen = std::collections::HashSet::new();
    for d in descriptors {
        if d.name.is_empty() || !d.name.chars().all(is_name_char) {
            return Err(DeployError::Config(format!(
                "Invalid bot name '{}': use only letters, digits, '-' and '_'",
                d.name
            )));
        }
        if !seen.insert(d.name.as_str()) {
            return Err(DeployError::Config(format!("Duplicate bot name '{}'", d.name)));
        }
        if matches!(d.criteria.as_deref(), Some(c) if c.trim().is_empty()) {
            return Err(DeployError::Config(format!(
                "Bot '{}' declares empty subscription criteria",
                d.name
            )));
        }
    }
    Ok(())
}

pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
