//! Resolve a scheduling-system username to a Practitioner reference.

use medbot_common::{Practitioner, narrow, reference_string};
use serde_json::{Value, json};
use tracing::info;

use super::BotEvent;
use crate::errors::{DeployError, HandlerError};
use crate::platform::FhirPlatform;

pub const NAME: &str = "get-practitioner";
pub const IDENTIFIER_SYSTEM: &str = "cal-com";

/// Input: `{"cal-com": "<username>"}`. Output: `{"data": "Practitioner/<id>"}` or `null`.
pub async fn handler(platform: &dyn FhirPlatform, event: &BotEvent) -> Result<Value, HandlerError> {
    let username = event
        .input
        .get(IDENTIFIER_SYSTEM)
        .and_then(Value::as_str)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| HandlerError::InvalidInput("missing cal.com identifier in input".to_string()))?;

    let identifier = format!("{}|{}", IDENTIFIER_SYSTEM, username);
    let found = platform
        .search_one("Practitioner", &[("identifier", identifier.as_str())])
        .await?;

    let Some(value) = found else {
        info!(username, "no practitioner with cal.com username");
        return Ok(Value::Null);
    };
    let practitioner: Practitioner = narrow("Practitioner", value)
        .map_err(|e| DeployError::unexpected("search Practitioner", e))?;
    Ok(json!({ "data": reference_string("Practitioner", &practitioner.id) }))
}
