//! Whitelisted create/update/delete proxy.
//!
//! Lets callers without direct write access mutate a fixed set of resource
//! types through the bot's own credentials.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::BotEvent;
use crate::errors::HandlerError;
use crate::platform::FhirPlatform;

pub const NAME: &str = "resource-manager";
pub const ALLOWED_RESOURCE_TYPES: &[&str] = &["Appointment", "Communication"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    #[serde(rename = "type")]
    pub operation: Operation,
    pub resource_type: String,
    #[serde(default)]
    pub resource: Option<Value>,
    #[serde(default)]
    pub id: Option<String>,
}

impl ResourceRequest {
    pub fn parse(input: &Value) -> Result<Self, HandlerError> {
        let request: ResourceRequest = serde_json::from_value(input.clone())
            .map_err(|e| HandlerError::InvalidInput(e.to_string()))?;
        if !ALLOWED_RESOURCE_TYPES.contains(&request.resource_type.as_str()) {
            return Err(HandlerError::ResourceTypeNotAllowed(request.resource_type));
        }
        Ok(request)
    }

    /// The payload for create/update, checked against the declared type.
    fn body(&self) -> Result<Value, HandlerError> {
        let resource = self.resource.clone().ok_or_else(|| {
            HandlerError::InvalidInput(format!("resource is required for {:?}", self.operation))
        })?;
        match resource.get("resourceType").and_then(Value::as_str) {
            Some(t) if t == self.resource_type => Ok(resource),
            Some(t) => Err(HandlerError::InvalidInput(format!(
                "resource is a {} but resourceType is {}",
                t, self.resource_type
            ))),
            None => Err(HandlerError::InvalidInput(
                "resource has no resourceType".to_string(),
            )),
        }
    }

    /// The `id` naming the target of an update or delete.
    fn target_id(&self) -> Result<&str, HandlerError> {
        self.id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            HandlerError::InvalidInput(format!("id is required for {:?}", self.operation))
        })
    }
}

pub async fn handler(platform: &dyn FhirPlatform, event: &BotEvent) -> Result<Value, HandlerError> {
    let request = ResourceRequest::parse(&event.input)?;
    info!(
        operation = ?request.operation,
        resource_type = %request.resource_type,
        "managing resource"
    );

    match request.operation {
        Operation::Create => Ok(platform.create_resource(request.body()?).await?),
        Operation::Update => {
            let id = request.target_id()?;
            let mut resource = request.body()?;
            // The request id wins over any id carried in the payload.
            resource["id"] = Value::String(id.to_string());
            Ok(platform.update_resource(resource).await?)
        }
        Operation::Delete => {
            let id = request.target_id()?;
            platform.delete_resource(&request.resource_type, id).await?;
            Ok(Value::Null)
        }
    }
}
