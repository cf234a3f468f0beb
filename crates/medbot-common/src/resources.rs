use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while narrowing untyped platform JSON into a typed resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Expected a {expected} resource, got {actual}")]
    WrongType { expected: String, actual: String },

    #[error("Malformed {resource_type} resource: {source}")]
    Malformed {
        resource_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Narrow an untyped resource returned by the platform into `T`.
///
/// The `resourceType` discriminator is checked before deserializing so that a
/// search that unexpectedly returns an `OperationOutcome` is reported as such.
pub fn narrow<T: DeserializeOwned>(expected: &str, value: Value) -> Result<T, ResourceError> {
    let actual = value
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or("<missing resourceType>");
    if actual != expected {
        return Err(ResourceError::WrongType {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|source| ResourceError::Malformed {
        resource_type: expected.to_string(),
        source,
    })
}

/// `"<type>/<id>"`, the FHIR relative reference form.
pub fn reference_string(resource_type: &str, id: &str) -> String {
    format!("{}/{}", resource_type, id)
}

/// FHIR Extension. Only the value types the registry emits are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

/// `sourceCode` / `executableCode` attachment on a Bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAttachment {
    pub content_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content_type: String,
    /// Base64 payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<CodeAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_code: Option<CodeAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionChannel {
    #[serde(rename = "type")]
    pub channel_type: String,
    pub endpoint: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    pub reason: String,
    pub criteria: String,
    #[serde(default)]
    pub extension: Vec<Extension>,
    pub channel: SubscriptionChannel,
}

/// A project membership as returned by the platform.
///
/// The admin endpoint expects the whole membership back on update, so every
/// field we do not model is carried in `rest` and serialized unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMembership {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ProjectMembership {
    pub fn is_admin(&self) -> bool {
        self.admin.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Vec<HumanName>,
    #[serde(default)]
    pub telecom: Vec<ContactPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: String,
}

/// Resources that the deployer places in a transaction bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Binary(Binary),
    Bot(Bot),
    Subscription(Subscription),
}

impl Resource {
    pub fn resource_type(&self) -> &'static str {
        match self {
            Resource::Binary(_) => "Binary",
            Resource::Bot(_) => "Bot",
            Resource::Subscription(_) => "Subscription",
        }
    }
}
