//! Boundary with the remote FHIR platform.
//!
//! Everything the deployer and the bot handlers need from the platform goes
//! through [`FhirPlatform`]. Real implementation: [`MedplumClient`]. Test
//! double: `testing::FakePlatform`.

pub mod medplum;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use medbot_common::{Bundle, TransactionResponse};
use serde_json::Value;

use crate::errors::DeployError;

pub use medplum::{MedplumClient, Session};

/// Remote FHIR platform operations.
///
/// Resources cross this boundary as untyped JSON; callers narrow them with
/// [`medbot_common::narrow`] before use.
#[async_trait]
pub trait FhirPlatform: Send + Sync {
    /// First resource of `resource_type` matching `query`, if any.
    async fn search_one(
        &self,
        resource_type: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, DeployError>;

    async fn create_resource(&self, resource: Value) -> Result<Value, DeployError>;

    async fn update_resource(&self, resource: Value) -> Result<Value, DeployError>;

    async fn delete_resource(&self, resource_type: &str, id: &str) -> Result<(), DeployError>;

    /// Submit a transaction bundle. Per-entry failures are reported in the
    /// response, not as an `Err`.
    async fn execute_batch(&self, bundle: &Bundle) -> Result<TransactionResponse, DeployError>;

    /// POST to a path relative to the platform base URL.
    async fn post(&self, path: &str, body: Value) -> Result<Value, DeployError>;

    /// Push executable code to a bot's runtime slot.
    async fn deploy_bot(&self, bot_id: &str, code: &str) -> Result<(), DeployError>;
}

/// `resourceType` and `id` of an untyped resource, for routing create/update/delete.
pub(crate) fn resource_type_and_id(resource: &Value) -> (Option<&str>, Option<&str>) {
    (
        resource.get("resourceType").and_then(Value::as_str),
        resource.get("id").and_then(Value::as_str),
    )
}
