//! In-memory platform double for unit tests.

use async_trait::async_trait;
use medbot_common::{Bundle, EntryResponse, ResponseEntry, TransactionResponse};
use serde_json::{Value, json};
use std::sync::Mutex;

use super::{FhirPlatform, resource_type_and_id};
use crate::errors::DeployError;

#[derive(Default)]
struct State {
    resources: Vec<Value>,
    next_id: u32,
    calls: Vec<String>,
    submitted: Vec<Bundle>,
    deployed: Vec<(String, String)>,
    batch_statuses: Option<Vec<String>>,
    fail_operation: Option<String>,
    ignore_exact: bool,
}

/// Records every call in order and keeps resources in a flat list.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource; returns its id.
    pub fn insert(&self, mut resource: Value) -> String {
        let mut state = self.state.lock().unwrap();
        let id = match resource.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                state.next_id += 1;
                let id = format!("gen-{}", state.next_id);
                resource["id"] = json!(id);
                id
            }
        };
        state.resources.push(resource);
        id
    }

    /// Statuses returned for the next transaction, one per entry. Default: all `201`.
    pub fn set_batch_statuses(&self, statuses: &[&str]) {
        self.state.lock().unwrap().batch_statuses =
            Some(statuses.iter().map(|s| s.to_string()).collect());
    }

    /// Fail any call whose log line starts with `prefix`.
    pub fn fail_on(&self, prefix: &str) {
        self.state.lock().unwrap().fail_operation = Some(prefix.to_string());
    }

    /// Treat `name:exact` like plain `name`, as a server without modifier support would.
    pub fn ignore_exact_modifier(&self) {
        self.state.lock().unwrap().ignore_exact = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn submitted(&self) -> Vec<Bundle> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn deployed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().deployed.clone()
    }

    pub fn find(&self, resource_type: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .resources
            .iter()
            .find(|r| resource_type_and_id(r) == (Some(resource_type), Some(id)))
            .cloned()
    }

    pub fn count(&self, resource_type: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .resources
            .iter()
            .filter(|r| r["resourceType"] == resource_type)
            .count()
    }

    fn record(&self, call: String) -> Result<(), DeployError> {
        let mut state = self.state.lock().unwrap();
        let fail = state
            .fail_operation
            .as_deref()
            .is_some_and(|prefix| call.starts_with(prefix));
        state.calls.push(call.clone());
        if fail {
            Err(DeployError::remote(call, "HTTP 500 Internal Server Error: injected"))
        } else {
            Ok(())
        }
    }
}

/// FHIR string search: `name` is a case-insensitive prefix match, `name:exact` is not.
fn matches_query(resource: &Value, key: &str, value: &str) -> bool {
    match key {
        "name" => resource["name"]
            .as_str()
            .is_some_and(|name| name.to_lowercase().starts_with(&value.to_lowercase())),
        "name:exact" => resource["name"] == value,
        "user" => resource["user"]["reference"] == value,
        "identifier" => {
            let (system, code) = value.split_once('|').unwrap_or(("", value));
            resource["identifier"]
                .as_array()
                .is_some_and(|ids| ids.iter().any(|i| i["system"] == system && i["value"] == code))
        }
        _ => resource[key] == value,
    }
}

#[async_trait]
impl FhirPlatform for FakePlatform {
    async fn search_one(
        &self,
        resource_type: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, DeployError> {
        let rendered: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.record(format!("search {}?{}", resource_type, rendered.join("&")))?;
        let state = self.state.lock().unwrap();
        let effective_key = |k: &str| -> String {
            if state.ignore_exact {
                k.trim_end_matches(":exact").to_string()
            } else {
                k.to_string()
            }
        };
        Ok(state
            .resources
            .iter()
            .find(|r| {
                r["resourceType"] == resource_type
                    && query.iter().all(|(k, v)| matches_query(r, &effective_key(k), v))
            })
            .cloned())
    }

    async fn create_resource(&self, resource: Value) -> Result<Value, DeployError> {
        let resource_type = resource_type_and_id(&resource).0.unwrap_or("?").to_string();
        self.record(format!("create {}", resource_type))?;
        let id = self.insert(resource);
        Ok(self.find(&resource_type, &id).unwrap_or(Value::Null))
    }

    async fn update_resource(&self, resource: Value) -> Result<Value, DeployError> {
        let (t, id) = resource_type_and_id(&resource);
        let key = (t.unwrap_or("?").to_string(), id.unwrap_or("?").to_string());
        self.record(format!("update {}/{}", key.0, key.1))?;
        let mut state = self.state.lock().unwrap();
        state
            .resources
            .retain(|r| resource_type_and_id(r) != (Some(key.0.as_str()), Some(key.1.as_str())));
        state.resources.push(resource.clone());
        Ok(resource)
    }

    async fn delete_resource(&self, resource_type: &str, id: &str) -> Result<(), DeployError> {
        self.record(format!("delete {}/{}", resource_type, id))?;
        self.state
            .lock()
            .unwrap()
            .resources
            .retain(|r| resource_type_and_id(r) != (Some(resource_type), Some(id)));
        Ok(())
    }

    async fn execute_batch(&self, bundle: &Bundle) -> Result<TransactionResponse, DeployError> {
        self.record(format!("transaction {} entries", bundle.entry.len()))?;
        let mut state = self.state.lock().unwrap();
        state.submitted.push(bundle.clone());
        let statuses = state
            .batch_statuses
            .clone()
            .unwrap_or_else(|| vec!["201".to_string(); bundle.entry.len()]);
        Ok(TransactionResponse {
            bundle_type: None,
            entry: statuses
                .into_iter()
                .map(|status| ResponseEntry {
                    response: Some(EntryResponse {
                        status,
                        location: None,
                        outcome: None,
                    }),
                    resource: None,
                })
                .collect(),
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, DeployError> {
        self.record(format!("post {}", path))?;
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["admin", "projects", _, "bot"] => {
                let mut bot = body;
                bot["resourceType"] = json!("Bot");
                let id = self.insert(bot);
                Ok(self.find("Bot", &id).unwrap_or(Value::Null))
            }
            ["admin", "projects", _, "members", id] => {
                let mut membership = body;
                membership["id"] = json!(id);
                let mut state = self.state.lock().unwrap();
                state.resources.retain(|r| {
                    resource_type_and_id(r) != (Some("ProjectMembership"), Some(*id))
                });
                state.resources.push(membership.clone());
                Ok(membership)
            }
            _ => Ok(Value::Null),
        }
    }

    async fn deploy_bot(&self, bot_id: &str, code: &str) -> Result<(), DeployError> {
        self.record(format!("deploy {}", bot_id))?;
        self.state
            .lock()
            .unwrap()
            .deployed
            .push((bot_id.to_string(), code.to_string()));
        Ok(())
    }
}
