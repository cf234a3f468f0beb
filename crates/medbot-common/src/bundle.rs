use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resources::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Transaction,
    TransactionResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: HttpVerb,
    pub url: String,
}

impl BundleRequest {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpVerb::Post,
            url: url.into(),
        }
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self {
            method: HttpVerb::Put,
            url: url.into(),
        }
    }
}

/// One entry of an outgoing transaction bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Bundle-scoped synthetic identifier (`urn:uuid:...`), when other entries refer to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    pub request: BundleRequest,
    pub resource: Resource,
}

/// An outgoing transaction bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_resource_type")]
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

fn bundle_resource_type() -> String {
    "Bundle".to_string()
}

impl Bundle {
    pub fn transaction(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: bundle_resource_type(),
            bundle_type: BundleType::Transaction,
            entry,
        }
    }

    /// Find the entry carrying the given synthetic identifier.
    pub fn find_by_full_url(&self, full_url: &str) -> Option<&BundleEntry> {
        self.entry
            .iter()
            .find(|e| e.full_url.as_deref() == Some(full_url))
    }
}

/// Per-entry outcome inside a transaction response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// HTTP status line, e.g. `"201"` or `"201 Created"`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

impl EntryResponse {
    /// Numeric status code, taken from the leading digits of `status`.
    pub fn code(&self) -> Option<u16> {
        let digits: String = self
            .status
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.code(), Some(200..=299))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<EntryResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
}

impl ResponseEntry {
    pub fn is_success(&self) -> bool {
        self.response.as_ref().is_some_and(EntryResponse::is_success)
    }
}

/// The platform's reply to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<BundleType>,
    #[serde(default)]
    pub entry: Vec<ResponseEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    #[serde(default)]
    pub resource: Option<Value>,
}

/// A `searchset` bundle; resources are left untyped until narrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBundle {
    #[serde(default)]
    pub entry: Vec<SearchEntry>,
}

impl SearchBundle {
    pub fn into_first(self) -> Option<Value> {
        self.entry.into_iter().find_map(|e| e.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: &str) -> EntryResponse {
        EntryResponse {
            status: status.to_string(),
            location: None,
            outcome: None,
        }
    }

    #[test]
    fn status_code_parses_bare_and_reason_phrase_forms() {
        assert_eq!(response("201").code(), Some(201));
        assert_eq!(response("200 OK").code(), Some(200));
        assert_eq!(response(" 500 Internal Server Error").code(), Some(500));
        assert_eq!(response("created").code(), None);
    }

    #[test]
    fn any_2xx_is_success() {
        assert!(response("200").is_success());
        assert!(response("201 Created").is_success());
        assert!(response("204").is_success());
        assert!(!response("400").is_success());
        assert!(!response("500").is_success());
        assert!(!response("").is_success());
    }

    #[test]
    fn response_entry_without_response_is_failure() {
        let entry = ResponseEntry {
            response: None,
            resource: None,
        };
        assert!(!entry.is_success());
    }

    #[test]
    fn transaction_response_deserializes_platform_reply() {
        let reply = json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": [
                {"response": {"status": "201", "location": "Binary/1"}, "resource": {"resourceType": "Binary", "id": "1"}},
                {"response": {"status": "200 OK"}}
            ]
        });
        let parsed: TransactionResponse = serde_json::from_value(reply).unwrap();
        assert_eq!(parsed.bundle_type, Some(BundleType::TransactionResponse));
        assert_eq!(parsed.entry.len(), 2);
        assert!(parsed.entry.iter().all(ResponseEntry::is_success));
    }

    #[test]
    fn search_bundle_first_resource() {
        let search: SearchBundle = serde_json::from_value(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [{"resource": {"resourceType": "Bot", "id": "a"}}, {"resource": {"resourceType": "Bot", "id": "b"}}]
        }))
        .unwrap();
        assert_eq!(search.into_first().unwrap()["id"], "a");

        let empty: SearchBundle = serde_json::from_value(json!({"resourceType": "Bundle"})).unwrap();
        assert!(empty.into_first().is_none());
    }

    #[test]
    fn transaction_bundle_serializes_request_verbs() {
        let bundle = Bundle::transaction(Vec::new());
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value, json!({"resourceType": "Bundle", "type": "transaction", "entry": []}));
        assert_eq!(
            serde_json::to_value(BundleRequest::put("Bot/1")).unwrap(),
            json!({"method": "PUT", "url": "Bot/1"})
        );
    }
}
