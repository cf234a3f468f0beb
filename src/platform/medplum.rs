//! HTTP client for a Medplum server.

use async_trait::async_trait;
use medbot_common::{Bundle, SearchBundle, TransactionResponse, narrow};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use super::{FhirPlatform, resource_type_and_id};
use crate::config::Credentials;
use crate::errors::DeployError;

const FHIR_PATH: &str = "fhir/R4/";

/// OAuth token response (subset).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

/// `auth/me` response (subset).
#[derive(Debug, Deserialize)]
struct MeResponse {
    project: Option<IdOnly>,
}

/// Result of a successful client login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub project_id: String,
}

pub struct MedplumClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    access_token: Option<String>,
}

impl MedplumClient {
    /// Create a client for `base_url`. No request is made until login.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeployError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DeployError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(DeployError::Config(format!(
                "Base URL must use http or https, got: {}",
                base_url.scheme()
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("medbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            timeout,
            access_token: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client-credentials login, then project discovery via `auth/me`.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<Session, DeployError> {
        let token_url = self.url("oauth2/token")?;
        let request = self.http.post(token_url).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ]);
        let token: TokenResponse = serde_json::from_value(self.send("client login", request).await?)
            .map_err(|e| DeployError::remote("client login", format!("malformed token response: {}", e)))?;
        self.access_token = Some(token.access_token);

        let me_url = self.url("auth/me")?;
        let me: MeResponse = serde_json::from_value(self.send("GET auth/me", self.http.get(me_url)).await?)
            .map_err(|e| DeployError::remote("GET auth/me", format!("malformed profile response: {}", e)))?;
        let project_id = me
            .project
            .map(|p| p.id)
            .ok_or_else(|| DeployError::remote("GET auth/me", "client is not a member of any project"))?;

        info!(project = %project_id, "logged in to {}", self.base_url);
        Ok(Session { project_id })
    }

    /// Resolve a path relative to the base URL.
    pub fn url(&self, path: &str) -> Result<Url, DeployError> {
        self.base_url
            .join(path)
            .map_err(|e| DeployError::Config(format!("Invalid request path '{}': {}", path, e)))
    }

    /// Resolve a path relative to the FHIR base (`<base>/fhir/R4/`).
    pub fn fhir_url(&self, path: &str) -> Result<Url, DeployError> {
        self.url(&format!("{}{}", FHIR_PATH, path))
    }

    /// Send a request with auth and the per-call timeout applied.
    ///
    /// Non-2xx responses become `RemoteCall` errors carrying the status and the
    /// server's diagnostics. An empty body decodes as `Value::Null`.
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, DeployError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        debug!(operation, "sending request");

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| DeployError::remote(operation, e))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| DeployError::remote(operation, e))?;
            if !status.is_success() {
                return Err(DeployError::remote(
                    operation,
                    format!("HTTP {}: {}", status, describe_error_body(&body)),
                ));
            }
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body)
                .map_err(|e| DeployError::remote(operation, format!("invalid JSON response: {}", e)))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DeployError::Timeout {
                operation: operation.to_string(),
                timeout: self.timeout,
            })?
    }
}

/// Pull human-readable diagnostics out of an `OperationOutcome`, falling back to the raw body.
pub fn describe_error_body(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    if value.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
        return body.trim().to_string();
    }
    let messages: Vec<String> = value
        .get("issue")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(|issue| {
                    issue
                        .pointer("/details/text")
                        .or_else(|| issue.get("diagnostics"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    if messages.is_empty() {
        body.trim().to_string()
    } else {
        messages.join("; ")
    }
}

#[async_trait]
impl FhirPlatform for MedplumClient {
    async fn search_one(
        &self,
        resource_type: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, DeployError> {
        let operation = format!("search {}", resource_type);
        let request = self
            .http
            .get(self.fhir_url(resource_type)?)
            .query(query)
            .query(&[("_count", "1")]);
        let bundle = self.send(&operation, request).await?;
        let search: SearchBundle =
            narrow("Bundle", bundle).map_err(|e| DeployError::unexpected(&operation, e))?;
        Ok(search.into_first())
    }

    async fn create_resource(&self, resource: Value) -> Result<Value, DeployError> {
        let (resource_type, _) = resource_type_and_id(&resource);
        let resource_type = resource_type
            .ok_or_else(|| DeployError::remote("create", "resource has no resourceType"))?
            .to_string();
        let operation = format!("POST {}", resource_type);
        let request = self.http.post(self.fhir_url(&resource_type)?).json(&resource);
        self.send(&operation, request).await
    }

    async fn update_resource(&self, resource: Value) -> Result<Value, DeployError> {
        let path = match resource_type_and_id(&resource) {
            (Some(t), Some(id)) => format!("{}/{}", t, id),
            _ => {
                return Err(DeployError::remote(
                    "update",
                    "resource needs both resourceType and id",
                ));
            }
        };
        let operation = format!("PUT {}", path);
        let request = self.http.put(self.fhir_url(&path)?).json(&resource);
        self.send(&operation, request).await
    }

    async fn delete_resource(&self, resource_type: &str, id: &str) -> Result<(), DeployError> {
        let path = format!("{}/{}", resource_type, id);
        let operation = format!("DELETE {}", path);
        self.send(&operation, self.http.delete(self.fhir_url(&path)?))
            .await
            .map(|_| ())
    }

    async fn execute_batch(&self, bundle: &Bundle) -> Result<TransactionResponse, DeployError> {
        let operation = "POST transaction bundle";
        let request = self.http.post(self.fhir_url("")?).json(bundle);
        let response = self.send(operation, request).await?;
        narrow("Bundle", response).map_err(|e| DeployError::unexpected(operation, e))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, DeployError> {
        let operation = format!("POST {}", path);
        let request = self.http.post(self.url(path)?).json(&body);
        self.send(&operation, request).await
    }

    async fn deploy_bot(&self, bot_id: &str, code: &str) -> Result<(), DeployError> {
        let path = format!("Bot/{}/$deploy", bot_id);
        let operation = format!("POST {}", path);
        let request = self
            .http
            .post(self.fhir_url(&path)?)
            .json(&json!({ "code": code }));
        self.send(&operation, request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn client(base: &str) -> MedplumClient {
        MedplumClient::new(base, Duration::from_secs(5)).unwrap()
    }

    /// Read one HTTP/1.1 request (headers plus `Content-Length` body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve a single canned response; the handle yields the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/fhir+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });
        (base, handle)
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let client = MedplumClient::new(&base, Duration::from_millis(200)).unwrap();
        let err = client
            .post("admin/projects/p1/bot", json!({"name": "a"}))
            .await
            .unwrap_err();

        match err {
            DeployError::Timeout { operation, timeout } => {
                assert_eq!(operation, "POST admin/projects/p1/bot");
                assert_eq!(timeout, Duration::from_millis(200));
            }
            other => panic!("Expected DeployError::Timeout, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn server_error_becomes_remote_call_with_diagnostics() {
        let outcome = r#"{"resourceType":"OperationOutcome","issue":[{"severity":"error","code":"processing","diagnostics":"Bot runtime unavailable"}]}"#;
        let (base, server) = serve_once("500 Internal Server Error", outcome).await;

        let err = client(&base).deploy_bot("b1", "exports.a=1").await.unwrap_err();

        match err {
            DeployError::RemoteCall { operation, message } => {
                assert_eq!(operation, "POST Bot/b1/$deploy");
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("Bot runtime unavailable"), "{message}");
            }
            other => panic!("Expected DeployError::RemoteCall, got {other:?}"),
        }
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /fhir/R4/Bot/b1/$deploy"), "{request}");
        assert!(request.contains(r#""code":"exports.a=1""#), "{request}");
    }

    #[tokio::test]
    async fn search_returns_first_match() {
        let bundle = r#"{"resourceType":"Bundle","type":"searchset","entry":[{"resource":{"resourceType":"Bot","id":"b1","name":"start-triage"}}]}"#;
        let (base, server) = serve_once("200 OK", bundle).await;

        let found = client(&base)
            .search_one("Bot", &[("name:exact", "start-triage")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found["id"], "b1");
        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /fhir/R4/Bot?"), "{request_line}");
        assert!(request_line.contains("exact=start-triage"), "{request_line}");
        assert!(request_line.contains("_count=1"), "{request_line}");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = MedplumClient::new("ftp://example.org/", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, DeployError::Config(_)));
        assert!(MedplumClient::new("nonsense", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn fhir_urls_nest_under_r4() {
        let c = client("https://api.medplum.com/");
        assert_eq!(
            c.fhir_url("Bot/abc/$deploy").unwrap().as_str(),
            "https://api.medplum.com/fhir/R4/Bot/abc/$deploy"
        );
        assert_eq!(
            c.fhir_url("").unwrap().as_str(),
            "https://api.medplum.com/fhir/R4/"
        );
        assert_eq!(
            c.url("admin/projects/p1/bot").unwrap().as_str(),
            "https://api.medplum.com/admin/projects/p1/bot"
        );
    }

    #[test]
    fn describe_operation_outcome_uses_details() {
        let body = r#"{"resourceType":"OperationOutcome","issue":[
            {"severity":"error","code":"invalid","details":{"text":"Missing name"}},
            {"severity":"error","code":"invalid","diagnostics":"bad criteria"}
        ]}"#;
        assert_eq!(describe_error_body(body), "Missing name; bad criteria");
    }

    #[test]
    fn describe_plain_body_passes_through() {
        assert_eq!(describe_error_body("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(describe_error_body(r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }

    #[test]
    fn me_response_without_project() {
        let me: MeResponse = serde_json::from_str(r#"{"profile":{"id":"x"}}"#).unwrap();
        assert!(me.project.is_none());
        let me: MeResponse =
            serde_json::from_str(r#"{"project":{"resourceType":"Project","id":"p1"}}"#).unwrap();
        assert_eq!(me.project.unwrap().id, "p1");
    }
}
