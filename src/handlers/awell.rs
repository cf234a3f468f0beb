//! Client for the Awell care-flow GraphQL API.
//!
//! Query text is built by pure functions so it can be checked without a
//! server. String arguments are JSON-escaped, which yields valid GraphQL
//! string literals.

use async_trait::async_trait;
use medbot_common::Patient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::HandlerError;

pub const PATIENT_IDENTIFIER_SYSTEM: &str =
    "https://www.medplum.com/docs/api/fhir/resources/patient";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

/// Patient fields Awell needs, taken from a FHIR Patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwellPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub identifier: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    pub data_point_definition_id: String,
    pub value: String,
}

/// Strip everything but digits and prefix `+`. Absent input gives an empty string.
pub fn clean_phone_number(phone: Option<&str>) -> String {
    match phone {
        None | Some("") => String::new(),
        Some(p) => format!("+{}", p.chars().filter(char::is_ascii_digit).collect::<String>()),
    }
}

fn first_contact<'a>(patient: &'a Patient, system: &str) -> Option<&'a str> {
    patient
        .telecom
        .iter()
        .find(|t| t.system.as_deref() == Some(system))
        .and_then(|t| t.value.as_deref())
}

pub fn parse_awell_payload(patient: &Patient) -> AwellPatient {
    let id = patient.id.clone().unwrap_or_default();
    let name = patient.name.first();
    AwellPatient {
        first_name: name
            .and_then(|n| n.given.first())
            .cloned()
            .unwrap_or_default(),
        last_name: name.and_then(|n| n.family.clone()).unwrap_or_default(),
        phone: clean_phone_number(first_contact(patient, "phone")),
        email: first_contact(patient, "email").unwrap_or_default().to_string(),
        identifier: vec![Identifier {
            system: PATIENT_IDENTIFIER_SYSTEM.to_string(),
            value: id.clone(),
        }],
        id,
    }
}

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub fn patient_by_identifier_query(patient_id: &str) -> String {
    format!(
        "query GetPatientByIdentifier {{ patientByIdentifier(system: {}, value: {}) {{ patient {{ id }} }} }}",
        quote(PATIENT_IDENTIFIER_SYSTEM),
        quote(patient_id)
    )
}

pub fn create_patient_mutation(patient: &AwellPatient) -> String {
    let identifiers: Vec<String> = patient
        .identifier
        .iter()
        .map(|i| format!("{{ system: {}, value: {} }}", quote(&i.system), quote(&i.value)))
        .collect();
    format!(
        "mutation {{ createPatient(input: {{ first_name: {}, last_name: {}, phone: {}, email: {}, identifier: [{}] }}) {{ patient {{ id }} }} }}",
        quote(&patient.first_name),
        quote(&patient.last_name),
        quote(&patient.phone),
        quote(&patient.email),
        identifiers.join(", ")
    )
}

pub fn start_pathway_mutation(
    patient_id: &str,
    pathway_definition_id: &str,
    data_points: &[DataPoint],
) -> String {
    let points: Vec<String> = data_points
        .iter()
        .map(|p| {
            format!(
                "{{ data_point_definition_id: {}, value: {} }}",
                quote(&p.data_point_definition_id),
                quote(&p.value)
            )
        })
        .collect();
    format!(
        "mutation {{ startPathwayWithPatientIdentifier(input: {{ patient_identifier: {{ system: {}, value: {} }}, pathway_definition_id: {}, data_points: [{}] }}) {{ pathway_id }} }}",
        quote(PATIENT_IDENTIFIER_SYSTEM),
        quote(patient_id),
        quote(pathway_definition_id),
        points.join(", ")
    )
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// Turn a raw GraphQL response into its `data`, surfacing the first error.
fn unwrap_graphql<T: DeserializeOwned>(operation: &str, body: Value) -> Result<Option<T>, HandlerError> {
    let response: GraphQlResponse<T> = serde_json::from_value(body)
        .map_err(|e| HandlerError::CareFlow(format!("{}: malformed response: {}", operation, e)))?;
    if let Some(first) = response.errors.first() {
        let details = first
            .extensions
            .as_ref()
            .and_then(|e| e.get("data"))
            .map(Value::to_string)
            .unwrap_or_else(|| "none".to_string());
        return Err(HandlerError::CareFlow(format!(
            "{}: {}. DETAILS: {}",
            operation, first.message, details
        )));
    }
    Ok(response.data)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientByIdentifierData {
    patient_by_identifier: Option<PatientSlot>,
}

#[derive(Debug, Deserialize)]
struct PatientSlot {
    patient: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePatientData {
    create_patient: Option<PatientSlot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPathwayData {
    start_pathway_with_patient_identifier: Option<PathwaySlot>,
}

#[derive(Debug, Deserialize)]
struct PathwaySlot {
    pathway_id: String,
}

/// Care-flow operations used by the triage bot.
#[async_trait]
pub trait CareFlowApi: Send + Sync {
    /// Awell patient id for a platform patient id, if one exists.
    async fn find_patient(&self, patient_id: &str) -> Result<Option<String>, HandlerError>;

    async fn create_patient(&self, patient: &AwellPatient) -> Result<Option<String>, HandlerError>;

    /// Start a pathway; returns the pathway id.
    async fn start_pathway(
        &self,
        patient_id: &str,
        pathway_definition_id: &str,
        data_points: &[DataPoint],
    ) -> Result<String, HandlerError>;
}

pub struct AwellClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl AwellClient {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, HandlerError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HandlerError::CareFlow(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: String,
    ) -> Result<Option<T>, HandlerError> {
        debug!(operation, "sending care-flow request");
        let request = self
            .http
            .post(&self.api_url)
            .header("apiKey", self.api_key.as_str())
            .json(&json!({ "query": query }));

        let body: Value = tokio::time::timeout(self.timeout, async {
            let response = request
                .send()
                .await
                .map_err(|e| HandlerError::CareFlow(format!("{}: {}", operation, e)))?;
            response
                .json::<Value>()
                .await
                .map_err(|e| HandlerError::CareFlow(format!("{}: {}", operation, e)))
        })
        .await
        .map_err(|_| {
            HandlerError::CareFlow(format!(
                "{} timed out after {}s",
                operation,
                self.timeout.as_secs()
            ))
        })??;

        unwrap_graphql(operation, body)
    }
}

#[async_trait]
impl CareFlowApi for AwellClient {
    async fn find_patient(&self, patient_id: &str) -> Result<Option<String>, HandlerError> {
        let data: Option<PatientByIdentifierData> = self
            .execute("patientByIdentifier", patient_by_identifier_query(patient_id))
            .await?;
        Ok(data
            .and_then(|d| d.patient_by_identifier)
            .and_then(|slot| slot.patient)
            .map(|p| p.id))
    }

    async fn create_patient(&self, patient: &AwellPatient) -> Result<Option<String>, HandlerError> {
        let data: Option<CreatePatientData> = self
            .execute("createPatient", create_patient_mutation(patient))
            .await?;
        let id = data
            .and_then(|d| d.create_patient)
            .and_then(|slot| slot.patient)
            .map(|p| p.id);
        info!(awell_patient = ?id, "created care-flow patient");
        Ok(id)
    }

    async fn start_pathway(
        &self,
        patient_id: &str,
        pathway_definition_id: &str,
        data_points: &[DataPoint],
    ) -> Result<String, HandlerError> {
        let data: Option<StartPathwayData> = self
            .execute(
                "startPathwayWithPatientIdentifier",
                start_pathway_mutation(patient_id, pathway_definition_id, data_points),
            )
            .await?;
        data.and_then(|d| d.start_pathway_with_patient_identifier)
            .map(|slot| slot.pathway_id)
            .ok_or_else(|| {
                HandlerError::CareFlow("startPathwayWithPatientIdentifier returned no pathway".to_string())
            })
    }
}
