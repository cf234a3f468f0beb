//! Start the triage care flow for a patient.
//!
//! Triggered by the `Task` subscription. The event input is the Patient; the
//! patient is registered with Awell when missing, then the triage pathway is
//! started with the patient's phone number as its single data point.

use medbot_common::Patient;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::BotEvent;
use super::awell::{AwellClient, CareFlowApi, DataPoint, parse_awell_payload};
use crate::errors::HandlerError;
use crate::platform::FhirPlatform;

pub const NAME: &str = "start-triage";

pub const AWELL_API_KEY: &str = "AWELL_API_KEY";
pub const AWELL_API_URL: &str = "AWELL_API_URL";
pub const TRIAGE_PATHWAY_DEFINITION_ID: &str = "TRIAGE_PATHWAY_DEFINITION_ID";
pub const TRIAGE_DATA_POINT_DEFINITION_ID: &str = "TRIAGE_DATA_POINT_DEFINITION_ID";

const CARE_FLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// Secrets the triage bot needs, all required.
#[derive(Debug, Clone)]
pub struct TriageSettings {
    pub api_url: String,
    pub api_key: String,
    pub pathway_definition_id: String,
    pub data_point_definition_id: String,
}

impl TriageSettings {
    pub fn from_event(event: &BotEvent) -> Result<Self, HandlerError> {
        Ok(Self {
            api_key: event.secret(AWELL_API_KEY)?.to_string(),
            api_url: event.secret(AWELL_API_URL)?.to_string(),
            pathway_definition_id: event.secret(TRIAGE_PATHWAY_DEFINITION_ID)?.to_string(),
            data_point_definition_id: event.secret(TRIAGE_DATA_POINT_DEFINITION_ID)?.to_string(),
        })
    }
}

/// Ensure the patient exists in the care-flow service, then start the pathway.
pub async fn start_triage(
    care_flow: &dyn CareFlowApi,
    settings: &TriageSettings,
    patient: &Patient,
) -> Result<String, HandlerError> {
    let patient_id = patient
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HandlerError::InvalidInput("patient has no id".to_string()))?;
    let payload = parse_awell_payload(patient);

    if care_flow.find_patient(patient_id).await?.is_none() {
        info!(patient = patient_id, "patient unknown to care-flow service, creating");
        care_flow.create_patient(&payload).await?;
    }

    let data_points = [DataPoint {
        data_point_definition_id: settings.data_point_definition_id.clone(),
        value: payload.phone,
    }];
    let pathway_id = care_flow
        .start_pathway(patient_id, &settings.pathway_definition_id, &data_points)
        .await?;
    info!(patient = patient_id, pathway = %pathway_id, "started triage pathway");
    Ok(pathway_id)
}

pub async fn handler(_platform: &dyn FhirPlatform, event: &BotEvent) -> Result<Value, HandlerError> {
    let settings = TriageSettings::from_event(event)?;
    let patient: Patient = serde_json::from_value(event.input.clone())
        .map_err(|e| HandlerError::InvalidInput(format!("input is not a Patient: {}", e)))?;
    let client = AwellClient::new(&settings.api_url, &settings.api_key, CARE_FLOW_TIMEOUT)?;
    let pathway_id = start_triage(&client, &settings, &patient).await?;
    Ok(json!({ "pathwayId": pathway_id }))
}
