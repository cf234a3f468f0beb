use medbot_common::{Bundle, TransactionResponse};
use tracing::{error, info};

use crate::errors::DeployError;
use crate::platform::FhirPlatform;

/// Submit the resolved bundle and require every entry to succeed.
///
/// All failing entries are collected into a single `TransactionPartialFailure`
/// rather than reporting only the first one.
pub async fn execute_transaction(
    platform: &dyn FhirPlatform,
    bundle: &Bundle,
) -> Result<TransactionResponse, DeployError> {
    info!(entries = bundle.entry.len(), "submitting transaction bundle");
    let response = platform.execute_batch(bundle).await?;

    if response.entry.len() != bundle.entry.len() {
        return Err(DeployError::remote(
            "transaction",
            format!(
                "expected {} response entries, got {}",
                bundle.entry.len(),
                response.entry.len()
            ),
        ));
    }

    let failed: Vec<_> = response.entry.iter().filter(|e| !e.is_success()).collect();
    if failed.is_empty() {
        info!(entries = response.entry.len(), "transaction succeeded");
        return Ok(response);
    }

    let details = serde_json::to_string_pretty(&failed)
        .unwrap_or_else(|_| format!("{} failing entries", failed.len()));
    error!(
        failed = failed.len(),
        total = response.entry.len(),
        "transaction entries failed"
    );
    Err(DeployError::TransactionPartialFailure {
        failed: failed.len(),
        total: response.entry.len(),
        details,
    })
}
