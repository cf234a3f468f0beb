//! Typed error hierarchy for medbot.
//!
//! Two top-level enums cover the two subsystems:
//! - `DeployError`: bot deployment pipeline failures
//! - `HandlerError`: bot handler failures

use std::path::PathBuf;
use std::time::Duration;

use medbot_common::ResourceError;
use thiserror::Error;

/// Errors from the deployment pipeline. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Missing {role} artifact for bot '{bot}' at {path}: {source}")]
    MissingArtifact {
        bot: String,
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed: {message}")]
    RemoteCall { operation: String, message: String },

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Unexpected response from {operation}: {source}")]
    UnexpectedResponse {
        operation: String,
        #[source]
        source: ResourceError,
    },

    #[error("Transaction failed for {failed} of {total} entries:\n{details}")]
    TransactionPartialFailure {
        failed: usize,
        total: usize,
        details: String,
    },

    #[error("Bundle integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeployError {
    pub fn remote(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        DeployError::RemoteCall {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn unexpected(operation: impl Into<String>, source: ResourceError) -> Self {
        DeployError::UnexpectedResponse {
            operation: operation.into(),
            source,
        }
    }
}

/// Errors raised by bot handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Unknown bot '{0}'")]
    UnknownBot(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing {0} secret")]
    MissingSecret(String),

    #[error("Resource type {0} is not allowed")]
    ResourceTypeNotAllowed(String),

    #[error("Care-flow API error: {0}")]
    CareFlow(String),

    #[error(transparent)]
    Platform(#[from] DeployError),
}
