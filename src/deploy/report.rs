//! JSON record of a deploy run, written whether the run succeeded or not.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::code::DeployedCode;
use super::context::DeployContext;
use crate::errors::DeployError;
use crate::registry::BotDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRecord {
    pub name: String,
    pub id: Option<String>,
    pub created: bool,
    pub membership_updated: bool,
    pub is_admin: bool,
    pub code_sha256: Option<String>,
    pub deployed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub base_url: String,
    pub project_id: Option<String>,
    pub bots: Vec<BotRecord>,
    pub outcome: Option<RunOutcome>,
}

impl DeployReport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            base_url: base_url.into(),
            project_id: None,
            bots: Vec::new(),
            outcome: None,
        }
    }

    /// Close the report from whatever the run got through.
    ///
    /// Bots that never reached reconciliation keep an empty record.
    pub fn finish(
        &mut self,
        descriptors: &[BotDescriptor],
        ctx: Option<&DeployContext>,
        deployed: &[DeployedCode],
        result: Result<(), &DeployError>,
    ) {
        self.ended_at = Some(Utc::now());
        self.project_id = ctx.map(|c| c.project_id.clone());
        self.bots = descriptors
            .iter()
            .map(|d| {
                let identity = ctx.and_then(|c| c.identity(&d.name));
                let code = deployed.iter().find(|c| c.bot == d.name);
                BotRecord {
                    name: d.name.clone(),
                    id: identity.map(|i| i.id.clone()),
                    created: identity.is_some_and(|i| i.created),
                    membership_updated: identity.is_some_and(|i| i.membership_updated),
                    is_admin: identity.is_some_and(|i| i.is_admin),
                    code_sha256: code.map(|c| c.sha256.clone()),
                    deployed: code.is_some(),
                }
            })
            .collect();
        self.outcome = Some(match result {
            Ok(()) => RunOutcome::Succeeded,
            Err(e) => RunOutcome::Failed {
                error: e.to_string(),
            },
        });
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(RunOutcome::Succeeded))
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &self.run_id.to_string()[..8]
        )
    }
}

/// Writes reports under one directory.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn write(&self, report: &DeployReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;
        let path = self.dir.join(report.file_name());
        let json = serde_json::to_string_pretty(report).context("Failed to serialize deploy report")?;
        fs::write(&path, json).context("Failed to write deploy report")?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::context::RemoteBotIdentity;
    use tempfile::tempdir;

    fn ctx() -> DeployContext {
        let mut ctx = DeployContext::new("p1");
        ctx.record(
            "a",
            RemoteBotIdentity {
                id: "1".to_string(),
                membership_id: Some("m".to_string()),
                is_admin: true,
                created: true,
                membership_updated: true,
            },
        );
        ctx
    }

    #[test]
    fn finish_records_each_descriptor() {
        let descriptors = vec![BotDescriptor::new("a"), BotDescriptor::new("b")];
        let deployed = vec![DeployedCode {
            bot: "a".to_string(),
            bot_id: "1".to_string(),
            sha256: "abc".to_string(),
            bytes: 3,
        }];
        let mut report = DeployReport::new("https://api.medplum.com/");
        let ctx = ctx();
        report.finish(&descriptors, Some(&ctx), &deployed, Ok(()));

        assert!(report.succeeded());
        assert_eq!(report.project_id.as_deref(), Some("p1"));
        assert_eq!(report.bots.len(), 2);
        assert!(report.bots[0].deployed);
        assert!(report.bots[0].created);
        assert_eq!(report.bots[0].code_sha256.as_deref(), Some("abc"));
        assert_eq!(report.bots[1].id, None);
        assert!(!report.bots[1].deployed);
    }

    #[test]
    fn failure_keeps_error_message() {
        let mut report = DeployReport::new("x");
        let err = DeployError::IntegrityViolation("boom".to_string());
        report.finish(&[BotDescriptor::new("a")], None, &[], Err(&err));

        assert!(!report.succeeded());
        match &report.outcome {
            Some(RunOutcome::Failed { error }) => assert!(error.contains("boom")),
            other => panic!("Expected Failed outcome, got {other:?}"),
        }
        assert!(report.ended_at.is_some());
    }

    #[test]
    fn write_creates_directory_and_round_trips() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(&dir.path().join("deploys"));

        let mut report = DeployReport::new("x");
        report.finish(&[], None, &[], Ok(()));
        let path = writer.write(&report).unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().ends_with(".json"));
        assert_eq!(path.parent().unwrap(), dir.path().join("deploys"));
        let loaded: DeployReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.outcome, Some(RunOutcome::Succeeded));
    }
}
