//! Deploy every registered bot: `medbot deploy`.

use anyhow::Result;
use console::style;
use tracing::{error, info, warn};

use medbot::config::MedbotConfig;
use medbot::deploy::{DeployReport, DeployRun, Deployer, ReportWriter};
use medbot::errors::DeployError;
use medbot::registry::{self, BotDescriptor};
use medbot::ui::DeployUI;
use medbot::ui::icons::{CHECK, CROSS, FILE, ROBOT, ROCKET};

pub async fn cmd_deploy(config: &MedbotConfig, no_report: bool, quiet_ui: bool) -> Result<()> {
    let descriptors = registry::bots();
    let store = super::artifact_store(config);
    let base_url = config.base_url();
    let mut report = DeployReport::new(&base_url);

    println!();
    println!(
        "{}Deploying {} bots to {}",
        ROCKET,
        style(descriptors.len()).cyan(),
        style(&base_url).bold()
    );
    println!();

    let result = match super::connect(config).await {
        Ok((client, session)) => {
            let ui = if quiet_ui {
                DeployUI::hidden()
            } else {
                DeployUI::new()
            };
            let run = Deployer::new(&client, &store)
                .with_progress(&ui)
                .run(&session.project_id, &descriptors)
                .await;
            ui.finish();
            report.finish(
                &descriptors,
                Some(&run.ctx),
                &run.deployed,
                run.result.as_ref().map(|_| ()),
            );
            print_summary(&descriptors, &run);
            run.result
        }
        Err(e) => {
            error!(error = %e, "could not connect to platform");
            report.finish(&descriptors, None, &[], Err(&e));
            Err(e)
        }
    };

    if config.toml.report.enabled && !no_report {
        match ReportWriter::new(&config.report_dir()).write(&report) {
            Ok(path) => {
                info!(path = %path.display(), "wrote deploy report");
                println!("{}Report: {}", FILE, style(path.display()).dim());
            }
            // A report failure never masks the deploy outcome.
            Err(e) => warn!(error = %e, "failed to write deploy report"),
        }
    }

    finish(result)
}

fn finish(result: Result<(), DeployError>) -> Result<()> {
    match result {
        Ok(()) => {
            println!();
            println!("{}{}", CHECK, style("All bots deployed").green().bold());
            Ok(())
        }
        Err(e) => {
            println!();
            println!("{}{}", CROSS, style("Deploy failed").red().bold());
            Err(e.into())
        }
    }
}

fn print_summary(descriptors: &[BotDescriptor], run: &DeployRun) {
    println!();
    for descriptor in descriptors {
        let name = &descriptor.name;
        let Some(identity) = run.ctx.identity(name) else {
            println!("  {}{} {}", ROBOT, style(name).dim(), style("(not reached)").dim());
            continue;
        };
        let mut notes = Vec::new();
        if identity.created {
            notes.push("created");
        }
        if identity.membership_updated {
            notes.push("membership updated");
        }
        if run.deployed.iter().any(|d| &d.bot == name) {
            notes.push("code deployed");
        }
        println!(
            "  {}{} {} {}",
            ROBOT,
            style(name).yellow(),
            style(format!("Bot/{}", identity.id)).cyan(),
            style(notes.join(", ")).dim()
        );
    }
}
