use crate::deploy::{DeployProgress, DeployStage};
use crate::errors::DeployError;
use crate::ui::icons::{CHECK, CROSS};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const STAGE_COUNT: u64 = 6;

/// Spinner for a deploy run: one line, rewritten as each stage starts.
///
/// Finished stages are printed above the spinner so the whole run stays
/// visible in the scrollback.
pub struct DeployUI {
    bar: ProgressBar,
}

impl DeployUI {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A UI that draws nothing, for `--log-json` and non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for DeployUI {
    fn default() -> Self {
        Self::new()
    }
}

fn stage_number(stage: DeployStage) -> u64 {
    match stage {
        DeployStage::Validate => 1,
        DeployStage::Build => 2,
        DeployStage::Reconcile => 3,
        DeployStage::Resolve => 4,
        DeployStage::Submit => 5,
        DeployStage::DeployCode => 6,
    }
}

impl DeployProgress for DeployUI {
    fn stage_started(&self, stage: DeployStage) {
        self.bar
            .set_prefix(format!("[{}/{}]", stage_number(stage), STAGE_COUNT));
        self.bar.set_message(format!("{}...", stage));
    }

    fn stage_finished(&self, stage: DeployStage) {
        self.print_line(format!("{}{}", CHECK, stage));
    }

    fn stage_failed(&self, stage: DeployStage, error: &DeployError) {
        self.print_line(format!("{}{}: {}", CROSS, stage, style(error).red()));
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_numbered_in_pipeline_order() {
        let order = [
            DeployStage::Validate,
            DeployStage::Build,
            DeployStage::Reconcile,
            DeployStage::Resolve,
            DeployStage::Submit,
            DeployStage::DeployCode,
        ];
        let numbers: Vec<u64> = order.iter().map(|s| stage_number(*s)).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn hidden_ui_accepts_events() {
        let ui = DeployUI::hidden();
        ui.stage_started(DeployStage::Build);
        ui.stage_finished(DeployStage::Build);
        ui.stage_failed(
            DeployStage::Submit,
            &DeployError::IntegrityViolation("x".to_string()),
        );
        ui.finish();
    }
}
