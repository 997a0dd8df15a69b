//! Stage orchestration for export and import runs.
//!
//! Both pipelines run the selected stages one after another. A failing stage
//! is logged and recorded in the [`PipelineReport`]; later stages still run.

pub mod export;
pub mod import;

#[cfg(test)]
mod fakes;

pub use export::ExportPipeline;
pub use import::ImportPipeline;

use crate::manifest::Stage;

/// Report label of the annotation setup guide.
pub const ANNOTATION_SETUP: &str = "annotation setup";

/// Stage outcomes of one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineReport {
    /// Stages that succeeded, in execution order.
    pub succeeded: Vec<String>,
    /// Stages that failed.
    pub failed: Vec<String>,
    /// Stages skipped at an operator gate.
    pub skipped: Vec<String>,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl PipelineReport {
    /// Records a stage outcome.
    pub fn record(&mut self, label: impl Into<String>, success: bool) {
        if success {
            self.succeeded.push(label.into());
        } else {
            self.failed.push(label.into());
        }
    }

    /// Records a stage the operator chose not to run.
    pub fn skip(&mut self, label: impl Into<String>) {
        self.skipped.push(label.into());
    }

    /// No stage failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether `label` was recorded as failed.
    pub fn has_failed(&self, label: &str) -> bool {
        self.failed.iter().any(|l| l == label)
    }

    /// Whether `label` was recorded as succeeded.
    pub fn has_succeeded(&self, label: &str) -> bool {
        self.succeeded.iter().any(|l| l == label)
    }
}

/// 1-based position of `stage` in the export order.
fn step_number(stage: Stage) -> usize {
    Stage::ALL
        .iter()
        .position(|s| *s == stage)
        .map_or(0, |i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success() {
        let mut report = PipelineReport::default();
        report.record("datasets", true);
        report.skip("evaluations");
        assert!(report.is_success());
        assert!(report.has_succeeded("datasets"));

        report.record("traces", false);
        assert!(!report.is_success());
        assert!(report.has_failed("traces"));
    }

    #[test]
    fn test_step_number() {
        assert_eq!(step_number(Stage::Datasets), 1);
        assert_eq!(step_number(Stage::Evaluations), 5);
    }
}
