//! Import pipeline: local export tree to target platform.
//!
//! Steps, logged as `Step N/7`:
//!
//! 1. datasets
//! 2. prompts
//! 3. traces, then a gate asking whether the traces are visible
//! 4. evaluations
//! 5. annotation setup guide
//! 6. gate asking whether the annotation configurations exist
//! 7. annotations

use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{PipelineReport, ANNOTATION_SETUP};
use crate::config::StageSelection;
use crate::error::Result;
use crate::importers::{build_setup_guide, Importer};
use crate::layout::ExportLayout;
use crate::manifest::{Direction, ResultManifest, Stage, Status};
use crate::operator::{Confirmer, OperatorUi};

const TOTAL_STEPS: usize = 7;

/// Runs the selected import stages and operator gates in order.
pub struct ImportPipeline<'a, I: Importer + ?Sized, C: Confirmer + ?Sized> {
    importer: &'a I,
    confirmer: &'a C,
    ui: OperatorUi,
    layout: ExportLayout,
    results_dir: PathBuf,
    selection: StageSelection,
    setup_annotations: bool,
    projects: Vec<String>,
}

impl<'a, I: Importer + ?Sized, C: Confirmer + ?Sized> ImportPipeline<'a, I, C> {
    /// Creates an import pipeline.
    pub fn new(
        importer: &'a I,
        confirmer: &'a C,
        layout: ExportLayout,
        results_dir: impl Into<PathBuf>,
        selection: StageSelection,
    ) -> Self {
        Self {
            importer,
            confirmer,
            ui: OperatorUi::new(),
            layout,
            results_dir: results_dir.into(),
            selection,
            setup_annotations: false,
            projects: Vec::new(),
        }
    }

    /// Also runs the setup guide when annotations are not selected.
    #[must_use]
    pub fn with_setup_annotations(mut self, enabled: bool) -> Self {
        self.setup_annotations = enabled;
        self
    }

    /// Restricts project-scoped stages to `projects`.
    #[must_use]
    pub fn with_projects(mut self, projects: Vec<String>) -> Self {
        self.projects = projects;
        self
    }

    /// Runs every selected stage.
    ///
    /// # Errors
    ///
    /// Returns an error only if the results directory cannot be created.
    pub async fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut report = PipelineReport::default();

        std::fs::create_dir_all(&self.results_dir)?;
        info!(
            "Importing {} into {}",
            self.layout.root().display(),
            self.importer.target_type()
        );

        for (step, stage) in [(1, Stage::Datasets), (2, Stage::Prompts), (3, Stage::Traces)] {
            if self.selection.contains(stage) {
                self.run_step(step, stage, &mut report).await;
            }
        }

        if self.selection.contains(Stage::Evaluations) {
            if report.has_succeeded(Stage::Traces.label()) && !self.confirm_traces_ingested() {
                warn!("Evaluation import skipped. Wait for traces to be fully ingested.");
                warn!("Run the import again with --evaluations when ready.");
                report.skip(Stage::Evaluations.label());
            } else {
                self.run_step(4, Stage::Evaluations, &mut report).await;
            }
        }

        if self.selection.contains(Stage::Annotations) {
            info!("Step 5/{}: Setting up annotations...", TOTAL_STEPS);
            if !self.run_setup_guide() {
                report.record(ANNOTATION_SETUP, false);
            }

            info!("Step 6/{}: Confirming annotation configurations...", TOTAL_STEPS);
            if self.confirm_annotation_configs() {
                self.run_step(7, Stage::Annotations, &mut report).await;
            } else {
                warn!("Annotation import skipped. Configure annotations in Arize first.");
                warn!("Run the import again with --annotations when ready.");
                report.skip(Stage::Annotations.label());
            }
        } else if self.setup_annotations {
            info!("Running annotation setup guide...");
            report.record(ANNOTATION_SETUP, self.run_setup_guide());
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        Ok(report)
    }

    async fn run_step(&self, step: usize, stage: Stage, report: &mut PipelineReport) {
        info!("Step {}/{}: Importing {}...", step, TOTAL_STEPS, stage);
        let success = self.run_stage(stage).await;
        report.record(stage.label(), success);
    }

    async fn run_stage(&self, stage: Stage) -> bool {
        let path = ResultManifest::path_in(&self.results_dir, stage, Direction::Import);

        let manifest = match self.importer.import(stage, &self.layout, &self.projects).await {
            Ok(manifest) => {
                if let Err(e) = manifest.save(&path) {
                    error!("Failed to write {}: {}", path.display(), e);
                    return false;
                }
                manifest
            }
            Err(e) => {
                error!("Error importing {}: {}", stage, e);
                if !path.is_file() {
                    return false;
                }
                match ResultManifest::load(&path) {
                    Ok(previous)
                        if previous.stage != stage || previous.direction != Direction::Import =>
                    {
                        error!(
                            "Existing results in {} belong to {} {:?}, not {} import",
                            path.display(),
                            previous.stage,
                            previous.direction,
                            stage
                        );
                        return false;
                    }
                    Ok(previous) => {
                        info!("Loaded existing {} import results from {}", stage, path.display());
                        previous
                    }
                    Err(load_error) => {
                        error!("Failed to load existing results: {}", load_error);
                        return false;
                    }
                }
            }
        };

        evaluate(stage, &manifest)
    }

    fn run_setup_guide(&self) -> bool {
        match build_setup_guide(&self.layout, &self.projects) {
            Ok(guide) => {
                self.ui.print_setup_guide(&guide);
                info!("Annotation setup guide completed ({} configs)", guide.configs.len());
                true
            }
            Err(e) => {
                error!("Annotation setup guide failed: {}", e);
                false
            }
        }
    }

    fn confirm_traces_ingested(&self) -> bool {
        self.ui.print_ingestion_banner();
        self.ask("Are all traces fully visible in the Arize dashboard?")
    }

    fn confirm_annotation_configs(&self) -> bool {
        self.ui.print_annotation_config_banner();
        self.ask("Have you added all annotation configurations in Arize?")
    }

    fn ask(&self, prompt: &str) -> bool {
        self.confirmer.confirm(prompt).unwrap_or_else(|e| {
            warn!("{}; treating as no", e);
            false
        })
    }
}

/// A stage succeeded when any entry was imported, already existed or was
/// skipped.
fn evaluate(stage: Stage, manifest: &ResultManifest) -> bool {
    let existing = manifest.count_with(Status::AlreadyExists);
    if existing > 0 {
        warn!(
            "{} {} entries already existed in Arize and were accepted without comparing their content",
            existing, stage
        );
    }

    let failed = manifest.count_with(Status::Failed);
    if failed > 0 {
        warn!("{} {} entries failed to import", failed, stage);
    }

    let processed = manifest.entries.len();
    let succeeded = processed - failed;
    info!(
        "Processed {} from {}/{} entries ({} items)",
        stage,
        succeeded,
        processed,
        manifest.total_count()
    );

    if manifest.is_success() {
        true
    } else {
        error!("No {} were imported", stage);
        false
    }
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
