//! Export pipeline: source platform to local export tree.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{step_number, PipelineReport};
use crate::config::StageSelection;
use crate::error::Result;
use crate::exporters::Exporter;
use crate::layout::ExportLayout;
use crate::manifest::{Direction, ResultManifest, Stage, Status};

/// Runs the selected export stages in order.
pub struct ExportPipeline<'a, E: Exporter + ?Sized> {
    exporter: &'a E,
    layout: ExportLayout,
    results_dir: PathBuf,
    selection: StageSelection,
    projects: Vec<String>,
}

impl<'a, E: Exporter + ?Sized> ExportPipeline<'a, E> {
    /// Creates an export pipeline.
    pub fn new(
        exporter: &'a E,
        layout: ExportLayout,
        results_dir: impl Into<PathBuf>,
        selection: StageSelection,
    ) -> Self {
        Self {
            exporter,
            layout,
            results_dir: results_dir.into(),
            selection,
            projects: Vec::new(),
        }
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
    /// Returns an error only if the export or results directory cannot be
    /// created. Stage failures are reported in the returned report.
    pub async fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut report = PipelineReport::default();

        std::fs::create_dir_all(self.layout.projects_dir())?;
        std::fs::create_dir_all(&self.results_dir)?;

        info!(
            "Exporting from {} into {}",
            self.exporter.source_type(),
            self.layout.root().display()
        );

        for stage in self.selection.stages() {
            info!("Step {}: Exporting {}...", step_number(stage), stage);
            let success = self.run_stage(stage).await;
            report.record(stage.label(), success);
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        Ok(report)
    }

    async fn run_stage(&self, stage: Stage) -> bool {
        let manifest = match self.exporter.export(stage, &self.layout, &self.projects).await {
            Ok(manifest) => manifest,
            Err(e) => {
                error!("Error exporting {}: {}", stage, e);
                return false;
            }
        };

        let path = ResultManifest::path_in(&self.results_dir, stage, Direction::Export);
        if let Err(e) = manifest.save(&path) {
            error!("Failed to write {}: {}", path.display(), e);
            return false;
        }

        let failed = manifest.count_with(Status::Failed);
        if failed > 0 {
            warn!("{} {} failed to export", failed, stage);
        }
        if manifest.is_success() {
            info!(
                "Exported {} {} from {} entries, results saved to {}",
                manifest.total_count(),
                stage,
                manifest.entries.len() - failed,
                path.display()
            );
            true
        } else {
            error!("No {} were exported", stage);
            false
        }
    }
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
