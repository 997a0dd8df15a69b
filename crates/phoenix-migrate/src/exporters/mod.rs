//! Source-side exporters.

pub mod phoenix;

use async_trait::async_trait;

use crate::error::Result;
use crate::layout::ExportLayout;
use crate::manifest::{ResultManifest, Stage};

pub use phoenix::PhoenixExporter;

/// Trait for source platform exporters.
///
/// Implement this trait to export from a new source platform. The export
/// pipeline calls [`Exporter::export`] once per selected stage, in order.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Source platform name.
    fn source_type(&self) -> &'static str;

    /// Exports one stage into `layout`.
    ///
    /// # Arguments
    ///
    /// * `stage` - Entity type to export
    /// * `layout` - Export tree to write into
    /// * `projects` - Project filter for project-scoped stages (empty = all)
    ///
    /// # Returns
    ///
    /// The per-entity outcomes. Per-entity failures are recorded in the
    /// manifest; an `Err` means the stage could not run at all.
    async fn export(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        projects: &[String],
    ) -> Result<ResultManifest>;
}
