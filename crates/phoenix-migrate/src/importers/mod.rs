//! Target-side importers and the annotation setup guide.

pub mod arize;
pub mod setup_guide;

use async_trait::async_trait;

use crate::error::Result;
use crate::layout::ExportLayout;
use crate::manifest::{ResultManifest, Stage};

pub use arize::ArizeImporter;
pub use setup_guide::{build_setup_guide, SetupGuide};

/// Trait for target platform importers.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Target platform name.
    fn target_type(&self) -> &'static str;

    /// Imports one stage from `layout`.
    ///
    /// Per-entity failures are recorded in the manifest; an `Err` means the
    /// stage could not run at all.
    async fn import(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        projects: &[String],
    ) -> Result<ResultManifest>;
}
