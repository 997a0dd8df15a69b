// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # Phoenix to Arize Migration Tool
//!
//! `phoenix-migrate` is a CLI tool and library for moving observability data
//! from a Phoenix server into an Arize space. A migration runs in two steps:
//! `export` writes Phoenix data to a local directory tree, `import` replays
//! that tree against the Arize API.
//!
//! ## Entity Types
//!
//! | Stage | Phoenix source | Count |
//! |-------|----------------|-------|
//! | datasets | `/v1/datasets` | examples |
//! | prompts | `/v1/prompts` | versions |
//! | traces | `/v1/projects/{name}/spans` | distinct traces |
//! | annotations | `/v1/projects/{name}/span_annotations` | annotations |
//! | evaluations | LLM span annotations | evaluations |
//!
//! ## Quick Start
//!
//! ```bash
//! # Export everything from a local Phoenix
//! PHOENIX_ENDPOINT=http://localhost:6006 phoenix-migrate export --all
//!
//! # Import into Arize
//! ARIZE_API_KEY=... ARIZE_SPACE_ID=... phoenix-migrate import --all
//! ```
//!
//! Every stage writes `<results>/<entity>_<export|import>_results.json`.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod exporters;
pub mod importers;
pub mod layout;
pub mod manifest;
pub mod operator;
pub mod pipeline;
pub mod retry;
pub mod spans;

pub use client::{ClientOptions, RetryingClient};
pub use config::{ExportArgs, ExportConfig, ImportArgs, ImportConfig, StageSelection};
pub use error::{Error, Result};
pub use exporters::{Exporter, PhoenixExporter};
pub use importers::{ArizeImporter, Importer};
pub use layout::ExportLayout;
pub use manifest::{Direction, EntityKind, EntityResult, ResultManifest, Stage, Status};
pub use pipeline::{ExportPipeline, ImportPipeline, PipelineReport};
pub use retry::RetryConfig;
