//! Result manifests: the per-stage record of what happened to each entity.
//!
//! Every stage, export or import, produces one [`ResultManifest`] whose
//! entries share the same [`EntityResult`] shape. Manifests use ordered maps
//! so that a manifest read back from disk re-serializes byte for byte.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A pipeline stage, one per entity type, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Datasets and their examples.
    Datasets,
    /// Prompts and their versions.
    Prompts,
    /// Traces (spans) and project metadata.
    Traces,
    /// Human/code span annotations.
    Annotations,
    /// LLM evaluations attached to spans.
    Evaluations,
}

impl Stage {
    /// All stages in export order.
    pub const ALL: [Stage; 5] = [
        Stage::Datasets,
        Stage::Prompts,
        Stage::Traces,
        Stage::Annotations,
        Stage::Evaluations,
    ];

    /// Plural label used in logs and summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::Datasets => "datasets",
            Self::Prompts => "prompts",
            Self::Traces => "traces",
            Self::Annotations => "annotations",
            Self::Evaluations => "evaluations",
        }
    }

    /// Entity kind recorded by this stage.
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Datasets => EntityKind::Dataset,
            Self::Prompts => EntityKind::Prompt,
            Self::Traces => EntityKind::Trace,
            Self::Annotations => EntityKind::Annotation,
            Self::Evaluations => EntityKind::Evaluation,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of entity counted in an [`EntityResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A dataset (count = examples).
    Dataset,
    /// A prompt (count = versions).
    Prompt,
    /// A project's traces (count = distinct traces).
    Trace,
    /// A project's annotations (count = annotations).
    Annotation,
    /// A project's evaluations (count = evaluations).
    Evaluation,
}

impl EntityKind {
    /// Singular name used in result file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Prompt => "prompt",
            Self::Trace => "trace",
            Self::Annotation => "annotation",
            Self::Evaluation => "evaluation",
        }
    }
}

/// Migration direction of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Source platform to local export tree.
    Export,
    /// Local export tree to target platform.
    Import,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Import => "import",
        }
    }
}

/// Outcome of one entity within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Written to the export tree.
    Exported,
    /// Created on the target.
    Imported,
    /// The target already held a record with this name.
    AlreadyExists,
    /// Nothing to do (no data for this entity).
    Skipped,
    /// The entity could not be processed.
    Failed,
}

impl Status {
    /// Whether this status counts towards stage success.
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Uniform result record for every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResult {
    /// What was counted.
    pub entity_kind: EntityKind,
    /// Outcome.
    pub status: Status,
    /// Number of items moved.
    #[serde(default)]
    pub count: u64,
    /// Error message or output location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EntityResult {
    /// A result with no detail.
    pub fn new(entity_kind: EntityKind, status: Status, count: u64) -> Self {
        Self {
            entity_kind,
            status,
            count,
            detail: None,
        }
    }

    /// A failed result carrying the error message.
    pub fn failed(entity_kind: EntityKind, error: impl fmt::Display) -> Self {
        Self {
            entity_kind,
            status: Status::Failed,
            count: 0,
            detail: Some(error.to_string()),
        }
    }

    /// Attaches a detail note.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// All entity outcomes of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultManifest {
    /// Stage that produced the manifest.
    pub stage: Stage,
    /// Export or import.
    pub direction: Direction,
    /// Outcomes keyed by entity name.
    #[serde(default)]
    pub entries: BTreeMap<String, EntityResult>,
}

impl ResultManifest {
    /// An empty manifest.
    pub fn new(stage: Stage, direction: Direction) -> Self {
        Self {
            stage,
            direction,
            entries: BTreeMap::new(),
        }
    }

    /// Records (or replaces) the outcome for `name`.
    pub fn record(&mut self, name: impl Into<String>, result: EntityResult) {
        self.entries.insert(name.into(), result);
    }

    /// Number of entries with `status`.
    pub fn count_with(&self, status: Status) -> usize {
        self.entries.values().filter(|r| r.status == status).count()
    }

    /// Sum of `count` across successful entries.
    pub fn total_count(&self) -> u64 {
        self.entries
            .values()
            .filter(|r| r.status.is_success())
            .map(|r| r.count)
            .sum()
    }

    /// A stage succeeds when at least one entry succeeded.
    pub fn is_success(&self) -> bool {
        self.entries.values().any(|r| r.status.is_success())
    }

    /// Result file name, e.g. `dataset_export_results.json`.
    pub fn file_name(stage: Stage, direction: Direction) -> String {
        format!(
            "{}_{}_results.json",
            stage.entity_kind().as_str(),
            direction.as_str()
        )
    }

    /// Result file path under `results_dir`.
    pub fn path_in(results_dir: &Path, stage: Stage, direction: Direction) -> PathBuf {
        results_dir.join(Self::file_name(stage, direction))
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the manifest to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a manifest from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
