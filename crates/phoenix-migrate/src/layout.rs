//! On-disk layout of an export tree.
//!
//! ```text
//! <root>/
//!   datasets/<name>.json
//!   prompts/<name>.json
//!   projects/<name>/project.json
//!   projects/<name>/traces/spans.json
//!   projects/<name>/annotations/span_annotations.json
//!   projects/<name>/evaluations/span_evaluations.json
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File holding a project's metadata.
pub const PROJECT_FILE: &str = "project.json";
/// File holding a project's spans.
pub const SPANS_FILE: &str = "spans.json";
/// File holding a project's human/code annotations.
pub const ANNOTATIONS_FILE: &str = "span_annotations.json";
/// File holding a project's LLM evaluations.
pub const EVALUATIONS_FILE: &str = "span_evaluations.json";

/// Paths inside an export directory.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Export root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `datasets/`
    pub fn datasets_dir(&self) -> PathBuf {
        self.root.join("datasets")
    }

    /// `prompts/`
    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    /// `projects/`
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// `projects/<name>/`
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.projects_dir().join(sanitize_name(project))
    }

    /// `projects/<name>/project.json`
    pub fn project_file(&self, project: &str) -> PathBuf {
        self.project_dir(project).join(PROJECT_FILE)
    }

    /// `projects/<name>/traces/spans.json`
    pub fn spans_file(&self, project: &str) -> PathBuf {
        self.project_dir(project).join("traces").join(SPANS_FILE)
    }

    /// `projects/<name>/annotations/span_annotations.json`
    pub fn annotations_file(&self, project: &str) -> PathBuf {
        self.project_dir(project)
            .join("annotations")
            .join(ANNOTATIONS_FILE)
    }

    /// `projects/<name>/evaluations/span_evaluations.json`
    pub fn evaluations_file(&self, project: &str) -> PathBuf {
        self.project_dir(project)
            .join("evaluations")
            .join(EVALUATIONS_FILE)
    }

    /// Exported projects, sorted by name, optionally filtered.
    ///
    /// The project name comes from `project.json` when present and falls
    /// back to the directory name.
    pub fn exported_projects(&self, filter: &[String]) -> Result<Vec<String>> {
        let dir = self.projects_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let name = std::fs::read_to_string(entry.path().join(PROJECT_FILE))
                .ok()
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(String::from))
                .unwrap_or(dir_name);
            if filter.is_empty() || filter.contains(&name) {
                projects.push(name);
            }
        }
        projects.sort();
        Ok(projects)
    }
}

/// Replaces characters that are unsafe in file names with `_`.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reserves a file stem for `name` that no earlier claim in `used` holds.
///
/// Distinct names can sanitize to the same stem (`qa/golden`, `qa_golden`).
/// A taken stem gets the entity `id` appended, then a counter. Stems are
/// compared case-insensitively.
pub fn claim_file_stem(used: &mut HashSet<String>, name: &str, id: Option<&str>) -> String {
    let base = sanitize_name(name);
    let mut stem = base.clone();
    if used.contains(&stem.to_lowercase()) {
        if let Some(id) = id {
            stem = format!("{}-{}", base, sanitize_name(id));
        }
    }
    let mut counter = 2;
    while used.contains(&stem.to_lowercase()) {
        stem = format!("{}-{}", base, counter);
        counter += 1;
    }
    used.insert(stem.to_lowercase());
    stem
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// Reads JSON from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// JSON files directly inside `dir`, sorted. A missing directory is empty.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
