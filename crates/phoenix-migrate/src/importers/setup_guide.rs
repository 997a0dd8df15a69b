//! Annotation setup guide.
//!
//! Arize only accepts annotations whose configuration already exists in the
//! space, so before the annotations stage the operator is shown every
//! distinct annotation name found in the export tree.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::error::Result;
use crate::layout::{read_json, ExportLayout};

/// Example labels kept per annotation.
pub const MAX_EXAMPLE_LABELS: usize = 5;

/// Value type of an annotation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Categorical label only.
    Label,
    /// Numeric score only.
    Score,
    /// Both a label and a score.
    LabelAndScore,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Label => "label",
            Self::Score => "score",
            Self::LabelAndScore => "label + score",
        })
    }
}

/// One annotation configuration to create on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationConfig {
    /// Annotation name.
    pub name: String,
    /// Kind derived from the exported results.
    pub kind: AnnotationKind,
    /// Up to [`MAX_EXAMPLE_LABELS`] distinct labels, sorted.
    pub example_labels: Vec<String>,
    /// Projects the annotation appears in, sorted.
    pub projects: Vec<String>,
}

/// Annotation configurations found in an export tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupGuide {
    /// Configurations sorted by name.
    pub configs: Vec<AnnotationConfig>,
    /// Total annotation records scanned.
    pub annotation_count: usize,
}

impl SetupGuide {
    /// No annotations were exported.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[derive(Default)]
struct Accumulator {
    has_label: bool,
    has_score: bool,
    labels: BTreeSet<String>,
    projects: BTreeSet<String>,
}

/// Scans exported span annotations and builds the guide.
///
/// A project without an annotations file contributes nothing; a file that
/// cannot be read or parsed is an error.
pub fn build_setup_guide(layout: &ExportLayout, projects: &[String]) -> Result<SetupGuide> {
    let mut by_name: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut annotation_count = 0;

    for project in layout.exported_projects(projects)? {
        let file = layout.annotations_file(&project);
        if !file.is_file() {
            debug!("No annotations exported for '{}'", project);
            continue;
        }

        let annotations: Vec<Value> = read_json(&file)?;
        annotation_count += annotations.len();

        for annotation in &annotations {
            let Some(name) = annotation.get("name").and_then(Value::as_str) else {
                continue;
            };
            let acc = by_name.entry(name.to_string()).or_default();
            acc.projects.insert(project.clone());

            let result = annotation.get("result");
            if let Some(label) = result.and_then(|r| r.get("label")).and_then(Value::as_str) {
                acc.has_label = true;
                acc.labels.insert(label.to_string());
            }
            if result
                .and_then(|r| r.get("score"))
                .is_some_and(Value::is_number)
            {
                acc.has_score = true;
            }
        }
    }

    let configs = by_name
        .into_iter()
        .map(|(name, acc)| AnnotationConfig {
            name,
            kind: match (acc.has_label, acc.has_score) {
                (true, true) => AnnotationKind::LabelAndScore,
                (false, true) => AnnotationKind::Score,
                _ => AnnotationKind::Label,
            },
            example_labels: acc.labels.into_iter().take(MAX_EXAMPLE_LABELS).collect(),
            projects: acc.projects.into_iter().collect(),
        })
        .collect();

    Ok(SetupGuide {
        configs,
        annotation_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::write_json;
    use serde_json::json;
    use tempfile::TempDir;

    fn annotation(name: &str, result: Value) -> Value {
        json!({"span_id": "s1", "name": name, "annotator_kind": "HUMAN", "result": result})
    }

    #[test]
    fn test_missing_tree_is_empty_guide() {
        let dir = TempDir::new().unwrap();
        let guide = build_setup_guide(&ExportLayout::new(dir.path()), &[]).unwrap();
        assert!(guide.is_empty());
        assert_eq!(guide.annotation_count, 0);
    }

    #[test]
    fn test_collects_kinds_labels_and_projects() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout::new(dir.path());
        write_json(
            &layout.annotations_file("chatbot"),
            &vec![
                annotation("correctness", json!({"label": "correct"})),
                annotation("correctness", json!({"label": "incorrect"})),
                annotation("quality", json!({"score": 0.8})),
                annotation("tone", json!({"label": "polite", "score": 1})),
            ],
        )
        .unwrap();
        write_json(
            &layout.annotations_file("search"),
            &vec![annotation("correctness", json!({"label": "correct"}))],
        )
        .unwrap();

        let guide = build_setup_guide(&layout, &[]).unwrap();

        assert_eq!(guide.annotation_count, 5);
        let names: Vec<_> = guide.configs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["correctness", "quality", "tone"]);

        let correctness = &guide.configs[0];
        assert_eq!(correctness.kind, AnnotationKind::Label);
        assert_eq!(correctness.example_labels, vec!["correct", "incorrect"]);
        assert_eq!(correctness.projects, vec!["chatbot", "search"]);
        assert_eq!(guide.configs[1].kind, AnnotationKind::Score);
        assert_eq!(guide.configs[2].kind, AnnotationKind::LabelAndScore);
    }

    #[test]
    fn test_example_labels_capped() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout::new(dir.path());
        let annotations: Vec<Value> = (0..8)
            .map(|i| annotation("topic", json!({"label": format!("l{i}")})))
            .collect();
        write_json(&layout.annotations_file("chatbot"), &annotations).unwrap();

        let guide = build_setup_guide(&layout, &[]).unwrap();
        assert_eq!(guide.configs[0].example_labels.len(), MAX_EXAMPLE_LABELS);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout::new(dir.path());
        let file = layout.annotations_file("chatbot");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "[{").unwrap();

        assert!(build_setup_guide(&layout, &[]).is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AnnotationKind::LabelAndScore.to_string(), "label + score");
    }
}
