//! Phoenix exporter over the v1 REST API.
//!
//! Lists are cursor-paginated (`data` + `next_cursor`). Each dataset, prompt
//! or project is exported independently: a failure is recorded against that
//! entity and the exporter moves on to the next one.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::client::RetryingClient;
use crate::error::{Error, Result};
use crate::exporters::Exporter;
use crate::layout::{claim_file_stem, sanitize_name, write_json, ExportLayout};
use crate::manifest::{Direction, EntityKind, EntityResult, ResultManifest, Stage, Status};
use crate::spans::{count_traces, is_evaluation, span_ids};

/// Page size for dataset, prompt and project listings.
const PAGE_LIMIT: usize = 100;
/// Page size for span and annotation listings.
const SPAN_PAGE_LIMIT: usize = 1000;
/// Span IDs per annotation query.
const SPAN_ID_CHUNK: usize = 100;

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// A dataset, prompt or project as listed by Phoenix.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExamplesResponse {
    data: ExamplesData,
}

#[derive(Debug, Deserialize)]
struct ExamplesData {
    #[serde(default)]
    version_id: Option<String>,
    #[serde(default)]
    examples: Vec<Value>,
}

/// Exports datasets, prompts, traces, annotations and evaluations from Phoenix.
pub struct PhoenixExporter {
    client: RetryingClient,
}

impl PhoenixExporter {
    /// Creates an exporter over a configured client.
    pub fn new(client: RetryingClient) -> Self {
        Self { client }
    }

    /// Follows `next_cursor` until exhausted.
    async fn paginate<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        limit: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("limit", limit.to_string()));
            if let Some(c) = &cursor {
                page_query.push(("cursor", c.clone()));
            }

            let page: Page<T> = self.client.get_json(segments, &page_query).await?;
            if let Some(pb) = progress {
                pb.inc(page.data.len() as u64);
            }
            items.extend(page.data);

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(items)
    }

    async fn export_datasets(&self, layout: &ExportLayout) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(Stage::Datasets, Direction::Export);
        let datasets: Vec<Entity> = self
            .paginate(&["v1", "datasets"], &[], PAGE_LIMIT, None)
            .await?;
        info!("Found {} datasets", datasets.len());

        let mut used = HashSet::new();
        for dataset in &datasets {
            let stem = claim_file_stem(&mut used, &dataset.name, dataset.id.as_deref());
            let result = match self.export_dataset(dataset, &stem, layout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to export dataset '{}': {}", dataset.name, e);
                    EntityResult::failed(EntityKind::Dataset, e)
                }
            };
            manifest.record(&dataset.name, result);
        }

        Ok(manifest)
    }

    async fn export_dataset(
        &self,
        dataset: &Entity,
        stem: &str,
        layout: &ExportLayout,
    ) -> Result<EntityResult> {
        let id = dataset
            .id
            .as_deref()
            .ok_or_else(|| Error::Export(format!("dataset '{}' has no id", dataset.name)))?;

        let response: ExamplesResponse = self
            .client
            .get_json(&["v1", "datasets", id, "examples"], &[])
            .await?;
        let count = response.data.examples.len() as u64;

        let path = layout.datasets_dir().join(format!("{}.json", stem));
        write_json(
            &path,
            &json!({
                "dataset": dataset,
                "version_id": response.data.version_id,
                "examples": response.data.examples,
            }),
        )?;
        debug!("Exported dataset '{}' ({} examples)", dataset.name, count);

        Ok(EntityResult::new(EntityKind::Dataset, Status::Exported, count)
            .with_detail(path.display().to_string()))
    }

    async fn export_prompts(&self, layout: &ExportLayout) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(Stage::Prompts, Direction::Export);
        let prompts: Vec<Entity> = self
            .paginate(&["v1", "prompts"], &[], PAGE_LIMIT, None)
            .await?;
        info!("Found {} prompts", prompts.len());

        let mut used = HashSet::new();
        for prompt in &prompts {
            let stem = claim_file_stem(&mut used, &prompt.name, prompt.id.as_deref());
            let result = match self.export_prompt(prompt, &stem, layout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to export prompt '{}': {}", prompt.name, e);
                    EntityResult::failed(EntityKind::Prompt, e)
                }
            };
            manifest.record(&prompt.name, result);
        }

        Ok(manifest)
    }

    async fn export_prompt(
        &self,
        prompt: &Entity,
        stem: &str,
        layout: &ExportLayout,
    ) -> Result<EntityResult> {
        let versions: Vec<Value> = self
            .paginate(
                &["v1", "prompts", prompt.name.as_str(), "versions"],
                &[],
                PAGE_LIMIT,
                None,
            )
            .await?;
        let count = versions.len() as u64;

        let path = layout.prompts_dir().join(format!("{}.json", stem));
        write_json(&path, &json!({ "prompt": prompt, "versions": versions }))?;

        Ok(EntityResult::new(EntityKind::Prompt, Status::Exported, count)
            .with_detail(path.display().to_string()))
    }

    /// Lists projects, keeping those in `filter` (all when empty).
    ///
    /// Requested projects that do not exist are recorded as failed.
    async fn resolve_projects(
        &self,
        filter: &[String],
        manifest: &mut ResultManifest,
    ) -> Result<Vec<Entity>> {
        let projects: Vec<Entity> = self
            .paginate(&["v1", "projects"], &[], PAGE_LIMIT, None)
            .await?;

        let kind = manifest.stage.entity_kind();
        for name in filter {
            if !projects.iter().any(|p| &p.name == name) {
                warn!("Project '{}' not found on the Phoenix server", name);
                manifest.record(name, EntityResult::failed(kind, "project not found"));
            }
        }

        // Project directories are named after the project, so two projects
        // whose names sanitize alike cannot both be exported.
        let mut dirs: HashMap<String, String> = HashMap::new();
        let mut selected = Vec::new();
        for project in projects {
            if !filter.is_empty() && !filter.contains(&project.name) {
                continue;
            }
            let dir = sanitize_name(&project.name).to_lowercase();
            if let Some(first) = dirs.get(&dir) {
                warn!(
                    "Project '{}' shares its export directory with '{}', skipping it",
                    project.name, first
                );
                manifest.record(
                    &project.name,
                    EntityResult::failed(kind, format!("name collision with project '{}'", first)),
                );
                continue;
            }
            dirs.insert(dir, project.name.clone());
            selected.push(project);
        }

        Ok(selected)
    }

    async fn fetch_spans(&self, project: &str) -> Result<Vec<Value>> {
        let pb = create_spinner(format!("Fetching spans for {}", project));
        let spans = self
            .paginate(
                &["v1", "projects", project, "spans"],
                &[],
                SPAN_PAGE_LIMIT,
                Some(&pb),
            )
            .await;
        pb.finish_and_clear();
        spans
    }

    async fn export_traces(&self, layout: &ExportLayout, filter: &[String]) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(Stage::Traces, Direction::Export);
        let projects = self.resolve_projects(filter, &mut manifest).await?;
        info!("Exporting traces from {} projects", projects.len());

        for project in &projects {
            let result = match self.export_project_traces(project, layout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to export traces for project '{}': {}", project.name, e);
                    EntityResult::failed(EntityKind::Trace, e)
                }
            };
            manifest.record(&project.name, result);
        }

        Ok(manifest)
    }

    async fn export_project_traces(
        &self,
        project: &Entity,
        layout: &ExportLayout,
    ) -> Result<EntityResult> {
        write_json(&layout.project_file(&project.name), project)?;

        let spans = self.fetch_spans(&project.name).await?;
        if spans.is_empty() {
            return Ok(EntityResult::new(EntityKind::Trace, Status::Skipped, 0).with_detail("no spans"));
        }

        let path = layout.spans_file(&project.name);
        write_json(&path, &spans)?;
        let traces = count_traces(&spans);
        debug!(
            "Exported {} spans ({} traces) from '{}'",
            spans.len(),
            traces,
            project.name
        );

        Ok(EntityResult::new(EntityKind::Trace, Status::Exported, traces)
            .with_detail(path.display().to_string()))
    }

    /// Annotations and evaluations share one endpoint, split by annotator kind.
    async fn export_span_annotations(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        filter: &[String],
    ) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(stage, Direction::Export);
        let projects = self.resolve_projects(filter, &mut manifest).await?;

        for project in &projects {
            let result = match self.export_project_annotations(stage, project, layout).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Failed to export {} for project '{}': {}", stage, project.name, e);
                    EntityResult::failed(stage.entity_kind(), e)
                }
            };
            manifest.record(&project.name, result);
        }

        Ok(manifest)
    }

    async fn export_project_annotations(
        &self,
        stage: Stage,
        project: &Entity,
        layout: &ExportLayout,
    ) -> Result<EntityResult> {
        let kind = stage.entity_kind();
        let ids = self.project_span_ids(&project.name, layout).await?;
        if ids.is_empty() {
            return Ok(EntityResult::new(kind, Status::Skipped, 0).with_detail("no spans"));
        }

        let want_evaluations = stage == Stage::Evaluations;
        let mut records = Vec::new();
        for chunk in ids.chunks(SPAN_ID_CHUNK) {
            let query: Vec<(&str, String)> = chunk.iter().map(|id| ("span_ids", id.clone())).collect();
            let annotations: Vec<Value> = self
                .paginate(
                    &["v1", "projects", project.name.as_str(), "span_annotations"],
                    &query,
                    SPAN_PAGE_LIMIT,
                    None,
                )
                .await?;
            records.extend(
                annotations
                    .into_iter()
                    .filter(|a| is_evaluation(a) == want_evaluations),
            );
        }

        if records.is_empty() {
            return Ok(EntityResult::new(kind, Status::Skipped, 0).with_detail(format!("no {}", stage)));
        }

        let path = if want_evaluations {
            layout.evaluations_file(&project.name)
        } else {
            layout.annotations_file(&project.name)
        };
        write_json(&path, &records)?;

        Ok(EntityResult::new(kind, Status::Exported, records.len() as u64)
            .with_detail(path.display().to_string()))
    }

    /// Span IDs from a previous trace export, or fetched from the server.
    async fn project_span_ids(&self, project: &str, layout: &ExportLayout) -> Result<Vec<String>> {
        let spans_file = layout.spans_file(project);
        let spans: Vec<Value> = if spans_file.is_file() {
            debug!("Reading span IDs from {}", spans_file.display());
            crate::layout::read_json(&spans_file)?
        } else {
            self.fetch_spans(project).await?
        };
        Ok(span_ids(&spans))
    }
}

#[async_trait]
impl Exporter for PhoenixExporter {
    fn source_type(&self) -> &'static str {
        "phoenix"
    }

    async fn export(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        projects: &[String],
    ) -> Result<ResultManifest> {
        match stage {
            Stage::Datasets => self.export_datasets(layout).await,
            Stage::Prompts => self.export_prompts(layout).await,
            Stage::Traces => self.export_traces(layout, projects).await,
            Stage::Annotations | Stage::Evaluations => {
                self.export_span_annotations(stage, layout, projects).await
            }
        }
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} fetched)")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb
}

#[cfg(test)]
#[path = "phoenix_tests.rs"]
mod tests;
