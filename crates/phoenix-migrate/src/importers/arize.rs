//! Arize importer: replays an export tree against the Arize REST API.
//!
//! Every body carries the `space_id`. A 409 response means the record is
//! already present and is reported as `already_exists`; the record itself is
//! not compared with the exported content.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::client::RetryingClient;
use crate::error::{Error, Result};
use crate::importers::Importer;
use crate::layout::{json_files, read_json, ExportLayout};
use crate::manifest::{Direction, EntityKind, EntityResult, ResultManifest, Stage, Status};
use crate::spans::count_traces;

/// Maximum records per request for project-scoped stages.
pub const BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct ExportedDataset {
    dataset: Value,
    #[serde(default)]
    examples: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ExportedPrompt {
    prompt: Value,
    #[serde(default)]
    versions: Vec<Value>,
}

/// Imports an export tree into an Arize space.
pub struct ArizeImporter {
    client: RetryingClient,
    space_id: String,
}

impl ArizeImporter {
    /// Creates an importer for `space_id` over a configured client.
    pub fn new(client: RetryingClient, space_id: impl Into<String>) -> Self {
        Self {
            client,
            space_id: space_id.into(),
        }
    }

    /// POSTs `body`; a conflict means the record already exists.
    async fn create(&self, segments: &[&str], body: &Value) -> Result<Status> {
        match self.client.post_json::<_, Value>(segments, body).await {
            Ok(_) => Ok(Status::Imported),
            Err(e) if e.is_conflict() => Ok(Status::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    async fn import_datasets(&self, layout: &ExportLayout) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(Stage::Datasets, Direction::Import);

        for path in json_files(&layout.datasets_dir())? {
            let (name, result) = match read_json::<ExportedDataset>(&path) {
                Ok(exported) => {
                    let name = entity_name(&exported.dataset, &path);
                    let result = self
                        .import_dataset(&name, &exported)
                        .await
                        .unwrap_or_else(|e| {
                            warn!("Failed to import dataset '{}': {}", name, e);
                            EntityResult::failed(EntityKind::Dataset, e)
                        });
                    (name, result)
                }
                Err(e) => {
                    warn!("Unreadable dataset export {}: {}", path.display(), e);
                    (file_stem(&path), EntityResult::failed(EntityKind::Dataset, e))
                }
            };
            manifest.record(name, result);
        }

        Ok(manifest)
    }

    async fn import_dataset(&self, name: &str, exported: &ExportedDataset) -> Result<EntityResult> {
        if exported.examples.is_empty() {
            return Ok(EntityResult::new(EntityKind::Dataset, Status::Skipped, 0).with_detail("no examples"));
        }

        let body = json!({
            "space_id": self.space_id,
            "name": name,
            "description": exported.dataset.get("description").cloned().unwrap_or(Value::Null),
            "examples": exported.examples,
        });
        let status = self.create(&["v2", "datasets"], &body).await?;
        debug!("Dataset '{}': {:?}", name, status);

        Ok(EntityResult::new(
            EntityKind::Dataset,
            status,
            moved(status, exported.examples.len() as u64),
        ))
    }

    async fn import_prompts(&self, layout: &ExportLayout) -> Result<ResultManifest> {
        let mut manifest = ResultManifest::new(Stage::Prompts, Direction::Import);

        for path in json_files(&layout.prompts_dir())? {
            let (name, result) = match read_json::<ExportedPrompt>(&path) {
                Ok(exported) => {
                    let name = entity_name(&exported.prompt, &path);
                    let result = self
                        .import_prompt(&name, &exported)
                        .await
                        .unwrap_or_else(|e| {
                            warn!("Failed to import prompt '{}': {}", name, e);
                            EntityResult::failed(EntityKind::Prompt, e)
                        });
                    (name, result)
                }
                Err(e) => {
                    warn!("Unreadable prompt export {}: {}", path.display(), e);
                    (file_stem(&path), EntityResult::failed(EntityKind::Prompt, e))
                }
            };
            manifest.record(name, result);
        }

        Ok(manifest)
    }

    async fn import_prompt(&self, name: &str, exported: &ExportedPrompt) -> Result<EntityResult> {
        if exported.versions.is_empty() {
            return Ok(EntityResult::new(EntityKind::Prompt, Status::Skipped, 0).with_detail("no versions"));
        }

        let body = json!({
            "space_id": self.space_id,
            "name": name,
            "description": exported.prompt.get("description").cloned().unwrap_or(Value::Null),
            "versions": exported.versions,
        });
        let status = self.create(&["v2", "prompts"], &body).await?;

        Ok(EntityResult::new(
            EntityKind::Prompt,
            status,
            moved(status, exported.versions.len() as u64),
        ))
    }

    /// Traces, annotations and evaluations: one file per exported project.
    async fn import_project_records(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        filter: &[String],
    ) -> Result<ResultManifest> {
        let (resource, file_of): (&str, fn(&ExportLayout, &str) -> PathBuf) = match stage {
            Stage::Traces => ("spans", ExportLayout::spans_file),
            Stage::Annotations => ("annotations", ExportLayout::annotations_file),
            Stage::Evaluations => ("evaluations", ExportLayout::evaluations_file),
            Stage::Datasets | Stage::Prompts => {
                return Err(Error::Import(format!("{} are not project-scoped", stage)));
            }
        };
        let kind = stage.entity_kind();
        let mut manifest = ResultManifest::new(stage, Direction::Import);

        let projects = layout.exported_projects(filter)?;
        for name in filter {
            if !projects.contains(name) {
                warn!("Project '{}' not found in the export directory", name);
                manifest.record(name, EntityResult::failed(kind, "project not found in export"));
            }
        }
        info!("Importing {} from {} projects", stage, projects.len());

        for project in projects {
            let file = file_of(layout, &project);
            let result = if file.is_file() {
                self.import_project_file(stage, &project, resource, &file)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("Failed to import {} for project '{}': {}", stage, project, e);
                        EntityResult::failed(kind, e)
                    })
            } else {
                EntityResult::new(kind, Status::Skipped, 0).with_detail(format!("no exported {}", stage))
            };
            manifest.record(project, result);
        }

        Ok(manifest)
    }

    async fn import_project_file(
        &self,
        stage: Stage,
        project: &str,
        resource: &str,
        file: &Path,
    ) -> Result<EntityResult> {
        let kind = stage.entity_kind();
        let records: Vec<Value> = read_json(file)?;
        if records.is_empty() {
            return Ok(EntityResult::new(kind, Status::Skipped, 0).with_detail(format!("no {}", stage)));
        }

        let status = self.post_batches(project, resource, &records).await?;
        let count = match stage {
            Stage::Traces => count_traces(&records),
            _ => records.len() as u64,
        };

        Ok(EntityResult::new(kind, status, moved(status, count)))
    }

    /// POSTs `records` in batches; every batch must be accepted.
    ///
    /// A failing batch aborts the project. The error names how many records
    /// earlier batches already delivered.
    async fn post_batches(&self, project: &str, resource: &str, records: &[Value]) -> Result<Status> {
        let total = records.len().div_ceil(BATCH_SIZE);
        let mut imported = false;
        let mut delivered = 0;

        for (index, batch) in records.chunks(BATCH_SIZE).enumerate() {
            let mut body = Map::new();
            body.insert("space_id".to_string(), Value::String(self.space_id.clone()));
            body.insert(resource.to_string(), Value::Array(batch.to_vec()));

            match self
                .create(&["v2", "projects", project, resource], &Value::Object(body))
                .await
            {
                Ok(Status::Imported) => imported = true,
                Ok(_) => debug!(
                    "{} batch {}/{} for '{}' already exists",
                    resource,
                    index + 1,
                    total,
                    project
                ),
                Err(e) => {
                    return Err(Error::Import(format!(
                        "{} batch {}/{} for project '{}': {} ({} of {} records already imported)",
                        resource,
                        index + 1,
                        total,
                        project,
                        e,
                        delivered,
                        records.len()
                    )));
                }
            }
            delivered += batch.len();
        }

        Ok(if imported {
            Status::Imported
        } else {
            Status::AlreadyExists
        })
    }
}

#[async_trait]
impl Importer for ArizeImporter {
    fn target_type(&self) -> &'static str {
        "arize"
    }

    async fn import(
        &self,
        stage: Stage,
        layout: &ExportLayout,
        projects: &[String],
    ) -> Result<ResultManifest> {
        match stage {
            Stage::Datasets => self.import_datasets(layout).await,
            Stage::Prompts => self.import_prompts(layout).await,
            Stage::Traces | Stage::Annotations | Stage::Evaluations => {
                self.import_project_records(stage, layout, projects).await
            }
        }
    }
}

/// Items moved for a status: nothing moves for an existing record.
fn moved(status: Status, count: u64) -> u64 {
    if status == Status::Imported {
        count
    } else {
        0
    }
}

fn entity_name(entity: &Value, path: &Path) -> String {
    entity
        .get("name")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| file_stem(path))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "arize_tests.rs"]
mod tests;
