//! In-memory exporter, importer and confirmer for pipeline tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::exporters::Exporter;
use crate::importers::Importer;
use crate::layout::ExportLayout;
use crate::manifest::{Direction, EntityResult, ResultManifest, Stage, Status};
use crate::operator::Confirmer;

fn manifest_with(stage: Stage, direction: Direction, status: Status) -> ResultManifest {
    let mut manifest = ResultManifest::new(stage, direction);
    manifest.record("default", EntityResult::new(stage.entity_kind(), status, 1));
    manifest
}

/// Records each call; stages listed in `failing` return an error and stages
/// in `empty` return a manifest with no entries.
#[derive(Default)]
pub struct FakeExporter {
    pub calls: Mutex<Vec<Stage>>,
    pub failing: Vec<Stage>,
    pub empty: Vec<Stage>,
}

impl FakeExporter {
    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exporter for FakeExporter {
    fn source_type(&self) -> &'static str {
        "fake"
    }

    async fn export(&self, stage: Stage, _: &ExportLayout, _: &[String]) -> Result<ResultManifest> {
        self.calls.lock().unwrap().push(stage);
        if self.failing.contains(&stage) {
            return Err(Error::Export(format!("{stage} unavailable")));
        }
        if self.empty.contains(&stage) {
            return Ok(ResultManifest::new(stage, Direction::Export));
        }
        Ok(manifest_with(stage, Direction::Export, Status::Exported))
    }
}

/// Importer counterpart of [`FakeExporter`]; `existing` stages answer with
/// `already_exists` entries.
#[derive(Default)]
pub struct FakeImporter {
    pub calls: Mutex<Vec<Stage>>,
    pub failing: Vec<Stage>,
    pub existing: Vec<Stage>,
}

impl FakeImporter {
    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Importer for FakeImporter {
    fn target_type(&self) -> &'static str {
        "fake"
    }

    async fn import(&self, stage: Stage, _: &ExportLayout, _: &[String]) -> Result<ResultManifest> {
        self.calls.lock().unwrap().push(stage);
        if self.failing.contains(&stage) {
            return Err(Error::Import(format!("{stage} rejected")));
        }
        let status = if self.existing.contains(&stage) {
            Status::AlreadyExists
        } else {
            Status::Imported
        };
        Ok(manifest_with(stage, Direction::Import, status))
    }
}

/// Answers prompts from a script; an exhausted script fails like a missing
/// terminal.
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Prompt("not a terminal".to_string()))
    }
}
