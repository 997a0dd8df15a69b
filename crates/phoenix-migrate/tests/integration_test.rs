//! End-to-end tests: export from a mocked Phoenix, import into a mocked Arize.

#![allow(clippy::pedantic)]

use phoenix_migrate::operator::AutoConfirm;
use phoenix_migrate::{
    ArizeImporter, ClientOptions, Direction, ExportLayout, ExportPipeline, ImportPipeline,
    PhoenixExporter, ResultManifest, RetryConfig, RetryingClient, Stage, StageSelection, Status,
};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, headers: &[(&str, &str)]) -> RetryingClient {
    let mut options = ClientOptions::json(server.uri(), Duration::from_secs(5), RetryConfig::no_retry());
    for (name, value) in headers {
        options = options.with_header(*name, *value);
    }
    RetryingClient::new(options).unwrap()
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mock_phoenix() -> MockServer {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/v1/datasets",
        json!({"data": [{"id": "d1", "name": "golden"}], "next_cursor": null}),
    )
    .await;
    mount_get(
        &server,
        "/v1/datasets/d1/examples",
        json!({"data": {"dataset_id": "d1", "version_id": "v1", "examples": [{"id": "e1"}]}}),
    )
    .await;
    mount_get(
        &server,
        "/v1/prompts",
        json!({"data": [{"id": "p1", "name": "summarize"}], "next_cursor": null}),
    )
    .await;
    mount_get(
        &server,
        "/v1/prompts/summarize/versions",
        json!({"data": [{"id": "pv1"}], "next_cursor": null}),
    )
    .await;
    mount_get(
        &server,
        "/v1/projects",
        json!({"data": [{"id": "pr1", "name": "chatbot"}], "next_cursor": null}),
    )
    .await;
    mount_get(
        &server,
        "/v1/projects/chatbot/spans",
        json!({"data": [
            {"name": "root", "context": {"trace_id": "t1", "span_id": "s1"}},
            {"name": "llm", "context": {"trace_id": "t1", "span_id": "s2"}}
        ], "next_cursor": null}),
    )
    .await;
    mount_get(
        &server,
        "/v1/projects/chatbot/span_annotations",
        json!({"data": [
            {"span_id": "s1", "name": "correctness", "annotator_kind": "HUMAN", "result": {"label": "correct"}},
            {"span_id": "s2", "name": "hallucination", "annotator_kind": "LLM", "result": {"score": 0.0}}
        ], "next_cursor": null}),
    )
    .await;
    server
}

async fn mock_arize() -> MockServer {
    let server = MockServer::start().await;
    for route in [
        "/v2/datasets",
        "/v2/prompts",
        "/v2/projects/chatbot/spans",
        "/v2/projects/chatbot/evaluations",
    ] {
        Mock::given(method("POST"))
            .and(path(route))
            .and(header("space_id", "space-1"))
            .and(body_partial_json(json!({"space_id": "space-1"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
    }
    // Annotations were imported by an earlier run.
    Mock::given(method("POST"))
        .and(path("/v2/projects/chatbot/annotations"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_export_then_import_all() {
    // Arrange
    let phoenix = mock_phoenix().await;
    let arize = mock_arize().await;
    let dir = TempDir::new().unwrap();
    let layout = ExportLayout::new(dir.path().join("phoenix_export"));
    let results = dir.path().join("results");

    // Act: export
    let exporter = PhoenixExporter::new(client(&phoenix, &[]));
    let export_report = ExportPipeline::new(&exporter, layout.clone(), &results, StageSelection::all())
        .run()
        .await
        .unwrap();

    // Act: import
    let importer = ArizeImporter::new(client(&arize, &[("space_id", "space-1")]), "space-1");
    let import_report = ImportPipeline::new(
        &importer,
        &AutoConfirm(true),
        layout.clone(),
        &results,
        StageSelection::all(),
    )
    .run()
    .await
    .unwrap();

    // Assert
    assert!(export_report.is_success(), "{export_report:?}");
    assert!(import_report.is_success(), "{import_report:?}");
    assert_eq!(import_report.succeeded.len(), 5);

    let traces = ResultManifest::load(&ResultManifest::path_in(&results, Stage::Traces, Direction::Import)).unwrap();
    assert_eq!(traces.entries["chatbot"].status, Status::Imported);
    assert_eq!(traces.entries["chatbot"].count, 1);

    let annotations =
        ResultManifest::load(&ResultManifest::path_in(&results, Stage::Annotations, Direction::Import)).unwrap();
    assert_eq!(annotations.entries["chatbot"].status, Status::AlreadyExists);

    for stage in Stage::ALL {
        assert!(ResultManifest::path_in(&results, stage, Direction::Export).is_file());
    }
}

#[tokio::test]
async fn test_import_only_evaluations_without_traces_needs_no_gate() {
    let arize = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/projects/chatbot/evaluations"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&arize)
        .await;

    let dir = TempDir::new().unwrap();
    let layout = ExportLayout::new(dir.path());
    std::fs::create_dir_all(layout.evaluations_file("chatbot").parent().unwrap()).unwrap();
    std::fs::write(
        layout.evaluations_file("chatbot"),
        r#"[{"span_id": "s2", "name": "hallucination", "annotator_kind": "LLM"}]"#,
    )
    .unwrap();

    let importer = ArizeImporter::new(client(&arize, &[]), "space-1");
    // A declining confirmer proves no gate is shown.
    let report = ImportPipeline::new(
        &importer,
        &AutoConfirm(false),
        layout,
        dir.path().join("results"),
        StageSelection::only(Stage::Evaluations),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.succeeded, vec!["evaluations".to_string()]);
}
