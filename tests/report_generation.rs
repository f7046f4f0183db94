use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use async_trait::async_trait;
use predicates::prelude::*;

use threatflow::config::{Config, ReportConfig, TemplateConfig};
use threatflow::core::dfd::DfdAssembler;
use threatflow::core::report::{
    DiagramRenderer, ReportEngine, TeraReportWriter, AGGREGATE_STEM, FLOWS_JSON,
    REPORT_FILE,
};
use threatflow::core::{Classification, Protocol, ThreatModel};
use threatflow::ThreatflowError;

/// Remembers every stem it was asked to render
#[derive(Clone, Default)]
struct RecordingRenderer {
    stems: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DiagramRenderer for RecordingRenderer {
    async fn render(&self, _dot: &str, stem: &str, _output_dir: &Path) -> threatflow::Result<String> {
        self.stems.lock().unwrap().push(stem.to_string());
        Ok(format!("{}.png", stem))
    }

    fn renderer_name(&self) -> &str {
        "recording"
    }
}

fn bookstore() -> ThreatModel {
    let mut model = ThreatModel::new();
    let customer = model.actor("Customer").in_boundary("Internet").unwrap().id();
    let nginx = model.process("Nginx").in_boundary("Front End").unwrap().id();
    let db = model.process("User Database").in_boundary("Back End").unwrap().id();
    model.data("Session Cookie").classified(Classification::Secret).unwrap();

    let login_http = model.wrap(Protocol::Http, "GET /Login: credentials").unwrap().id();
    let login = model.wrap(Protocol::Tls, login_http).unwrap().id();
    let cookie_http = model.wrap(Protocol::Http, "Session Cookie").unwrap().id();
    let cookie = model.wrap(Protocol::Tls, cookie_http).unwrap().id();
    let query = model.wrap(Protocol::Sql, "SELECT password").unwrap().id();

    let flows = vec![
        model.flow(customer, nginx, login).unwrap().responding(cookie),
        model.flow(nginx, db, query).unwrap(),
    ];
    model.add_scene("Customer Login", flows).unwrap();

    let browse = model.flow(customer, nginx, "GET /books").unwrap();
    model.add_scene("Browse Catalogue", vec![browse]).unwrap();
    model
}

fn engine_with(renderer: RecordingRenderer, options: ReportConfig) -> ReportEngine {
    ReportEngine::new(
        DfdAssembler::default(),
        Box::new(renderer),
        Box::new(TeraReportWriter::new(&TemplateConfig::default()).unwrap()),
        options,
    )
}

#[tokio::test]
async fn test_report_names_every_image() {
    let output = assert_fs::TempDir::new().unwrap();
    let renderer = RecordingRenderer::default();
    let engine = engine_with(renderer.clone(), ReportConfig::default());

    let mut model = bookstore();
    let summary = engine.generate(&mut model, output.path(), &[]).await.unwrap();

    let stems = renderer.stems.lock().unwrap().clone();
    assert_eq!(
        stems,
        vec![
            "Customer Login-dfd",
            "flow-Customer Login-1",
            "flow-Customer Login-2",
            "flow-Customer Login-3",
            "Browse Catalogue-dfd",
            "flow-Browse Catalogue-1",
            AGGREGATE_STEM,
        ]
    );
    assert_eq!(summary.flow_images, 4);

    let login = &summary.document.scenes[0];
    assert_eq!(login.flows.len(), 3);
    assert_eq!(login.flows[1].pitcher, "Nginx");
    assert_eq!(login.flows[1].catcher, "Customer");
    assert_eq!(login.flows[1].chain_description, "TLS( HTTP( Session Cookie ) )");
    assert_eq!(login.flows[1].classification.as_deref(), Some("SECRET"));
    assert_eq!(login.flows[2].transport_chain, vec!["SQL".to_string()]);

    output.child(REPORT_FILE).assert(predicate::path::exists());
    output
        .child(REPORT_FILE)
        .assert(predicate::str::contains("Customer Login-dfd.png"))
        .assert(predicate::str::contains("AggregatedDfd-dfd.png"))
        .assert(predicate::str::contains("flow-Browse Catalogue-1.png"));
    output
        .child(FLOWS_JSON)
        .assert(predicate::str::contains("\"chain_description\""));
}

#[tokio::test]
async fn test_selected_scenes_and_disabled_flow_images() {
    let output = assert_fs::TempDir::new().unwrap();
    let renderer = RecordingRenderer::default();
    let options = ReportConfig {
        flow_images: false,
        export_json: false,
        ..ReportConfig::default()
    };
    let engine = engine_with(renderer.clone(), options);

    let mut model = bookstore();
    let summary = engine
        .generate(&mut model, output.path(), &["Browse Catalogue".to_string()])
        .await
        .unwrap();

    let stems = renderer.stems.lock().unwrap().clone();
    assert_eq!(stems, vec!["Browse Catalogue-dfd", AGGREGATE_STEM]);
    assert_eq!(summary.flow_images, 0);
    assert!(summary.document.scenes[0].flows[0].image.is_none());

    output.child(FLOWS_JSON).assert(predicate::path::missing());
    output
        .child(REPORT_FILE)
        .assert(predicate::str::contains("Customer Login").not());
}

#[tokio::test]
async fn test_unknown_scene_aborts_before_rendering() {
    let output = assert_fs::TempDir::new().unwrap();
    let renderer = RecordingRenderer::default();
    let engine = engine_with(renderer.clone(), ReportConfig::default());

    let mut model = bookstore();
    let err = engine
        .generate(&mut model, output.path(), &["Checkout".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, ThreatflowError::UnknownScene(_)));
    assert!(renderer.stems.lock().unwrap().is_empty());
    output.child(REPORT_FILE).assert(predicate::path::missing());
}

#[tokio::test]
async fn test_repeated_generation_expands_responses_once() {
    let output = assert_fs::TempDir::new().unwrap();
    let engine = engine_with(RecordingRenderer::default(), ReportConfig::default());

    let mut model = bookstore();
    engine.generate(&mut model, output.path(), &[]).await.unwrap();
    let summary = engine.generate(&mut model, output.path(), &[]).await.unwrap();

    assert_eq!(summary.document.scenes[0].flows.len(), 3);
}

#[tokio::test]
async fn test_dot_source_renderer_writes_diagram_sources() {
    let output = assert_fs::TempDir::new().unwrap();
    let mut config = Config::default();
    config.render.format = "dot".to_string();
    config.report.flow_images = false;

    let engine = ReportEngine::from_config(&config).unwrap();
    let mut model = bookstore();
    engine.generate(&mut model, output.path(), &[]).await.unwrap();

    output
        .child("Customer Login-dfd.dot")
        .assert(predicate::str::starts_with("digraph \"Customer Login\" {"))
        .assert(predicate::str::contains("subgraph \"cluster_Front End\""));
    output
        .child(format!("{}.dot", AGGREGATE_STEM))
        .assert(predicate::str::contains("[dir=both]"));
    output.child(REPORT_FILE).assert(predicate::path::exists());
}

#[tokio::test]
async fn test_scene_titles_sharing_a_file_name_are_rejected() {
    let output = assert_fs::TempDir::new().unwrap();
    let renderer = RecordingRenderer::default();
    let engine = engine_with(renderer.clone(), ReportConfig::default());

    let mut model = ThreatModel::new();
    let a = model.process("A").id();
    let b = model.process("B").id();
    let first = model.flow(a, b, "first").unwrap();
    let second = model.flow(b, a, "second").unwrap();
    model.add_scene("Login?", vec![first]).unwrap();
    model.add_scene("Login!", vec![second]).unwrap();

    let err = engine.generate(&mut model, output.path(), &[]).await.unwrap_err();

    match err {
        ThreatflowError::DuplicateScene(msg) => assert!(msg.contains("'Login'")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(renderer.stems.lock().unwrap().is_empty());
    output.child(REPORT_FILE).assert(predicate::path::missing());
}
