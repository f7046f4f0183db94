// src/core/report/mod.rs
//! Report assembly
//!
//! Walks the scenes of a model, hands diagrams to a [`DiagramRenderer`] and
//! the collected tables to a [`ReportWriter`]. Both collaborators are traits
//! so tests and embedders can swap out Graphviz and tera.

mod engine;
mod renderer;
mod writer;

pub use engine::{ReportEngine, ReportSummary, AGGREGATE_STEM, FLOWS_JSON};
pub use renderer::{create_renderer, safe_filename, DiagramRenderer, DotSourceRenderer, GraphvizRenderer};
pub use writer::{
    AggregateReport, ReportDocument, ReportWriter, SceneReport, TeraReportWriter, REPORT_FILE,
};
