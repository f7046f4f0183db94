// src/core/dfd/flow_table.rs
use serde::{Deserialize, Serialize};

use crate::config::DiagramConfig;
use crate::core::model::{DataFlow, ThreatModel};
use crate::error::Result;
use super::graph::record_dot;

/// One row of a scene's flow table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRow {
    pub flow_id: usize,
    pub pitcher: String,
    pub catcher: String,
    /// Protocol names, outermost first
    pub transport_chain: Vec<String>,
    pub chain_description: String,
    pub data: String,
    pub classification: Option<String>,
    pub label: String,
    /// Per-flow protocol diagram, filled in once rendered
    pub image: Option<String>,
}

/// Tabulate a scene's flows in order, numbering from 1
pub fn flow_table(model: &ThreatModel, title: &str) -> Result<Vec<FlowRow>> {
    let scene = model.scene(title)?;
    scene
        .flows
        .iter()
        .enumerate()
        .map(|(i, flow)| flow_row(model, i + 1, flow))
        .collect()
}

fn flow_row(model: &ThreatModel, flow_id: usize, flow: &DataFlow) -> Result<FlowRow> {
    let transport_chain = model
        .chain_sequence(flow.payload)?
        .into_iter()
        .map(|id| model.wrapper(id).protocol.name().to_string())
        .collect();
    let payload = model.terminal_payload(flow.payload)?;
    let classification = model
        .registry()
        .get(payload)
        .data_profile()
        .and_then(|p| p.classification)
        .map(|c| c.to_string());

    Ok(FlowRow {
        flow_id,
        pitcher: model.name(flow.pitcher).to_string(),
        catcher: model.name(flow.catcher).to_string(),
        transport_chain,
        chain_description: model.describe(flow.payload)?,
        data: model.name(payload).to_string(),
        classification,
        label: flow.label.clone(),
        image: None,
    })
}

/// Record-style DOT diagram of one flow's protocol layers
pub fn flow_record_dot(model: &ThreatModel, flow: &DataFlow, name: &str, style: &DiagramConfig) -> Result<String> {
    let label = model.record_label(flow.payload)?;
    Ok(record_dot(name, &label, style))
}
