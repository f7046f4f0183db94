// src/core/dfd/mod.rs
//! Data-flow diagram assembly
//!
//! Converts scenes into boundary-nested graphs and flow tables. The output is
//! plain DOT text; turning it into images is left to a renderer.

mod assembler;
mod flow_table;
mod graph;

pub use assembler::DfdAssembler;
pub use flow_table::{flow_record_dot, flow_table, FlowRow};
pub use graph::{quote_id, record_dot, DfdCluster, DfdEdge, DfdGraph, EdgeDirection, GraphMode};
