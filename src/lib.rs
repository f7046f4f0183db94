//! Declarative data-flow threat models.
//!
//! Build a [`ThreatModel`] in code or load one from TOML, then turn its scenes
//! into boundary-nested Graphviz diagrams, flow tables and an HTML report.

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::{load_model, ModelDocument, ThreatModel};
pub use crate::error::{Result, ThreatflowError};
