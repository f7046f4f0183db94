// src/core/mod.rs
mod engine;
mod loader;
mod validator;

pub mod dfd;
pub mod model;
pub mod report;

pub use model::{
    Classification, DataFlow, EntityId, EntityKind, FlowData, Lifetime, Protocol, Scene,
    ThreatModel, WrapperId,
};
pub use loader::{load_model, ModelDocument};
pub use validator::{ModelValidator, ValidationResult};

// Export the main engine
pub use engine::{Engine, ReportRequest, CONFIG_FILE, STARTER_MODEL_FILE};
