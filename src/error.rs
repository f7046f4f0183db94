use thiserror::Error;

use crate::core::EntityKind;

/// Main error type for threatflow operations
#[derive(Error, Debug)]
pub enum ThreatflowError {
    #[error("Type constraint violated: {0}")]
    TypeConstraint(String),

    #[error("Unable to find {kind} named '{name}'")]
    NotFound { kind: EntityKind, name: String },

    #[error("Cyclic wrapper chain closed by {wrapper}")]
    CyclicWrapper { wrapper: String },

    #[error("Cyclic boundary nesting closed by boundary '{boundary}'")]
    CyclicBoundary { boundary: String },

    #[error("Malformed flow data: {0}")]
    MalformedData(String),

    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("Scene already defined: {0}")]
    DuplicateScene(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model file error: {0}")]
    ModelFile(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Model validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ThreatflowError>;
