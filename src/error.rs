//! Error types for the builder core.
//!
//! Generated-source diagnostics live in `validate.rs` as `CompilerError`;
//! everything that crosses a host boundary as a failure is defined here.

use thiserror::Error;

use crate::document::InstanceId;

pub use config_crate::ConfigError;

/// Errors raised while loading the catalog table.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog table is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog lists type `{type_id}` more than once")]
    DuplicateType { type_id: String },

    #[error("catalog entry `{id}` is invalid: {reason}")]
    InvalidEntry { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised at the generative-service response boundary.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is neither a batch object nor a component list: {0}")]
    Unrecognized(#[source] serde_json::Error),
}

/// Precondition violations against the document model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    #[error("type `{0}` is neither in the catalog nor registered as generated")]
    UnresolvedType(String),

    #[error("`{0}` is not an instance id")]
    InvalidInstanceId(String),
}

/// A property value that has no source-expression form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("property `{path}` is null, which has no source form")]
    NullValue { path: String },

    #[error("property key `{key}` is not a valid attribute name")]
    InvalidAttributeName { key: String },
}

impl SerializationError {
    /// Key path of the offending value, or the offending key itself.
    pub fn key_path(&self) -> &str {
        match self {
            Self::NullValue { path } => path,
            Self::InvalidAttributeName { key } => key,
        }
    }
}

/// Emitted source text that does not read back as a property value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueParseError {
    #[error("not a source expression: {0}")]
    Syntax(String),

    #[error("`{0}` is outside the property value domain")]
    Unsupported(String),
}

/// Errors that abort a project export.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("instance {instance} of `{type_id}` cannot be exported: {source}")]
    Serialization {
        instance: InstanceId,
        type_id: String,
        #[source]
        source: SerializationError,
    },

    #[error("failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Errors raised while instantiating a compiled unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    #[error("no compiled unit is registered for `{0}`")]
    NotCompiled(String),

    #[error("rendering `{type_id}` exceeded the step budget of {budget}")]
    StepBudgetExceeded { type_id: String, budget: usize },

    #[error("rendering `{type_id}` exceeded the call depth limit of {limit}")]
    DepthExceeded { type_id: String, limit: usize },
}
