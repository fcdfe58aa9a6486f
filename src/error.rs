//! Error types for plan synthesis and execution

use thiserror::Error;

use crate::dependency::DependencyKey;
use crate::schema::SchemaId;

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors that abort a validation call or an engine operation.
///
/// Rule violations are never errors; they are messages inside a
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("No plan for schema: {0}")]
    UnknownSchema(SchemaId),

    #[error("Missing dependency: {0}")]
    MissingDependency(DependencyKey),

    #[error("Dependency {key} is not a {expected}")]
    ServiceType { key: DependencyKey, expected: &'static str },

    #[error("Validator '{validator}' failed: {reason}")]
    Evaluator { validator: String, reason: String },

    #[error("Hook failed in {schema}: {reason}")]
    Hook { schema: SchemaId, reason: String },

    #[error("Hook in {schema} returned {actual} but is declared as {declared}")]
    HookShapeMismatch {
        schema: SchemaId,
        declared: &'static str,
        actual: &'static str,
    },

    #[error("Plan for {0} is suspending and cannot complete synchronously")]
    WouldSuspend(SchemaId),

    #[error("Validation depth {depth} exceeded while entering {schema}")]
    DepthExceeded { schema: SchemaId, depth: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl ValidationError {
    /// Build an evaluator failure for the named validator
    pub fn evaluator(validator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Evaluator {
            validator: validator.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a hook failure for the named schema
    pub fn hook(schema: impl Into<SchemaId>, reason: impl ToString) -> Self {
        Self::Hook {
            schema: schema.into(),
            reason: reason.to_string(),
        }
    }
}
