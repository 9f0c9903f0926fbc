//! Error types for the schema conversion engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable error codes.
///
/// These codes form a **stable API contract** — once published, variant names
/// and their serialized `snake_case` strings must never change across
/// versions. Downstream HTTP/FFI layers (out of scope for this crate) map
/// these to their own error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// The meta-schema language definition itself is malformed.
    MetaSchemaShapeError,
    /// Registration failed: invalid external schema, cap exceeded, or name collision.
    RegistrationError,
    /// A table identifier (id or name) did not resolve to a registered table.
    UnknownTableError,
    /// An external field declared a type outside the meta-schema's allowed set.
    FieldTypeError,
    /// A required options blob was missing, or an extractor returned something
    /// other than a list of strings.
    OptionsExtractionError,
    /// A registered property-schema builder callable failed.
    BuilderError,
    /// A registered semantic validator callable failed.
    ValidatorError,
    /// A registered reverse formatter callable failed.
    FormatterError,
}

/// The engine's error type. See `ErrorCode` for the stable wire taxonomy.
///
/// Construction, registration, and lookup errors are fatal to the call that
/// raised them. `validate()` never raises these — structural and semantic
/// validation failures are collected into `Vec<String>` and returned, not
/// propagated as `EngineError`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("meta-schema error at {path}: {message}")]
    MetaSchemaShape { path: String, message: String },

    #[error("registration error: {message}")]
    Registration { message: String },

    #[error("unknown table: {identifier}")]
    UnknownTable { identifier: String },

    #[error("field type error at {path}: {message}")]
    FieldType { path: String, message: String },

    #[error("options extraction error at {path}: {message}")]
    OptionsExtraction { path: String, message: String },

    #[error("builder error for target type '{target_type}' at {path}: {message}")]
    Builder {
        path: String,
        target_type: String,
        message: String,
    },

    #[error("validator error for target type '{target_type}' at {path}: {message}")]
    Validator {
        path: String,
        target_type: String,
        message: String,
    },

    #[error("formatter error for type '{original_type}' at {path}: {message}")]
    Formatter {
        path: String,
        original_type: String,
        message: String,
    },
}

impl EngineError {
    /// Returns the stable error code for this error variant.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            EngineError::MetaSchemaShape { .. } => ErrorCode::MetaSchemaShapeError,
            EngineError::Registration { .. } => ErrorCode::RegistrationError,
            EngineError::UnknownTable { .. } => ErrorCode::UnknownTableError,
            EngineError::FieldType { .. } => ErrorCode::FieldTypeError,
            EngineError::OptionsExtraction { .. } => ErrorCode::OptionsExtractionError,
            EngineError::Builder { .. } => ErrorCode::BuilderError,
            EngineError::Validator { .. } => ErrorCode::ValidatorError,
            EngineError::Formatter { .. } => ErrorCode::FormatterError,
        }
    }

    /// Returns the dotted schema/field path context, if available.
    pub fn path(&self) -> Option<&str> {
        match self {
            EngineError::MetaSchemaShape { path, .. } => Some(path),
            EngineError::Registration { .. } => None,
            EngineError::UnknownTable { .. } => None,
            EngineError::FieldType { path, .. } => Some(path),
            EngineError::OptionsExtraction { path, .. } => Some(path),
            EngineError::Builder { path, .. } => Some(path),
            EngineError::Validator { path, .. } => Some(path),
            EngineError::Formatter { path, .. } => Some(path),
        }
    }

    /// Produces a structured JSON error, e.g. for a future HTTP/FFI boundary.
    ///
    /// Format: `{"code": "...", "message": "...", "path": "..." | null}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "path": self.path(),
        })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
