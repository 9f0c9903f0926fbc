//! Converts arbitrary EMR assessment-form schemas into an LLM
//! structured-output JSON Schema, validates filled-in model responses
//! against it, and reverse-maps validated responses back to the external
//! wire format.
//!
//! [`Engine`] is the single entry point: construct one from a meta-schema
//! (the grammar describing one external schema family, e.g. PCC or
//! Airtable), register external table schemas against it, then call
//! [`Engine::validate`] and [`Engine::reverse_map`] as model responses come
//! in. The engine performs no I/O and owns no background tasks; see the
//! crate's design notes for its concurrency model.

pub mod builders;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod formatters;
pub mod meta_schema;
pub mod options;
mod panic_guard;
pub mod paths;
pub mod reverse_map;
pub mod sanitize;
pub mod table_registry;
pub mod types;
pub mod validate;
pub mod validators;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use reverse_map::{MetadataFieldNames, PackShape, ReverseMapOptions};
pub use table_registry::TableIdentifier;
pub use types::{FieldMetadata, RegisteredTable, TargetType};
