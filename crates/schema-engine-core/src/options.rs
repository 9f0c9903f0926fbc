//! Options-extractor registry — maps a named string to a function that
//! converts a raw external "options" blob into an ordered list of enum
//! strings.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Signature for an options extractor: takes the raw external "options" blob
/// (e.g. PCC's `responseOptions` array of `{responseText, responseValue}`
/// objects) and returns the ordered list of option display strings.
pub type OptionsExtractorFn = dyn Fn(&Value) -> EngineResult<Vec<String>> + Send + Sync;

/// Two-map overlay: instance registrations shadow the process-wide defaults,
/// per the engine's general registry design.
#[derive(Clone, Default)]
pub struct OptionsExtractorRegistry {
    default: HashMap<String, Arc<OptionsExtractorFn>>,
    instance: HashMap<String, Arc<OptionsExtractorFn>>,
}

impl OptionsExtractorRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.default.insert(
            "extract_response_options".to_string(),
            Arc::new(extract_response_options) as Arc<OptionsExtractorFn>,
        );
        reg.default.insert(
            "extract_response_options_horizontal".to_string(),
            Arc::new(extract_response_options) as Arc<OptionsExtractorFn>,
        );
        reg
    }

    pub fn register(&mut self, name: impl Into<String>, f: Arc<OptionsExtractorFn>) {
        self.instance.insert(name.into(), f);
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<OptionsExtractorFn>> {
        self.instance.get(name).or_else(|| self.default.get(name))
    }

    /// Extracts options using the named extractor, erroring if the name is
    /// unregistered or the extractor's output isn't a list of strings (the
    /// latter is already guaranteed by the `Vec<String>` return type here,
    /// so only the lookup can fail).
    pub fn extract(&self, name: &str, path: &str, raw_options: &Value) -> EngineResult<Vec<String>> {
        let extractor = self.resolve(name).ok_or_else(|| EngineError::OptionsExtraction {
            path: path.to_string(),
            message: format!("options extractor '{name}' is not registered"),
        })?;
        extractor(raw_options).map_err(|e| match e {
            EngineError::OptionsExtraction { message, .. } => EngineError::OptionsExtraction {
                path: path.to_string(),
                message,
            },
            other => other,
        })
    }
}

/// Default extractor grounded in PCC's `extract_response_options`: pulls
/// `responseText` out of each `{responseText, responseValue}` option object,
/// dropping entries with an empty or missing `responseText`.
fn extract_response_options(raw: &Value) -> EngineResult<Vec<String>> {
    let items = raw.as_array().ok_or_else(|| EngineError::OptionsExtraction {
        path: String::new(),
        message: "options blob must be a list".to_string(),
    })?;

    Ok(items
        .iter()
        .filter_map(|item| item.get("responseText").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}
