//! The engine's single public entry point, composing the builder, validator,
//! formatter, and options-extractor registries plus the table store behind
//! one `RwLock`-guarded type.
//!
//! "register-then-query" is the documented usage: construct, register
//! custom builders/validators/formatters/extractors and tables, then read.
//! Readers (`validate`, `reverse_map`, `get_json_schema`, ...) take a shared
//! lock and never block each other; writers (`register_*`) take an
//! exclusive lock.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::builders::{BuilderFn, BuilderRegistry};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::formatters::{FormatterFn, FormatterRegistry};
use crate::meta_schema::validate_meta_schema;
use crate::options::{OptionsExtractorFn, OptionsExtractorRegistry};
use crate::reverse_map::{self, ReverseMapOptions};
use crate::table_registry::{TableIdentifier, TableStore};
use crate::types::{FieldMetadata, TargetType};
use crate::validate::validate as run_validate;
use crate::validators::{ValidatorFn, ValidatorRegistry};

/// State guarded behind the engine's single read-write lock: the four
/// pluggable registries plus the table store.
struct EngineState {
    builders: BuilderRegistry,
    validators: ValidatorRegistry,
    formatters: FormatterRegistry,
    options_extractors: OptionsExtractorRegistry,
    tables: TableStore,
}

/// The schema conversion engine. Cheap to share: clone the `Arc` this type
/// wraps internally rather than the engine itself, or hold it behind your
/// own `Arc<Engine>` — either way, all clones observe the same state.
pub struct Engine {
    meta_schema: Value,
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl Engine {
    /// Validates `meta_schema`'s shape and constructs a new engine with the
    /// default builder/validator/formatter/options-extractor libraries and
    /// an empty table store.
    pub fn new(meta_schema: Value, config: EngineConfig) -> EngineResult<Self> {
        validate_meta_schema(&meta_schema)?;
        Ok(Self {
            meta_schema,
            config,
            state: RwLock::new(EngineState {
                builders: BuilderRegistry::with_defaults(),
                validators: ValidatorRegistry::with_defaults(),
                formatters: FormatterRegistry::with_defaults(),
                options_extractors: OptionsExtractorRegistry::with_defaults(),
                tables: TableStore::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- registration (writers) --------------------------------------

    pub fn register_table(&self, table_id: Option<i64>, external_schema: &Value) -> EngineResult<(i64, String)> {
        let mut state = self.state.write().expect("engine lock poisoned");
        let EngineState { tables, builders, options_extractors, .. } = &mut *state;
        tables.register(table_id, external_schema, &self.meta_schema, &self.config, builders, options_extractors)
    }

    pub fn unregister_table(&self, id: i64) {
        self.state.write().expect("engine lock poisoned").tables.unregister(id);
    }

    pub fn clear(&self) {
        self.state.write().expect("engine lock poisoned").tables.clear();
    }

    pub fn register_schema_field_builder(&self, target_type: TargetType, f: Arc<BuilderFn>) {
        tracing::info!(?target_type, "registering instance property-schema builder");
        self.state.write().expect("engine lock poisoned").builders.register(target_type, f);
    }

    pub fn register_validator(&self, target_type: TargetType, f: Arc<ValidatorFn>) {
        tracing::info!(?target_type, "registering instance validator");
        self.state.write().expect("engine lock poisoned").validators.register(target_type, f);
    }

    pub fn register_formatter(&self, formatter_set: impl Into<String>, original_type: impl Into<String>, f: Arc<FormatterFn>) {
        let formatter_set = formatter_set.into();
        let original_type = original_type.into();
        tracing::info!(%formatter_set, %original_type, "registering instance reverse formatter");
        self.state.write().expect("engine lock poisoned").formatters.register(formatter_set, original_type, f);
    }

    pub fn register_options_extractor(&self, name: impl Into<String>, f: Arc<OptionsExtractorFn>) {
        let name = name.into();
        tracing::info!(%name, "registering instance options extractor");
        self.state.write().expect("engine lock poisoned").options_extractors.register(name, f);
    }

    // ---- queries (readers) --------------------------------------------

    pub fn resolve(&self, identifier: impl Into<TableIdentifier>) -> EngineResult<i64> {
        self.state.read().expect("engine lock poisoned").tables.resolve(&identifier.into())
    }

    pub fn list_ids(&self) -> Vec<i64> {
        self.state.read().expect("engine lock poisoned").tables.list_ids()
    }

    pub fn list_info(&self) -> Vec<(i64, String)> {
        self.state.read().expect("engine lock poisoned").tables.list_info()
    }

    pub fn get_json_schema(&self, identifier: impl Into<TableIdentifier>) -> EngineResult<Value> {
        let state = self.state.read().expect("engine lock poisoned");
        Ok(state.tables.get(&identifier.into())?.json_schema.clone())
    }

    pub fn get_field_metadata(&self, identifier: impl Into<TableIdentifier>) -> EngineResult<Vec<FieldMetadata>> {
        let state = self.state.read().expect("engine lock poisoned");
        Ok(state.tables.get(&identifier.into())?.field_index.clone())
    }

    pub fn get_container_count(&self, identifier: impl Into<TableIdentifier>, container_name: &str) -> EngineResult<usize> {
        let state = self.state.read().expect("engine lock poisoned");
        let table = state.tables.get(&identifier.into())?;
        Ok(table.container_counts_by_name.get(container_name).copied().unwrap_or(0))
    }

    /// Validates `response` against the registered table's generated JSON
    /// Schema, then semantically. Never returns `Err` for a validation
    /// failure — invalid input is reported in the returned message list;
    /// `Err` is reserved for an unresolvable table identifier.
    pub fn validate(&self, identifier: impl Into<TableIdentifier>, response: &Value) -> EngineResult<(bool, Vec<String>)> {
        let state = self.state.read().expect("engine lock poisoned");
        let table = state.tables.get(&identifier.into())?;
        Ok(run_validate(table, response, &state.validators))
    }

    /// Reverse-maps an already-validated response back to the external wire
    /// format.
    pub fn reverse_map(
        &self,
        identifier: impl Into<TableIdentifier>,
        response: &Value,
        options: &ReverseMapOptions,
    ) -> EngineResult<Value> {
        let state = self.state.read().expect("engine lock poisoned");
        let table = state.tables.get(&identifier.into())?;
        Ok(reverse_map::reverse_map(table, response, options, &state.formatters))
    }

    /// Injects per-field description strings into a table's generated JSON
    /// Schema. `key_prefix` defaults to
    /// [`crate::config::DEFAULT_ENRICH_KEY_PREFIX`] when `None`. Returns the
    /// keys from `descriptions` that matched no field.
    pub fn enrich_schema(
        &self,
        identifier: impl Into<TableIdentifier>,
        descriptions: &std::collections::HashMap<String, String>,
        key_prefix: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        let prefix = key_prefix.unwrap_or(crate::config::DEFAULT_ENRICH_KEY_PREFIX);
        let mut state = self.state.write().expect("engine lock poisoned");
        let id = state.tables.resolve(&identifier.into())?;
        let table = state.tables.get_mut(id).expect("resolve guarantees presence");

        let mut unmatched = Vec::new();
        for (raw_key, text) in descriptions {
            let key = raw_key.strip_prefix(prefix).unwrap_or(raw_key);
            let Some(field) = table.field_index.iter().find(|f| f.key == key) else {
                unmatched.push(raw_key.clone());
                continue;
            };
            let path = crate::paths::field_path(table, field);
            match crate::paths::get_schema_node_mut(&mut table.json_schema, &path) {
                Some(node) if node.is_object() => {
                    node.as_object_mut().expect("checked above").insert("description".to_string(), Value::String(text.clone()));
                }
                _ => unmatched.push(raw_key.clone()),
            }
        }
        Ok(unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat_meta_schema() -> Value {
        json!({
            "schema_name": "table_name",
            "properties": {
                "properties_name": "fields",
                "property": {
                    "key": "key", "name": "name", "type": "type",
                    "validation": {
                        "allowed_types": ["txt", "dte"],
                        "type_constraints": {
                            "txt": {"target_type": "string", "requires_options": false},
                            "dte": {"target_type": "date", "requires_options": false}
                        }
                    }
                }
            }
        })
    }

    fn external(name: &str) -> Value {
        json!({"table_name": name, "fields": [
            {"key": "name", "name": "Name", "type": "txt"},
            {"key": "dob", "name": "DOB", "type": "dte"},
        ]})
    }

    #[test]
    fn constructs_with_invalid_meta_schema_errors() {
        let err = Engine::new(json!({}), EngineConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::MetaSchemaShapeError);
    }

    #[test]
    fn register_resolve_validate_round_trip() {
        let engine = Engine::new(flat_meta_schema(), EngineConfig::default()).unwrap();
        let (id, name) = engine.register_table(None, &external("Demo")).unwrap();
        assert_eq!(id, 1);
        assert_eq!(name, "Demo");
        assert_eq!(engine.resolve("Demo").unwrap(), id);

        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "2000-01-01"}});
        let (ok, errors) = engine.validate(id, &response).unwrap();
        assert!(ok, "unexpected errors: {errors:?}");
    }

    #[test]
    fn unknown_table_on_validate_errors() {
        let engine = Engine::new(flat_meta_schema(), EngineConfig::default()).unwrap();
        let err = engine.validate(99, &json!({})).unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::UnknownTableError);
    }

    #[test]
    fn enrich_schema_injects_descriptions_and_reports_unmatched() {
        let engine = Engine::new(flat_meta_schema(), EngineConfig::default()).unwrap();
        let (id, _) = engine.register_table(None, &external("Demo")).unwrap();

        let mut descriptions = std::collections::HashMap::new();
        descriptions.insert("Cust_name".to_string(), "Patient's full legal name".to_string());
        descriptions.insert("Cust_nonexistent".to_string(), "ignored".to_string());

        let unmatched = engine.enrich_schema(id, &descriptions, None).unwrap();
        assert_eq!(unmatched, vec!["Cust_nonexistent".to_string()]);

        let schema = engine.get_json_schema(id).unwrap();
        assert_eq!(
            schema["properties"]["fields"]["properties"]["Name"]["description"],
            json!("Patient's full legal name")
        );
    }

    #[test]
    fn clear_removes_all_tables() {
        let engine = Engine::new(flat_meta_schema(), EngineConfig::default()).unwrap();
        engine.register_table(None, &external("Demo")).unwrap();
        engine.clear();
        assert!(engine.list_ids().is_empty());
    }
}
