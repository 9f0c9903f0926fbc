//! Validator — two-pass validation of a filled response document against a
//! registered table.
//!
//! Pass one is purely structural: the generated JSON Schema is checked with
//! the `jsonschema` crate, exactly the corpus's real-world stand-in for the
//! original's `Draft202012Validator`/`Draft7Validator` fallback pair. Pass
//! two is semantic: every non-null bottom field is re-checked against its
//! target type's registered validator, mirroring
//! `SchemaConverterEngine._apply_custom_validators`.

use serde_json::Value;

use crate::error::EngineError;
use crate::panic_guard::call_guarded;
use crate::paths::{dotted, field_path, get_value_at_path};
use crate::types::RegisteredTable;
use crate::validators::ValidatorRegistry;

/// Runs both validation passes and returns `(is_valid, error_messages)`.
/// Never raises `EngineError` itself — a panicking validator is caught and
/// turned into one more entry in the returned message list, so a single
/// field-level validator failure never aborts validation of the rest of the
/// document.
pub fn validate(table: &RegisteredTable, response: &Value, validators: &ValidatorRegistry) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    match jsonschema::validator_for(&table.json_schema) {
        Ok(compiled) => {
            for err in compiled.iter_errors(response) {
                let path = err.instance_path.to_string();
                let dotted = path.trim_start_matches('/').replace('/', ".");
                if dotted.is_empty() {
                    errors.push(format!("root: {err}"));
                } else {
                    errors.push(format!("{dotted}: {err}"));
                }
            }
        }
        Err(err) => {
            errors.push(format!("internal schema error: {err}"));
        }
    }

    if errors.is_empty() {
        for field in &table.field_index {
            let path = field_path(table, field);
            let Some(value) = get_value_at_path(response, &path) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(validator_fn) = validators.resolve(field.target_type) else {
                continue;
            };
            let dotted_path = dotted(&path);
            let result = call_guarded(
                || validator_fn(value, Some(field)),
                {
                    let dotted_path = dotted_path.clone();
                    let target_type = field.target_type.to_string();
                    move |message| EngineError::Validator {
                        path: dotted_path,
                        target_type,
                        message,
                    }
                },
            );
            match result {
                Ok((true, _)) => {}
                Ok((false, reason)) => {
                    errors.push(format!("{dotted_path}: {reason}"));
                }
                Err(engine_err) => {
                    errors.push(engine_err.to_string());
                }
            }
        }
    }

    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::BuilderRegistry;
    use crate::config::EngineConfig;
    use crate::converter::convert;
    use crate::options::OptionsExtractorRegistry;
    use serde_json::json;

    fn flat_meta_schema() -> Value {
        json!({
            "schema_name": "table_name",
            "properties": {
                "properties_name": "fields",
                "property": {
                    "key": "key", "name": "name", "type": "type",
                    "validation": {
                        "allowed_types": ["txt", "dte", "rad"],
                        "type_constraints": {
                            "txt": {"target_type": "string", "requires_options": false},
                            "dte": {"target_type": "date", "requires_options": false},
                            "rad": {"target_type": "single_select", "requires_options": true}
                        }
                    }
                }
            }
        })
    }

    fn registered_table() -> RegisteredTable {
        let meta = flat_meta_schema();
        let external = json!({
            "table_name": "Demo",
            "fields": [
                {"key": "name", "name": "Name", "type": "txt"},
                {"key": "dob", "name": "DOB", "type": "dte"},
            ]
        });
        let config = EngineConfig::default();
        let builders = BuilderRegistry::with_defaults();
        let extractors = OptionsExtractorRegistry::with_defaults();
        let out = convert(&meta, &external, &config, &builders, &extractors).unwrap();
        RegisteredTable {
            external_schema: external,
            json_schema: out.json_schema,
            field_index: out.field_index,
            table_name: out.table_name,
            container_counts_by_name: out.container_counts,
            body_key: out.body_key,
            is_nested: out.is_nested,
            external_schema_id: out.external_schema_id,
        }
    }

    #[test]
    fn valid_response_passes_both_passes() {
        let table = registered_table();
        let validators = ValidatorRegistry::with_defaults();
        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "2000-01-01"}});
        let (ok, errors) = validate(&table, &response, &validators);
        assert!(ok, "unexpected errors: {errors:?}");
    }

    #[test]
    fn structural_failure_reports_dotted_path() {
        let table = registered_table();
        let validators = ValidatorRegistry::with_defaults();
        let response = json!({"table_name": "Demo", "fields": {"Name": 42, "DOB": "2000-01-01"}});
        let (ok, errors) = validate(&table, &response, &validators);
        assert!(!ok);
        assert!(errors.iter().any(|e| e.starts_with("fields.Name")), "errors: {errors:?}");
    }

    #[test]
    fn semantic_failure_on_bad_date_reports_reason() {
        let table = registered_table();
        let validators = ValidatorRegistry::with_defaults();
        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "not-a-date"}});
        let (ok, errors) = validate(&table, &response, &validators);
        assert!(!ok);
        assert!(errors.iter().any(|e| e.contains("DOB")), "errors: {errors:?}");
    }

    #[test]
    fn null_field_skips_semantic_pass() {
        let table = registered_table();
        let validators = ValidatorRegistry::with_defaults();
        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": null}});
        let (ok, errors) = validate(&table, &response, &validators);
        assert!(ok, "unexpected errors: {errors:?}");
    }

    #[test]
    fn panicking_validator_is_caught_and_reported() {
        let table = registered_table();
        let mut validators = ValidatorRegistry::with_defaults();
        validators.register(crate::types::TargetType::Date, std::sync::Arc::new(|_v, _m| panic!("boom")));
        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "2000-01-01"}});
        let (ok, errors) = validate(&table, &response, &validators);
        assert!(!ok);
        assert!(errors.iter().any(|e| e.contains("boom")));
    }
}
