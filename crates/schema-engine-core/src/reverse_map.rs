//! Reverse mapper — rewrites a validated model response back into the
//! external wire format.
//!
//! Grounded in `pcc_assessment_schema.py`'s `reverse_map` wrapper: a metadata
//! header, a field-index walk collecting formatter descriptors, grouping by
//! the outermost container, and per-group packing into either an array or an
//! object.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::error::EngineError;
use crate::formatters::{FormatterContext, FormatterRegistry};
use crate::panic_guard::call_guarded;
use crate::paths::{dotted, field_path, get_value_at_path};
use crate::types::RegisteredTable;

/// Whether a group of descriptors (or a group of containers) is packed as an
/// ordered array or as a keyed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackShape {
    Array,
    Object,
}

/// The metadata header's overridable field names, plus the fixed
/// `schema-type` annotation value.
#[derive(Debug, Clone)]
pub struct MetadataFieldNames {
    pub schema_name: String,
    pub schema_id: String,
    pub schema_type_field: String,
    pub schema_type_value: String,
}

impl Default for MetadataFieldNames {
    fn default() -> Self {
        Self {
            schema_name: "schema_name".to_string(),
            schema_id: "schema_id".to_string(),
            schema_type_field: "schema_type".to_string(),
            schema_type_value: "default".to_string(),
        }
    }
}

/// Caller-chosen packing behavior for one reverse-map call.
#[derive(Debug, Clone)]
pub struct ReverseMapOptions {
    pub formatter_set: String,
    pub metadata: MetadataFieldNames,
    /// Names of the outermost level-key groups to pack. `None` means every
    /// field is packed into a single implicit group keyed by the table's
    /// body key (the flat-table case).
    pub group_by_containers: Option<Vec<String>>,
    pub field_pack_shape: PackShape,
    pub container_pack_shape: PackShape,
    /// When `true` and containers are grouped, each container gets a
    /// `state` field defaulting to `"draft"` if the formatter didn't already
    /// supply one (PCC convention).
    pub default_section_state: bool,
}

impl Default for ReverseMapOptions {
    fn default() -> Self {
        Self {
            formatter_set: crate::config::DEFAULT_FORMATTER_SET.to_string(),
            metadata: MetadataFieldNames::default(),
            group_by_containers: Some(vec!["sections".to_string()]),
            field_pack_shape: PackShape::Object,
            container_pack_shape: PackShape::Object,
            default_section_state: true,
        }
    }
}

/// Reverse-maps a validated response document back to the external wire
/// format described by `options`.
pub fn reverse_map(
    table: &RegisteredTable,
    response: &Value,
    options: &ReverseMapOptions,
    formatters: &FormatterRegistry,
) -> Value {
    let mut out = Map::new();
    out.insert(options.metadata.schema_name.clone(), json!(table.table_name));
    if let Some(schema_id) = &table.external_schema_id {
        out.insert(options.metadata.schema_id.clone(), schema_id.clone());
    }
    out.insert(options.metadata.schema_type_field.clone(), json!(options.metadata.schema_type_value));

    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for field in &table.field_index {
        let path = field_path(table, field);
        let Some(value) = get_value_at_path(response, &path) else {
            continue;
        };

        let formatter = match formatters.resolve(&options.formatter_set, &field.original_schema_type) {
            Some(f) => f,
            None => continue,
        };

        let ctx = FormatterContext {
            field,
            model_value: value,
            table_name: &table.table_name,
        };
        let dotted_path = dotted(&path);
        let result = call_guarded(
            || formatter(&ctx),
            {
                let dotted_path = dotted_path.clone();
                let original_type = field.original_schema_type.clone();
                move |message| EngineError::Formatter {
                    path: dotted_path,
                    original_type,
                    message,
                }
            },
        );

        let descriptors = match result {
            Ok(descriptors) => descriptors,
            Err(err) => {
                tracing::warn!(field = %dotted_path, error = %err, "reverse formatter failed; field omitted from output");
                continue;
            }
        };

        if descriptors.is_empty() {
            continue;
        }

        let group_key = group_key_for(field, &options.group_by_containers, &table.body_key);
        let idx = *group_index.entry(group_key.clone()).or_insert_with(|| {
            groups.push((group_key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.extend(descriptors);
    }

    let packed_groups: Vec<(String, Value)> = groups
        .into_iter()
        .map(|(key, descriptors)| (key, pack_group(descriptors, options)))
        .collect();

    let body_key = match &options.group_by_containers {
        Some(names) if !names.is_empty() => names[0].clone(),
        _ => table.body_key.clone(),
    };

    let body = pack_containers(packed_groups, options);
    out.insert(body_key, body);

    Value::Object(out)
}

fn group_key_for(field: &crate::types::FieldMetadata, group_by: &Option<Vec<String>>, fallback: &str) -> String {
    match group_by {
        Some(_) => field.level_keys.first().cloned().unwrap_or_else(|| fallback.to_string()),
        None => fallback.to_string(),
    }
}

fn pack_group(descriptors: Vec<Value>, options: &ReverseMapOptions) -> Value {
    match options.field_pack_shape {
        PackShape::Array => Value::Array(descriptors),
        PackShape::Object => {
            let mut map = Map::new();
            for descriptor in descriptors {
                let key = descriptor
                    .get("_storage_key")
                    .and_then(Value::as_str)
                    .or_else(|| descriptor.get("key").and_then(Value::as_str))
                    .unwrap_or("")
                    .to_string();
                map.insert(key, descriptor);
            }
            Value::Object(map)
        }
    }
}

fn pack_containers(groups: Vec<(String, Value)>, options: &ReverseMapOptions) -> Value {
    let is_sectioned = options.group_by_containers.as_ref().map(|g| !g.is_empty()).unwrap_or(false);

    match options.container_pack_shape {
        PackShape::Array => Value::Array(
            groups
                .into_iter()
                .map(|(_, mut payload)| {
                    if is_sectioned && options.default_section_state {
                        apply_default_state(&mut payload);
                    }
                    payload
                })
                .collect(),
        ),
        PackShape::Object => {
            let mut map = Map::new();
            for (key, mut payload) in groups {
                if is_sectioned && options.default_section_state {
                    apply_default_state(&mut payload);
                }
                map.insert(key, payload);
            }
            Value::Object(map)
        }
    }
}

fn apply_default_state(payload: &mut Value) {
    if let Value::Object(map) = payload {
        map.entry("state").or_insert_with(|| json!("draft"));
    }
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
                        "allowed_types": ["txt", "chk", "inst"],
                        "type_constraints": {
                            "txt": {"target_type": "string", "requires_options": false},
                            "chk": {"target_type": "boolean", "requires_options": false},
                            "inst": {"target_type": "instructions", "requires_options": false}
                        }
                    }
                }
            }
        })
    }

    fn flat_table() -> RegisteredTable {
        let meta = flat_meta_schema();
        let external = json!({
            "table_name": "Demo",
            "fields": [
                {"key": "name", "name": "Name", "type": "txt"},
                {"key": "ambulatory", "name": "Ambulatory", "type": "chk"},
                {"key": "1", "name": "Please read", "type": "inst"},
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
    fn default_set_converts_checkbox_and_drops_instructions() {
        let table = flat_table();
        let formatters = FormatterRegistry::with_defaults();
        let mut options = ReverseMapOptions::default();
        options.formatter_set = "default".to_string();
        options.group_by_containers = None;

        let response = json!({
            "table_name": "Demo",
            "fields": {"Name": "Jane", "Ambulatory": true, "1.Instructions": "Please read"}
        });

        let out = reverse_map(&table, &response, &options, &formatters);
        let fields = &out["fields"];
        assert_eq!(fields["name"]["value"], json!("Jane"));
        assert_eq!(fields["ambulatory"]["value"], json!("1"));
        assert!(fields.get("1").is_none(), "instruction fields must vanish from reverse-mapped output");
    }

    #[test]
    fn metadata_header_uses_overridden_names() {
        let table = flat_table();
        let formatters = FormatterRegistry::with_defaults();
        let mut options = ReverseMapOptions::default();
        options.group_by_containers = None;
        options.metadata = MetadataFieldNames {
            schema_name: "assessment_title".to_string(),
            schema_id: "assessment_std_id".to_string(),
            schema_type_field: "doc_type".to_string(),
            schema_type_value: "pcc_assessment".to_string(),
        };

        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "Ambulatory": false, "1.Instructions": "Please read"}});
        let out = reverse_map(&table, &response, &options, &formatters);
        assert_eq!(out["assessment_title"], json!("Demo"));
        assert_eq!(out["doc_type"], json!("pcc_assessment"));
    }

    #[test]
    fn sectioned_grouping_defaults_state_to_draft() {
        let table = flat_table();
        let formatters = FormatterRegistry::with_defaults();
        let mut options = ReverseMapOptions::default();
        options.group_by_containers = Some(vec!["fields".to_string()]);

        let response = json!({"table_name": "Demo", "fields": {"Name": "Jane", "Ambulatory": true, "1.Instructions": "Please read"}});
        let out = reverse_map(&table, &response, &options, &formatters);
        assert_eq!(out["fields"]["fields"]["state"], json!("draft"));
    }
}
