//! Schema converter — walks an external table schema using the
//! meta-schema interpreter to emit a root JSON Schema, a field index, and
//! per-container item counts.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};

use crate::builders::{BuilderContext, BuilderOutput, BuilderRegistry};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::options::OptionsExtractorRegistry;
use crate::panic_guard::call_guarded;
use crate::sanitize::{sanitize, sanitize_all};
use crate::types::{FieldMetadata, TargetType};

/// Everything the schema converter produces for one external schema. The
/// caller (the table registry) wraps this into a `RegisteredTable`.
pub struct ConversionOutput {
    pub json_schema: Value,
    pub field_index: Vec<FieldMetadata>,
    pub table_name: String,
    pub container_counts: HashMap<String, usize>,
    pub body_key: String,
    pub is_nested: bool,
    pub external_schema_id: Option<Value>,
}

/// Converts one external schema document under the given meta-schema.
/// `meta_schema` is assumed already validated by
/// [`crate::meta_schema::validate_meta_schema`] at engine construction — the
/// `.expect(...)` calls below rely on that invariant.
pub fn convert(
    meta_schema: &Value,
    external_schema: &Value,
    config: &EngineConfig,
    builders: &BuilderRegistry,
    options_extractors: &OptionsExtractorRegistry,
) -> EngineResult<ConversionOutput> {
    let schema_name_field = meta_schema["schema_name"]
        .as_str()
        .expect("meta-schema validated at construction");
    let table_name = external_schema
        .get(schema_name_field)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Registration {
            message: format!("external schema is missing its '{schema_name_field}' (schema_name) field"),
        })?
        .to_string();

    let external_schema_id = meta_schema
        .get("schema_id")
        .and_then(Value::as_str)
        .and_then(|field| external_schema.get(field))
        .cloned();

    let mut field_index = Vec::new();
    let mut container_counts = HashMap::new();

    let (body_key, body_node, is_nested) = if let Some(properties_def) = meta_schema.get("properties") {
        let properties_name = properties_def["properties_name"]
            .as_str()
            .expect("meta-schema validated at construction");
        let node = walk_properties_block(
            properties_def,
            external_schema,
            vec![properties_name.to_string()],
            "$",
            config,
            builders,
            options_extractors,
            &mut field_index,
        )?;
        (properties_name.to_string(), node, false)
    } else {
        let container_def = &meta_schema["container"];
        let container_name = container_def["container_name"]
            .as_str()
            .expect("meta-schema validated at construction");
        let node = convert_container_level(
            container_def,
            external_schema,
            &[],
            "$",
            0,
            config,
            builders,
            options_extractors,
            &mut field_index,
            &mut container_counts,
        )?;
        (container_name.to_string(), node, true)
    };

    let mut root_properties = Map::new();
    root_properties.insert("table_name".to_string(), json!({"type": "string", "const": table_name}));
    root_properties.insert(body_key.clone(), body_node);

    let json_schema = json!({
        "title": table_name,
        "type": "object",
        "additionalProperties": false,
        "properties": Value::Object(root_properties),
        "required": ["table_name", body_key.clone()],
    });

    Ok(ConversionOutput {
        json_schema,
        field_index,
        table_name,
        container_counts,
        body_key,
        is_nested,
        external_schema_id,
    })
}

/// One resolved type constraint: the target type a builder will be invoked
/// for, plus whether/how to gather enum options.
struct Resolution {
    target_type: TargetType,
    requires_options: bool,
    options_field_override: Option<String>,
    options_extractor_name: Option<String>,
}

/// Resolves an external property type against the meta-schema's
/// `validation` block (or, when absent, against the target-type set
/// directly). Returns `Ok(None)` for an ignored type.
fn resolve_target_type(property_def: &Value, type_str: &str, path: &str) -> EngineResult<Option<Resolution>> {
    let Some(validation) = property_def.get("validation") else {
        let target_type: TargetType = type_str.parse().map_err(|_| EngineError::FieldType {
            path: path.to_string(),
            message: format!("type '{type_str}' has no target-type mapping (no validation block present)"),
        })?;
        let requires_options = matches!(
            target_type,
            TargetType::SingleSelect | TargetType::MultipleSelect | TargetType::ObjectArray
        );
        return Ok(Some(Resolution {
            target_type,
            requires_options,
            options_field_override: None,
            options_extractor_name: None,
        }));
    };

    let ignored: HashSet<&str> = validation
        .get("ignored_types")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    if ignored.contains(type_str) {
        return Ok(None);
    }

    let allowed: HashSet<&str> = validation["allowed_types"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    if !allowed.contains(type_str) {
        return Err(EngineError::FieldType {
            path: path.to_string(),
            message: format!("type '{type_str}' is not in allowed_types"),
        });
    }

    let constraint = validation["type_constraints"].get(type_str).ok_or_else(|| EngineError::FieldType {
        path: path.to_string(),
        message: format!("no type_constraints entry for allowed type '{type_str}'"),
    })?;

    let target_str = constraint["target_type"].as_str().ok_or_else(|| EngineError::FieldType {
        path: path.to_string(),
        message: format!("type_constraints['{type_str}'] is missing 'target_type'"),
    })?;
    let target_type: TargetType = target_str.parse().map_err(|_| EngineError::FieldType {
        path: path.to_string(),
        message: format!("unrecognized target_type '{target_str}'"),
    })?;

    let requires_options = constraint.get("requires_options").and_then(Value::as_bool).unwrap_or(false);
    let options_field_override = constraint.get("options_field").and_then(Value::as_str).map(str::to_string);
    let options_extractor_name = constraint.get("options_extractor").and_then(Value::as_str).map(str::to_string);

    Ok(Some(Resolution {
        target_type,
        requires_options,
        options_field_override,
        options_extractor_name,
    }))
}

struct PropertyConversion {
    property_key: String,
    node: Value,
    field_meta: FieldMetadata,
}

/// Converts one external property descriptor: resolves its target type,
/// gathers enum options if required, invokes the target type's builder, and
/// records a field-metadata entry for the kept result.
#[allow(clippy::too_many_arguments)]
fn convert_property(
    property_def: &Value,
    property_schema: &Value,
    level_keys: &[String],
    path: &str,
    config: &EngineConfig,
    builders: &BuilderRegistry,
    options_extractors: &OptionsExtractorRegistry,
) -> EngineResult<Option<PropertyConversion>> {
    let field_name_of = |template_field: &str| -> Option<&str> { property_def.get(template_field)?.as_str() };

    let key_field = field_name_of("key").expect("meta-schema validated at construction");
    let key = property_schema
        .get(key_field)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::FieldType {
            path: path.to_string(),
            message: format!("property is missing its '{key_field}' field"),
        })?
        .to_string();

    let name_field = field_name_of("name").expect("meta-schema validated at construction");
    let name = property_schema.get(name_field).and_then(Value::as_str).map(str::to_string);

    let type_field = field_name_of("type").expect("meta-schema validated at construction");
    let type_str = property_schema.get(type_field).and_then(Value::as_str).ok_or_else(|| EngineError::FieldType {
        path: path.to_string(),
        message: format!("property is missing its '{type_field}' field"),
    })?;

    let id = field_name_of("id").and_then(|f| property_schema.get(f)).and_then(Value::as_str).map(str::to_string);
    let title = field_name_of("title").and_then(|f| property_schema.get(f)).and_then(Value::as_str).map(str::to_string);

    let Some(resolution) = resolve_target_type(property_def, type_str, path)? else {
        return Ok(None);
    };

    let mut enum_values: Option<Vec<String>> = None;
    if resolution.requires_options {
        let options_field = resolution
            .options_field_override
            .clone()
            .or_else(|| field_name_of("options").map(str::to_string))
            .ok_or_else(|| EngineError::OptionsExtraction {
                path: path.to_string(),
                message: "requires_options is true but no options field is named".to_string(),
            })?;
        let raw = property_schema.get(&options_field).ok_or_else(|| EngineError::OptionsExtraction {
            path: path.to_string(),
            message: format!("missing options blob at '{options_field}'"),
        })?;

        let as_string_list = raw.as_array().filter(|arr| arr.iter().all(Value::is_string));
        let raw_list: Vec<String> = if let Some(arr) = as_string_list {
            arr.iter().map(|v| v.as_str().unwrap().to_string()).collect()
        } else {
            let extractor_name = resolution.options_extractor_name.as_deref().ok_or_else(|| EngineError::OptionsExtraction {
                path: path.to_string(),
                message: "options blob is not already a list of strings, and no options_extractor is named".to_string(),
            })?;
            options_extractors.extract(extractor_name, path, raw)?
        };

        enum_values = Some(sanitize_all(raw_list));
    }

    let builder = builders
        .resolve(resolution.target_type)
        .ok_or_else(|| EngineError::Builder {
            path: path.to_string(),
            target_type: resolution.target_type.to_string(),
            message: "no builder registered for this target type".to_string(),
        })?
        .clone();

    let ctx = BuilderContext {
        target_type: resolution.target_type,
        enum_values: enum_values.as_deref(),
        nullable: true,
        property_def,
        property_schema,
    };

    let output = call_guarded(
        || builder(&ctx),
        |message| EngineError::Builder {
            path: path.to_string(),
            target_type: resolution.target_type.to_string(),
            message,
        },
    )?;

    match output {
        BuilderOutput::Skip => Ok(None),
        BuilderOutput::Node(node) => {
            let sanitized_name = sanitize(name.as_deref().unwrap_or(&key));
            let property_key = match (&id, config.use_id_in_property_name) {
                (Some(id_value), true) => format!("{id_value}.{sanitized_name}"),
                _ => sanitized_name,
            };
            let field_meta = FieldMetadata {
                key,
                id,
                name,
                title,
                level_keys: level_keys.to_vec(),
                target_type: resolution.target_type,
                original_schema_type: type_str.to_string(),
                field_schema: property_schema.clone(),
                property_key: property_key.clone(),
            };
            Ok(Some(PropertyConversion { property_key, node, field_meta }))
        }
        BuilderOutput::Keyed(override_key, node) => {
            let field_meta = FieldMetadata {
                key,
                id,
                name,
                title,
                level_keys: level_keys.to_vec(),
                target_type: resolution.target_type,
                original_schema_type: type_str.to_string(),
                field_schema: property_schema.clone(),
                property_key: override_key.clone(),
            };
            Ok(Some(PropertyConversion { property_key: override_key, node, field_meta }))
        }
    }
}

/// Walks a terminal `properties` block, emitting one object node holding
/// every kept field. Used both for flat tables and for the innermost level
/// of a nested container chain.
#[allow(clippy::too_many_arguments)]
fn walk_properties_block(
    properties_def: &Value,
    external_value: &Value,
    level_keys: Vec<String>,
    path: &str,
    config: &EngineConfig,
    builders: &BuilderRegistry,
    options_extractors: &OptionsExtractorRegistry,
    field_index: &mut Vec<FieldMetadata>,
) -> EngineResult<Value> {
    let properties_name = properties_def["properties_name"].as_str().expect("meta-schema validated at construction");
    let property_def = &properties_def["property"];
    let items = external_value.get(properties_name).and_then(Value::as_array);

    let mut properties = Map::new();
    let mut required = Vec::new();

    for (index, item) in items.into_iter().flatten().enumerate() {
        let item_path = format!("{path}.{properties_name}[{index}]");
        let Some(conversion) = convert_property(property_def, item, &level_keys, &item_path, config, builders, options_extractors)? else {
            continue;
        };
        if properties.contains_key(&conversion.property_key) {
            return Err(EngineError::Registration {
                message: format!("duplicate property key '{}' at {item_path}", conversion.property_key),
            });
        }
        required.push(conversion.property_key.clone());
        properties.insert(conversion.property_key, conversion.node);
        field_index.push(conversion.field_meta);
    }

    Ok(json!({
        "type": "object",
        "additionalProperties": false,
        "properties": Value::Object(properties),
        "required": required,
    }))
}

/// Walks one level of a nested container, emitting one object node keyed by
/// each item's display key.
#[allow(clippy::too_many_arguments)]
fn convert_container_level(
    container_def: &Value,
    external_value: &Value,
    level_keys: &[String],
    path: &str,
    depth: usize,
    config: &EngineConfig,
    builders: &BuilderRegistry,
    options_extractors: &OptionsExtractorRegistry,
    field_index: &mut Vec<FieldMetadata>,
    container_counts: &mut HashMap<String, usize>,
) -> EngineResult<Value> {
    if depth > config.max_nesting_levels {
        return Err(EngineError::Registration {
            message: format!("container nesting at {path} exceeds max_nesting_levels ({})", config.max_nesting_levels),
        });
    }

    let container_name = container_def["container_name"].as_str().expect("meta-schema validated at construction");
    let object_def = &container_def["object"];
    let key_field = object_def["key"].as_str().expect("meta-schema validated at construction");
    let name_field = object_def.get("name").and_then(Value::as_str);

    let items = external_value.get(container_name).and_then(Value::as_array);

    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut kept_count = 0usize;

    for (index, item) in items.into_iter().flatten().enumerate() {
        let item_path = format!("{path}.{container_name}[{index}]");
        let Some(external_key) = item.get(key_field).and_then(Value::as_str) else {
            continue;
        };
        let external_name = name_field.and_then(|field| item.get(field)).and_then(Value::as_str).filter(|s| !s.is_empty());
        let display_key = match external_name {
            Some(name) => format!("{external_key}.{}", sanitize(name)),
            None => external_key.to_string(),
        };

        let mut child_level_keys = level_keys.to_vec();
        child_level_keys.push(display_key.clone());

        let item_node = if let Some(child_container_def) = object_def.get("container") {
            let child_container_name = child_container_def["container_name"].as_str().expect("meta-schema validated at construction");
            child_level_keys.push(child_container_name.to_string());
            let child_node = convert_container_level(
                child_container_def,
                item,
                &child_level_keys,
                &item_path,
                depth + 1,
                config,
                builders,
                options_extractors,
                field_index,
                container_counts,
            )?;
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {child_container_name.to_string(): child_node},
                "required": [child_container_name],
            })
        } else {
            let properties_def = &object_def["properties"];
            let properties_name = properties_def["properties_name"].as_str().expect("meta-schema validated at construction");
            child_level_keys.push(properties_name.to_string());
            let inner = walk_properties_block(properties_def, item, child_level_keys, &item_path, config, builders, options_extractors, field_index)?;
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {properties_name.to_string(): inner},
                "required": [properties_name],
            })
        };

        if properties.contains_key(&display_key) {
            return Err(EngineError::Registration {
                message: format!("duplicate container key '{display_key}' at {item_path}"),
            });
        }
        required.push(display_key.clone());
        properties.insert(display_key, item_node);
        kept_count += 1;
    }

    *container_counts.entry(container_name.to_string()).or_insert(0) += kept_count;

    Ok(json!({
        "type": "object",
        "additionalProperties": false,
        "properties": Value::Object(properties),
        "required": required,
    }))
}
