//! Meta-schema interpreter — validates the shape of the meta-language
//! definition an engine instance is constructed with.

use serde_json::Value;
use std::collections::HashSet;

use crate::error::EngineError;

fn shape_err(path: &str, message: impl Into<String>) -> EngineError {
    EngineError::MetaSchemaShape {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Validates that a meta-schema language definition conforms to the grammar:
/// required `schema_name`, exactly one of `properties`/`container` at every
/// level, and well-formed `validation` blocks on every terminal property
/// descriptor.
pub fn validate_meta_schema(meta_schema: &Value) -> Result<(), EngineError> {
    let root = meta_schema
        .as_object()
        .ok_or_else(|| shape_err("$", "meta-schema must be a JSON object"))?;

    if !root.contains_key("schema_name") {
        return Err(shape_err("$", "meta-schema must contain 'schema_name'"));
    }

    let has_properties = root.contains_key("properties");
    let has_container = root.contains_key("container");

    match (has_properties, has_container) {
        (false, false) => Err(shape_err(
            "$",
            "meta-schema must contain either 'properties' or 'container'",
        )),
        (true, true) => Err(shape_err(
            "$",
            "meta-schema cannot contain both 'properties' and 'container'",
        )),
        (true, false) => validate_properties_schema(&root["properties"], "$.properties"),
        (false, true) => validate_container_schema(&root["container"], "$.container"),
    }
}

fn validate_properties_schema(properties_def: &Value, path: &str) -> Result<(), EngineError> {
    let obj = properties_def
        .as_object()
        .ok_or_else(|| shape_err(path, "properties definition must be an object"))?;

    if !obj.contains_key("properties_name") {
        return Err(shape_err(
            path,
            "properties definition must contain 'properties_name'",
        ));
    }
    if !obj.contains_key("property") {
        return Err(shape_err(
            path,
            "properties definition must contain 'property'",
        ));
    }

    validate_property_definition(&obj["property"], &format!("{path}.property"))
}

fn validate_container_schema(container_def: &Value, path: &str) -> Result<(), EngineError> {
    let obj = container_def
        .as_object()
        .ok_or_else(|| shape_err(path, "container definition must be an object"))?;

    if !obj.contains_key("container_name") {
        return Err(shape_err(
            path,
            "container definition must contain 'container_name'",
        ));
    }
    if !obj.contains_key("object") {
        return Err(shape_err(path, "container definition must contain 'object'"));
    }

    validate_object_definition(&obj["object"], &format!("{path}.object"))
}

fn validate_object_definition(object_def: &Value, path: &str) -> Result<(), EngineError> {
    let obj = object_def
        .as_object()
        .ok_or_else(|| shape_err(path, "object definition must be an object"))?;

    if !obj.contains_key("key") {
        return Err(shape_err(
            path,
            "object definition must contain 'key' (the item field holding its external key)",
        ));
    }

    let has_properties = obj.contains_key("properties");
    let has_container = obj.contains_key("container");

    match (has_properties, has_container) {
        (false, false) => Err(shape_err(
            path,
            "object definition must contain either 'properties' or 'container'",
        )),
        (true, true) => Err(shape_err(
            path,
            "object definition cannot contain both 'properties' and 'container'",
        )),
        (true, false) => validate_properties_schema(&obj["properties"], &format!("{path}.properties")),
        (false, true) => validate_container_schema(&obj["container"], &format!("{path}.container")),
    }
}

fn validate_property_definition(property_def: &Value, path: &str) -> Result<(), EngineError> {
    let obj = property_def
        .as_object()
        .ok_or_else(|| shape_err(path, "property definition must be an object"))?;

    for field in ["key", "name", "type"] {
        if !obj.contains_key(field) {
            return Err(shape_err(
                path,
                format!("property definition must contain '{field}' field"),
            ));
        }
    }

    let Some(validation) = obj.get("validation") else {
        return Ok(());
    };
    let validation_path = format!("{path}.validation");
    let validation = validation
        .as_object()
        .ok_or_else(|| shape_err(&validation_path, "validation rules must be an object"))?;

    let Some(allowed_types) = validation.get("allowed_types") else {
        return Err(shape_err(
            &validation_path,
            "validation rules must contain 'allowed_types'",
        ));
    };
    let allowed_types = allowed_types
        .as_array()
        .ok_or_else(|| shape_err(&validation_path, "'allowed_types' must be a list"))?;
    let allowed_set: HashSet<&str> = allowed_types.iter().filter_map(Value::as_str).collect();

    if let Some(ignored_types) = validation.get("ignored_types") {
        let ignored_types = ignored_types
            .as_array()
            .ok_or_else(|| shape_err(&validation_path, "'ignored_types' must be a list"))?;
        let ignored_set: HashSet<&str> = ignored_types.iter().filter_map(Value::as_str).collect();
        let overlap: Vec<&str> = allowed_set.intersection(&ignored_set).copied().collect();
        if !overlap.is_empty() {
            return Err(shape_err(
                &validation_path,
                format!("types cannot be in both 'allowed_types' and 'ignored_types': {overlap:?}"),
            ));
        }
    }

    let Some(type_constraints) = validation.get("type_constraints") else {
        return Err(shape_err(
            &validation_path,
            "validation rules must contain 'type_constraints'",
        ));
    };
    let type_constraints = type_constraints
        .as_object()
        .ok_or_else(|| shape_err(&validation_path, "'type_constraints' must be an object"))?;

    if let Some(ignored_types) = validation.get("ignored_types") {
        let ignored_set: HashSet<&str> = ignored_types
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .collect();
        let overlap: Vec<&str> = type_constraints
            .keys()
            .map(String::as_str)
            .filter(|k| ignored_set.contains(k))
            .collect();
        if !overlap.is_empty() {
            return Err(shape_err(
                &validation_path,
                format!("ignored types should not have type_constraints defined: {overlap:?}"),
            ));
        }
    }

    for (field_type, constraint) in type_constraints {
        let constraint_path = format!("{validation_path}.type_constraints.{field_type}");
        let constraint = constraint
            .as_object()
            .ok_or_else(|| shape_err(&constraint_path, "type constraint must be an object"))?;
        if !constraint.contains_key("target_type") {
            return Err(shape_err(
                &constraint_path,
                "type constraint must contain 'target_type'",
            ));
        }
        if !constraint.contains_key("requires_options") {
            return Err(shape_err(
                &constraint_path,
                "type constraint must contain 'requires_options'",
            ));
        }
    }

    for allowed_type in &allowed_set {
        if !type_constraints.contains_key(*allowed_type) {
            return Err(shape_err(
                &validation_path,
                format!("'type_constraints' is missing an entry for allowed type '{allowed_type}'"),
            ));
        }
    }

    Ok(())
}
