//! Property-schema builder registry — maps a target type to a pure
//! function producing one JSON Schema node.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::EngineResult;
use crate::types::TargetType;

/// A builder's output: either the property vanishes from the schema/field
/// index entirely (`Skip`), a plain JSON Schema node under the field's
/// regular property key (`Node`), or a node paired with an override key that
/// replaces the field's regular property key in the generated schema
/// (`Keyed`, used by `instructions`).
pub enum BuilderOutput {
    Skip,
    Node(Value),
    Keyed(String, Value),
}

/// Arguments passed to a builder. Mirrors the original engine's
/// `(engine, target_type, enum_values, nullable, property_def, property_schema)`
/// signature; `engine` itself carries no state builders need, so it is
/// omitted here.
pub struct BuilderContext<'a> {
    pub target_type: TargetType,
    pub enum_values: Option<&'a [String]>,
    pub nullable: bool,
    /// The meta-schema's property descriptor template (field-name mapping).
    pub property_def: &'a Value,
    /// The external property's own descriptor (verbatim).
    pub property_schema: &'a Value,
}

pub type BuilderFn = dyn Fn(&BuilderContext) -> EngineResult<BuilderOutput> + Send + Sync;

/// Two-map overlay: instance builders shadow the process-wide default
/// library for one engine instance.
#[derive(Clone)]
pub struct BuilderRegistry {
    default: HashMap<TargetType, Arc<BuilderFn>>,
    instance: HashMap<TargetType, Arc<BuilderFn>>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BuilderRegistry {
    pub fn with_defaults() -> Self {
        let mut default: HashMap<TargetType, Arc<BuilderFn>> = HashMap::new();
        default.insert(TargetType::String, Arc::new(string_builder));
        default.insert(TargetType::Integer, Arc::new(integer_builder));
        default.insert(TargetType::Number, Arc::new(number_builder));
        default.insert(TargetType::Boolean, Arc::new(boolean_builder));
        default.insert(TargetType::PositiveInteger, Arc::new(positive_integer_builder));
        default.insert(TargetType::PositiveNumber, Arc::new(positive_number_builder));
        default.insert(TargetType::Percent, Arc::new(percent_builder));
        default.insert(TargetType::Currency, Arc::new(currency_builder));
        default.insert(TargetType::Date, Arc::new(date_builder));
        default.insert(TargetType::Datetime, Arc::new(datetime_builder));
        default.insert(TargetType::SingleSelect, Arc::new(single_select_builder));
        default.insert(TargetType::MultipleSelect, Arc::new(multiple_select_builder));
        default.insert(TargetType::Array, Arc::new(array_builder));
        default.insert(TargetType::Object, Arc::new(object_builder));
        default.insert(TargetType::ObjectArray, Arc::new(object_array_builder));
        default.insert(TargetType::Instructions, Arc::new(instructions_builder));
        default.insert(TargetType::Skip, Arc::new(skip_builder));

        Self {
            default,
            instance: HashMap::new(),
        }
    }

    pub fn register(&mut self, target_type: TargetType, f: Arc<BuilderFn>) {
        self.instance.insert(target_type, f);
    }

    pub fn resolve(&self, target_type: TargetType) -> Option<&Arc<BuilderFn>> {
        self.instance
            .get(&target_type)
            .or_else(|| self.default.get(&target_type))
    }
}

// --------------------------- Default builders -------------------------------
//
// Every builder is nullable by default, except `object_array` and
// `instructions`, which are non-nullable by design.

fn string_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["string", "null"]})))
}

fn integer_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["integer", "null"]})))
}

fn number_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["number", "null"]})))
}

fn boolean_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["boolean", "null"]})))
}

fn positive_integer_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["integer", "null"], "minimum": 0})))
}

fn positive_number_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["number", "null"], "minimum": 0})))
}

fn percent_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(
        json!({"type": ["number", "null"], "minimum": 0, "maximum": 100}),
    ))
}

fn currency_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({
        "type": ["number", "null"],
        "description": "Currency - must be a number with up to 2 decimal precision"
    })))
}

fn date_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({
        "type": ["string", "null"],
        "format": "date",
        "description": "ISO 8601 date (YYYY-MM-DD)"
    })))
}

fn datetime_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({
        "type": ["string", "null"],
        "format": "date-time",
        "description": "ISO 8601 date-time (YYYY-MM-DDTHH:MM:SSZ)"
    })))
}

const UNCERTAINTY_INSTRUCTION: &str =
    "Select one of the valid enum options if and only if you are absolutely sure of the answer. \
     If you are not sure, please select null";

fn single_select_builder(ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    let mut node = json!({
        "type": ["string", "null"],
        "description": UNCERTAINTY_INSTRUCTION,
    });
    if let Some(values) = ctx.enum_values {
        let mut enum_list: Vec<Value> = values.iter().map(|v| json!(v)).collect();
        enum_list.push(Value::Null);
        node["enum"] = Value::Array(enum_list);
    }
    Ok(BuilderOutput::Node(node))
}

fn multiple_select_builder(ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    let mut items = json!({"type": ["string", "null"]});
    if let Some(values) = ctx.enum_values {
        let mut enum_list: Vec<Value> = values.iter().map(|v| json!(v)).collect();
        enum_list.push(Value::Null);
        items["enum"] = Value::Array(enum_list);
    }
    Ok(BuilderOutput::Node(json!({
        "type": ["array", "null"],
        "items": items,
        "description": UNCERTAINTY_INSTRUCTION,
    })))
}

fn array_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["array", "null"]})))
}

fn object_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Node(json!({"type": ["object", "null"]})))
}

/// Non-nullable array of `{entry, description}` objects. `maxItems` comes
/// from the external `length` field, defaulting to 20 (`pcc_object_array_schema_builder`).
fn object_array_builder(ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    let max_items = ctx
        .property_schema
        .get("length")
        .and_then(Value::as_u64)
        .unwrap_or(20);
    let enum_values: Vec<Value> = ctx
        .enum_values
        .map(|values| values.iter().map(|v| json!(v)).collect())
        .unwrap_or_default();

    Ok(BuilderOutput::Node(json!({
        "type": "array",
        "description": "An array of objects that describe table entries. The 'entry' property is \
            an enum selected for that entry, and the 'description' property is the description \
            relevant for that enum.\nYou must only select enum entries and their descriptions if \
            you are sure you found a clear reference to them in the provided transcript",
        "maxItems": max_items,
        "items": {
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "entry": {"type": "string", "enum": enum_values},
                "description": {"type": "string"}
            },
            "required": ["entry", "description"]
        }
    })))
}

/// Non-nullable string `const` carrying the section/group instruction text
/// as fixed model context; overrides its own JSON-Schema property key to
/// `"{id}.Instructions"` (or `"Instructions"` with no id).
fn instructions_builder(ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    let field_str = |def_field: &str| -> Option<String> {
        let field_name = ctx.property_def.get(def_field)?.as_str()?;
        ctx.property_schema
            .get(field_name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let id_value = field_str("id");
    let title_value = field_str("title");
    let name_value = field_str("name");

    let property_key = match &id_value {
        Some(id) => format!("{id}.Instructions"),
        None => "Instructions".to_string(),
    };

    let const_value = match (&title_value, &name_value) {
        (Some(t), Some(n)) => format!("{t}.{n}"),
        (Some(t), None) => t.clone(),
        (None, Some(n)) => n.clone(),
        (None, None) => String::new(),
    };

    let schema = json!({
        "type": "string",
        "const": const_value,
        "description": "These are instructions that should be used as context for other \
            properties of the same schema object and adjacent schema objects."
    });

    Ok(BuilderOutput::Keyed(property_key, schema))
}

fn skip_builder(_ctx: &BuilderContext) -> EngineResult<BuilderOutput> {
    Ok(BuilderOutput::Skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        target_type: TargetType,
        enum_values: Option<&'a [String]>,
        property_def: &'a Value,
        property_schema: &'a Value,
    ) -> BuilderContext<'a> {
        BuilderContext {
            target_type,
            enum_values,
            nullable: true,
            property_def,
            property_schema,
        }
    }

    #[test]
    fn default_registry_covers_every_target_type() {
        let reg = BuilderRegistry::with_defaults();
        for tt in [
            TargetType::String,
            TargetType::Integer,
            TargetType::Number,
            TargetType::Boolean,
            TargetType::PositiveInteger,
            TargetType::PositiveNumber,
            TargetType::Percent,
            TargetType::Currency,
            TargetType::Date,
            TargetType::Datetime,
            TargetType::SingleSelect,
            TargetType::MultipleSelect,
            TargetType::Array,
            TargetType::Object,
            TargetType::ObjectArray,
            TargetType::Instructions,
            TargetType::Skip,
        ] {
            assert!(reg.resolve(tt).is_some(), "missing builder for {tt}");
        }
    }

    #[test]
    fn single_select_enum_includes_null_terminal() {
        let empty = json!({});
        let values = vec!["High".to_string(), "Low".to_string()];
        let c = ctx(TargetType::SingleSelect, Some(&values), &empty, &empty);
        match single_select_builder(&c).unwrap() {
            BuilderOutput::Node(node) => {
                assert_eq!(node["enum"], json!(["High", "Low", null]));
            }
            _ => panic!("expected Node"),
        }
    }

    #[test]
    fn object_array_is_non_nullable_with_max_items_default() {
        let empty = json!({});
        let values = vec!["a".to_string()];
        let c = ctx(TargetType::ObjectArray, Some(&values), &empty, &empty);
        match object_array_builder(&c).unwrap() {
            BuilderOutput::Node(node) => {
                assert_eq!(node["type"], json!("array"));
                assert_eq!(node["maxItems"], json!(20));
            }
            _ => panic!("expected Node"),
        }
    }

    #[test]
    fn instructions_overrides_key_with_id_suffix() {
        let property_def = json!({"id": "questionNumber", "title": "questionTitle", "name": "questionText"});
        let property_schema = json!({
            "questionNumber": "1",
            "questionTitle": "Section A Instructions",
            "questionText": "Please read carefully"
        });
        let c = ctx(TargetType::Instructions, None, &property_def, &property_schema);
        match instructions_builder(&c).unwrap() {
            BuilderOutput::Keyed(key, node) => {
                assert_eq!(key, "1.Instructions");
                assert_eq!(node["const"], json!("Section A Instructions.Please read carefully"));
            }
            _ => panic!("expected Keyed"),
        }
    }

    #[test]
    fn instructions_without_id_uses_bare_key() {
        let property_def = json!({"title": "title", "name": "name"});
        let property_schema = json!({"title": "Intro", "name": "text"});
        let c = ctx(TargetType::Instructions, None, &property_def, &property_schema);
        match instructions_builder(&c).unwrap() {
            BuilderOutput::Keyed(key, _) => assert_eq!(key, "Instructions"),
            _ => panic!("expected Keyed"),
        }
    }

    #[test]
    fn skip_builder_signals_skip() {
        let empty = json!({});
        let c = ctx(TargetType::Skip, None, &empty, &empty);
        assert!(matches!(skip_builder(&c).unwrap(), BuilderOutput::Skip));
    }
}
