//! Reverse-formatter registry — maps (formatter-set name, original
//! external type) to a function that rewrites one model-produced value into
//! one or more external-field descriptors.
//!
//! Grounded in `pcc_assessment_schema.py`'s `"default"` (wire) and
//! `"pcc-ui"` formatter sets.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::EngineResult;
use crate::sanitize::sanitize;
use crate::types::FieldMetadata;

pub const DEFAULT_SET: &str = "default";
pub const PCC_UI_SET: &str = "pcc-ui";

/// Arguments passed to a reverse formatter.
pub struct FormatterContext<'a> {
    pub field: &'a FieldMetadata,
    pub model_value: &'a Value,
    pub table_name: &'a str,
}

/// A formatter returns an ordered list of descriptors. Each descriptor is a
/// JSON object carrying at minimum `key`, `type`, and `value`, plus optional
/// `_storage_key` / `_display_key` used when the reverse mapper packs
/// descriptors into an object.
pub type FormatterFn = dyn Fn(&FormatterContext) -> EngineResult<Vec<Value>> + Send + Sync;

#[derive(Clone, Default)]
pub struct FormatterRegistry {
    default: HashMap<(String, String), Arc<FormatterFn>>,
    instance: HashMap<(String, String), Arc<FormatterFn>>,
}

impl FormatterRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        register_default_set(&mut reg);
        register_pcc_ui_set(&mut reg);
        reg
    }

    pub fn register(&mut self, formatter_set: impl Into<String>, original_type: impl Into<String>, f: Arc<FormatterFn>) {
        self.instance.insert((formatter_set.into(), original_type.into()), f);
    }

    /// Resolves `(formatter_set, original_type)`, falling back to
    /// `(formatter_set, "default")` when no exact match exists. Instance
    /// registrations are consulted before the process-wide library at each
    /// step.
    pub fn resolve(&self, formatter_set: &str, original_type: &str) -> Option<&Arc<FormatterFn>> {
        let exact = (formatter_set.to_string(), original_type.to_string());
        if let Some(f) = self.instance.get(&exact).or_else(|| self.default.get(&exact)) {
            return Some(f);
        }
        let fallback = (formatter_set.to_string(), "default".to_string());
        self.instance.get(&fallback).or_else(|| self.default.get(&fallback))
    }

    fn insert_default(&mut self, set: &str, original_type: &str, f: Arc<FormatterFn>) {
        self.default.insert((set.to_string(), original_type.to_string()), f);
    }
}

fn descriptor(key: &str, type_: &str, value: Value, html_type: Option<&str>, storage_key: Option<String>, display_key: Option<String>) -> Value {
    let mut map = Map::new();
    map.insert("key".to_string(), json!(key));
    map.insert("type".to_string(), json!(type_));
    map.insert("value".to_string(), value);
    if let Some(ht) = html_type {
        map.insert("html_type".to_string(), json!(ht));
    }
    if let Some(sk) = storage_key {
        map.insert("_storage_key".to_string(), json!(sk));
    }
    if let Some(dk) = display_key {
        map.insert("_display_key".to_string(), json!(dk));
    }
    Value::Object(map)
}

fn response_options(field: &FieldMetadata) -> Vec<(&str, &Value)> {
    field
        .field_schema
        .get("responseOptions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|opt| Some((opt.get("responseText")?.as_str()?, opt.get("responseValue")?)))
        .collect()
}

// --------------------------------- "default" (wire) set ---------------------

fn register_default_set(reg: &mut FormatterRegistry) {
    reg.insert_default(DEFAULT_SET, "txt", Arc::new(|ctx| basic_default(ctx, "text")));
    reg.insert_default(DEFAULT_SET, "diag", Arc::new(|ctx| basic_default(ctx, "text")));
    reg.insert_default(DEFAULT_SET, "dte", Arc::new(|ctx| basic_default(ctx, "date")));
    reg.insert_default(DEFAULT_SET, "dttm", Arc::new(|ctx| basic_default(ctx, "datetime")));
    reg.insert_default(DEFAULT_SET, "num", Arc::new(|ctx| basic_default(ctx, "number")));
    reg.insert_default(DEFAULT_SET, "numde", Arc::new(|ctx| basic_default(ctx, "number")));
    reg.insert_default(DEFAULT_SET, "chk", Arc::new(checkbox_default));
    reg.insert_default(DEFAULT_SET, "rad", Arc::new(|ctx| resolved_single_default(ctx, "radio")));
    reg.insert_default(DEFAULT_SET, "radh", Arc::new(|ctx| resolved_single_default(ctx, "radio")));
    reg.insert_default(DEFAULT_SET, "cmb", Arc::new(|ctx| resolved_single_default(ctx, "combo")));
    reg.insert_default(DEFAULT_SET, "hck", Arc::new(|ctx| resolved_single_default(ctx, "hck")));
    reg.insert_default(DEFAULT_SET, "mcs", Arc::new(multi_select_default));
    reg.insert_default(DEFAULT_SET, "mcsh", Arc::new(multi_select_default));
    reg.insert_default(DEFAULT_SET, "gbdy", Arc::new(object_array_default));
    reg.insert_default(DEFAULT_SET, "inst", Arc::new(|_ctx| Ok(vec![])));
}

fn basic_default(ctx: &FormatterContext, wire_type: &str) -> EngineResult<Vec<Value>> {
    Ok(vec![descriptor(&ctx.field.key, wire_type, ctx.model_value.clone(), None, None, None)])
}

/// Checkboxes convert `true -> "1"`, other/false -> `"null"`.
fn checkbox_default(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let value = if ctx.model_value == &json!(true) { "1" } else { "null" };
    Ok(vec![descriptor(&ctx.field.key, "checkbox", json!(value), None, None, None)])
}

/// Radio/combo/hck: resolve the model's response text back to the field's
/// own `responseValue`; unresolved or null values pass through unchanged.
fn resolved_single_default(ctx: &FormatterContext, wire_type: &str) -> EngineResult<Vec<Value>> {
    if ctx.model_value.is_null() {
        return Ok(vec![descriptor(&ctx.field.key, wire_type, Value::Null, None, None, None)]);
    }
    let Some(text) = ctx.model_value.as_str() else {
        return Ok(vec![descriptor(&ctx.field.key, wire_type, ctx.model_value.clone(), None, None, None)]);
    };
    let resolved = response_options(ctx.field)
        .into_iter()
        .find(|(response_text, _)| *response_text == text)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| ctx.model_value.clone());
    Ok(vec![descriptor(&ctx.field.key, wire_type, resolved, None, None, None)])
}

fn multi_select_default(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let Some(items) = ctx.model_value.as_array() else {
        return Ok(vec![descriptor(&ctx.field.key, "multi", Value::Null, None, None, None)]);
    };
    let options = response_options(ctx.field);
    let resolved: Vec<Value> = items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|text| options.iter().find(|(t, _)| *t == text).map(|(_, v)| v.clone()))
        .collect();
    let value = if resolved.is_empty() { Value::Null } else { Value::Array(resolved) };
    Ok(vec![descriptor(&ctx.field.key, "multi", value, None, None, None)])
}

/// Object-array (`gbdy`): emits one descriptor whose value is a list of
/// `{aN_key: entry_value, bN_key: description}` rows.
fn object_array_default(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let Some(items) = ctx.model_value.as_array() else {
        return Ok(vec![]);
    };
    let options = response_options(ctx.field);
    let key = &ctx.field.key;

    let rows: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let entry_text = item.get("entry").and_then(Value::as_str).unwrap_or("");
            let description = item.get("description").and_then(Value::as_str).unwrap_or("");
            let entry_value = options
                .iter()
                .find(|(t, _)| *t == entry_text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| json!(""));
            json!({
                format!("a{idx}_{key}"): entry_value,
                format!("b{idx}_{key}"): description,
            })
        })
        .collect();

    Ok(vec![descriptor(key, "table", Value::Array(rows), None, None, None)])
}

// --------------------------------- "pcc-ui" set ------------------------------

fn register_pcc_ui_set(reg: &mut FormatterRegistry) {
    reg.insert_default(PCC_UI_SET, "txt", Arc::new(pcc_ui_basic));
    reg.insert_default(PCC_UI_SET, "diag", Arc::new(pcc_ui_basic));
    reg.insert_default(PCC_UI_SET, "dte", Arc::new(pcc_ui_basic));
    reg.insert_default(PCC_UI_SET, "dttm", Arc::new(pcc_ui_basic));
    reg.insert_default(PCC_UI_SET, "hck", Arc::new(pcc_ui_basic));
    reg.insert_default(PCC_UI_SET, "num", Arc::new(pcc_ui_number));
    reg.insert_default(PCC_UI_SET, "numde", Arc::new(pcc_ui_number));
    reg.insert_default(PCC_UI_SET, "chk", Arc::new(pcc_ui_checkbox));
    reg.insert_default(PCC_UI_SET, "rad", Arc::new(pcc_ui_single_select));
    reg.insert_default(PCC_UI_SET, "radh", Arc::new(pcc_ui_single_select));
    reg.insert_default(PCC_UI_SET, "cmb", Arc::new(pcc_ui_single_select));
    reg.insert_default(PCC_UI_SET, "mcs", Arc::new(pcc_ui_multi_select));
    reg.insert_default(PCC_UI_SET, "mcsh", Arc::new(pcc_ui_multi_select));
    reg.insert_default(PCC_UI_SET, "gbdy", Arc::new(pcc_ui_object_array));
    reg.insert_default(PCC_UI_SET, "inst", Arc::new(|_ctx| Ok(vec![])));
}

/// Closed html-type mapping, grounded in PCC's `get_html_type`.
fn html_type(original_type: &str, field_schema: &Value) -> &'static str {
    match original_type {
        "rad" | "radh" | "hck" => "radio_buttons",
        "cmb" => "combobox",
        "chk" => "checkbox_single",
        "mcs" | "mcsh" => "checkbox_multi",
        "txt" | "diag" => {
            let length = field_schema.get("length").and_then(Value::as_u64).unwrap_or(0);
            if length <= 50 {
                "textarea_singleline"
            } else {
                "textarea_multiline"
            }
        }
        "dte" | "dttm" => "text",
        "num" | "numde" => "textarea_singleline",
        "gbdy_entry" => "combobox",
        "gbdy_description" => "textarea_singleline",
        _ => "text",
    }
}

fn pcc_ui_basic(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let ht = html_type(&ctx.field.original_schema_type, &ctx.field.field_schema);
    Ok(vec![descriptor(
        &ctx.field.key,
        &ctx.field.original_schema_type,
        ctx.model_value.clone(),
        Some(ht),
        None,
        None,
    )])
}

fn pcc_ui_number(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let ht = html_type(&ctx.field.original_schema_type, &ctx.field.field_schema);
    let rendered = match ctx.model_value {
        Value::Number(n) => json!(n.to_string()),
        Value::Null => Value::Null,
        other => other.clone(),
    };
    Ok(vec![descriptor(&ctx.field.key, &ctx.field.original_schema_type, rendered, Some(ht), None, None)])
}

fn pcc_ui_checkbox(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let ht = html_type("chk", &ctx.field.field_schema);
    let value = match ctx.model_value {
        Value::Bool(true) => json!("1"),
        Value::Bool(false) => json!("null"),
        other => other.clone(),
    };
    Ok(vec![descriptor(&ctx.field.key, "chk", value, Some(ht), None, None)])
}

fn pcc_ui_single_select(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let original_type = &ctx.field.original_schema_type;
    let ht = html_type(original_type, &ctx.field.field_schema);
    if ctx.model_value.is_null() {
        return Ok(vec![descriptor(&ctx.field.key, original_type, Value::Null, Some(ht), None, None)]);
    }
    let model_text = ctx.model_value.as_str().unwrap_or_default();
    let resolved = response_options(ctx.field)
        .into_iter()
        .find(|(text, _)| sanitize(text) == model_text)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| ctx.model_value.clone());
    Ok(vec![descriptor(&ctx.field.key, original_type, resolved, Some(ht), None, None)])
}

/// Unpacks each selected option into its own descriptor with `_storage_key`
/// suffix `__{i}`.
fn pcc_ui_multi_select(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let original_type = &ctx.field.original_schema_type;
    let ht = html_type(original_type, &ctx.field.field_schema);
    let base_key = &ctx.field.key;

    let Some(items) = ctx.model_value.as_array() else {
        return Ok(vec![descriptor(base_key, original_type, Value::Null, Some(ht), None, None)]);
    };

    let options = response_options(ctx.field);
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let text = item.as_str().unwrap_or_default();
        let resolved = options
            .iter()
            .find(|(response_text, _)| sanitize(response_text) == text)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| item.clone());
        out.push(descriptor(
            base_key,
            original_type,
            resolved,
            Some(ht),
            Some(format!("{base_key}__{i}")),
            None,
        ));
    }
    Ok(out)
}

/// Unpacks object-array rows into paired `aN_/bN_` descriptors, grounded in
/// `pcc_ui_object_array_formatter`.
fn pcc_ui_object_array(ctx: &FormatterContext) -> EngineResult<Vec<Value>> {
    let Some(items) = ctx.model_value.as_array() else {
        return Ok(vec![]);
    };
    let original_type = &ctx.field.original_schema_type;
    let base_key = &ctx.field.key;
    let options = response_options(ctx.field);
    let entry_ht = html_type("gbdy_entry", &ctx.field.field_schema);
    let description_ht = html_type("gbdy_description", &ctx.field.field_schema);

    let mut out = Vec::with_capacity(items.len() * 2);
    for (idx, item) in items.iter().enumerate() {
        let entry_text = item.get("entry").and_then(Value::as_str).unwrap_or("");
        let description_text = item.get("description").and_then(Value::as_str).unwrap_or("");
        let entry_value = options
            .iter()
            .find(|(text, _)| sanitize(text) == entry_text)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| json!(""));

        out.push(descriptor(
            base_key,
            original_type,
            entry_value,
            Some(entry_ht),
            Some(format!("a{idx}_{base_key}")),
            Some(format!("a{idx}_{base_key}")),
        ));
        out.push(descriptor(
            base_key,
            original_type,
            json!(description_text),
            Some(description_ht),
            Some(format!("b{idx}_{base_key}")),
            Some(format!("b{idx}_{base_key}")),
        ));
    }
    Ok(out)
}
