//! Core data types shared across the engine: target types, field metadata,
//! and the registered-table record.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of target types the default builder/validator libraries
/// recognize. An external field's type always resolves to exactly one of
/// these via the meta-schema's `type_constraints` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    String,
    Integer,
    Number,
    Boolean,
    PositiveInteger,
    PositiveNumber,
    Percent,
    Currency,
    Date,
    Datetime,
    SingleSelect,
    MultipleSelect,
    Array,
    Object,
    ObjectArray,
    Instructions,
    Skip,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::String => "string",
            TargetType::Integer => "integer",
            TargetType::Number => "number",
            TargetType::Boolean => "boolean",
            TargetType::PositiveInteger => "positive_integer",
            TargetType::PositiveNumber => "positive_number",
            TargetType::Percent => "percent",
            TargetType::Currency => "currency",
            TargetType::Date => "date",
            TargetType::Datetime => "datetime",
            TargetType::SingleSelect => "single_select",
            TargetType::MultipleSelect => "multiple_select",
            TargetType::Array => "array",
            TargetType::Object => "object",
            TargetType::ObjectArray => "object_array",
            TargetType::Instructions => "instructions",
            TargetType::Skip => "skip",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(TargetType::String),
            "integer" => Ok(TargetType::Integer),
            "number" => Ok(TargetType::Number),
            "boolean" => Ok(TargetType::Boolean),
            "positive_integer" => Ok(TargetType::PositiveInteger),
            "positive_number" => Ok(TargetType::PositiveNumber),
            "percent" => Ok(TargetType::Percent),
            "currency" => Ok(TargetType::Currency),
            "date" => Ok(TargetType::Date),
            "datetime" => Ok(TargetType::Datetime),
            "single_select" => Ok(TargetType::SingleSelect),
            "multiple_select" => Ok(TargetType::MultipleSelect),
            "array" => Ok(TargetType::Array),
            "object" => Ok(TargetType::Object),
            "object_array" => Ok(TargetType::ObjectArray),
            "instructions" => Ok(TargetType::Instructions),
            "skip" => Ok(TargetType::Skip),
            other => Err(format!("unrecognized target type '{other}'")),
        }
    }
}

/// One non-skipped bottom field, recorded in a table's field index in
/// document order.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    /// The external property's key.
    pub key: String,
    /// The external property's optional id.
    pub id: Option<String>,
    /// The external property's optional name.
    pub name: Option<String>,
    /// The external property's optional title.
    pub title: Option<String>,
    /// Path segments through containers leading to this field, plus the
    /// innermost properties-container name. Used both for response-value
    /// lookup and as the grouping basis in reverse mapping.
    pub level_keys: Vec<String>,
    /// The resolved target type driving builder/validator dispatch.
    pub target_type: TargetType,
    /// The external type string as given, driving reverse-formatter dispatch.
    pub original_schema_type: String,
    /// Verbatim copy of the external property descriptor.
    pub field_schema: Value,
    /// The property key used in the generated JSON Schema. May differ from
    /// `name` when a builder returns a key override.
    pub property_key: String,
}

/// One registered table: the external schema it was built from, the
/// generated JSON Schema, its field index, and per-container item counts.
#[derive(Debug, Clone)]
pub struct RegisteredTable {
    pub external_schema: Value,
    pub json_schema: Value,
    pub field_index: Vec<FieldMetadata>,
    pub table_name: String,
    pub container_counts_by_name: HashMap<String, usize>,
    /// The single root content key: either the meta-schema's outermost
    /// `container_name` (nested tables) or its `properties_name` (flat
    /// tables). Always present as a property directly under the generated
    /// schema's root, alongside `table_name`.
    pub body_key: String,
    /// Whether this table was converted via the nested container walk
    /// (`true`) or the flat properties walk (`false`).
    pub is_nested: bool,
    /// The external document's value at the meta-schema's optional
    /// `schema_id`-named field, if the meta-schema declares one. Used as the
    /// reverse-mapped payload's `schema_id` header when present.
    pub external_schema_id: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_round_trips_through_str() {
        for tt in [
            TargetType::String,
            TargetType::SingleSelect,
            TargetType::ObjectArray,
            TargetType::Instructions,
            TargetType::Skip,
        ] {
            let s = tt.as_str();
            let parsed: TargetType = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn unrecognized_target_type_errors() {
        assert!("not_a_type".parse::<TargetType>().is_err());
    }
}
