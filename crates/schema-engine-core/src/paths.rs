//! Shared path arithmetic between the validator's semantic pass and the
//! reverse mapper: both need to walk a response document to a bottom
//! field's value, and `enrich_schema` needs to walk the mirror-image path
//! through the generated JSON Schema.
//!
//! A field's document path and schema path share the same key sequence —
//! `body_key`, then (for nested tables only) its `level_keys`, then its
//! `property_key` — because the generated schema nests exactly the way a
//! conforming response document will. The schema path additionally steps
//! through a `"properties"` hop between each key; the document does not.

use serde_json::Value;

use crate::types::{FieldMetadata, RegisteredTable};

/// The ordered key sequence identifying one field's value, shared by both
/// the response document and (with `"properties"` hops inserted) the
/// generated JSON Schema.
pub fn field_path(table: &RegisteredTable, field: &FieldMetadata) -> Vec<String> {
    let mut path = vec![table.body_key.clone()];
    if table.is_nested {
        path.extend(field.level_keys.iter().cloned());
    }
    path.push(field.property_key.clone());
    path
}

/// Walks a response document by a field path. Returns `None` if any
/// intermediate segment is absent (structural validation already required
/// every declared property, so a `None` here means the path itself doesn't
/// describe this document — callers treat it the same as a null value).
pub fn get_value_at_path<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut cur = doc;
    for segment in path {
        cur = cur.get(segment)?;
    }
    Some(cur)
}

/// Walks the generated JSON Schema by a field path, stepping through
/// `"properties"` at each hop, returning a mutable reference to the field's
/// schema node.
pub fn get_schema_node_mut<'a>(schema: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut cur = schema;
    for segment in path {
        cur = cur.get_mut("properties")?.get_mut(segment)?;
    }
    Some(cur)
}

/// Dotted-path rendering for error messages.
pub fn dotted(path: &[String]) -> String {
    path.join(".")
}
