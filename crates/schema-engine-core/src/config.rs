//! Engine-instance-wide configuration.

use serde::{Deserialize, Serialize};

/// Default cap on the number of tables a single engine instance may hold
/// registered at once.
pub const DEFAULT_MAX_TABLES: usize = 1000;

/// Default formatter set consulted by `reverse_map` when a call does not
/// name one explicitly.
pub const DEFAULT_FORMATTER_SET: &str = "pcc-ui";

/// Default CSV-column key prefix applied by `table_registry::enrich_schema`.
pub const DEFAULT_ENRICH_KEY_PREFIX: &str = "Cust_";

/// Engine-wide configuration.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `max-tables`,
/// `use-id-in-property-name`). This naming convention is part of the public
/// API contract for config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    /// When `true`, bottom-level property keys are suffixed with the
    /// external field's `id` (e.g. `"123.Pain Level"`). Default: `true`.
    pub use_id_in_property_name: bool,
    /// Maximum number of tables this engine instance may hold registered
    /// at once. Default: 1000.
    pub max_tables: usize,
    /// Formatter set consulted by `reverse_map` when the caller does not
    /// name one. Default: `"pcc-ui"`.
    pub default_formatter_set: String,
    /// Maximum nesting depth the converter and meta-schema interpreter will
    /// descend into recursive `container`/`object` definitions before
    /// raising a meta-schema shape error. Default: 5.
    pub max_nesting_levels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_id_in_property_name: true,
            max_tables: DEFAULT_MAX_TABLES,
            default_formatter_set: DEFAULT_FORMATTER_SET.to_string(),
            max_nesting_levels: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_serde_round_trip() {
        let cfg = EngineConfig {
            use_id_in_property_name: false,
            max_tables: 42,
            default_formatter_set: "default".to_string(),
            max_nesting_levels: 8,
        };

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"use-id-in-property-name\""));
        assert!(json.contains("\"max-tables\""));
        assert!(json.contains("\"default-formatter-set\""));

        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, cfg);
    }

    #[test]
    fn defaults_when_fields_omitted() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!(cfg.use_id_in_property_name);
        assert_eq!(cfg.max_tables, DEFAULT_MAX_TABLES);
        assert_eq!(cfg.default_formatter_set, "pcc-ui");
    }
}
