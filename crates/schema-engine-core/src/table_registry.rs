//! Table registry — bounded store mapping integer table-id and table-name to
//! one registered table record.
//!
//! Grounded in `SchemaConverterEngine.register_table`/`_allocate_table_id`/
//! `_resolve_table_id`/`unregister_table`/`clear` in
//! `original_source/backend/schema_converter_engine.py`.

use std::collections::HashMap;

use serde_json::Value;

use crate::builders::BuilderRegistry;
use crate::config::EngineConfig;
use crate::converter;
use crate::error::{EngineError, EngineResult};
use crate::options::OptionsExtractorRegistry;
use crate::types::RegisteredTable;

/// Either half of a table lookup key a caller may supply.
#[derive(Debug, Clone)]
pub enum TableIdentifier {
    Id(i64),
    Name(String),
}

impl From<i64> for TableIdentifier {
    fn from(id: i64) -> Self {
        TableIdentifier::Id(id)
    }
}

impl From<&str> for TableIdentifier {
    fn from(name: &str) -> Self {
        TableIdentifier::Name(name.to_string())
    }
}

impl From<String> for TableIdentifier {
    fn from(name: String) -> Self {
        TableIdentifier::Name(name)
    }
}

/// The bounded table store itself. Id allocation is a monotonic high-water
/// mark: auto-allocation never reuses an id, even one freed by
/// `unregister`, but a caller supplying an explicit id may reuse one.
#[derive(Default)]
pub struct TableStore {
    tables: HashMap<i64, RegisteredTable>,
    names: HashMap<String, i64>,
    high_water_mark: i64,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, identifier: &TableIdentifier) -> EngineResult<i64> {
        match identifier {
            TableIdentifier::Id(id) => {
                if self.tables.contains_key(id) {
                    Ok(*id)
                } else {
                    Err(EngineError::UnknownTable {
                        identifier: id.to_string(),
                    })
                }
            }
            TableIdentifier::Name(name) => self.names.get(name).copied().ok_or_else(|| EngineError::UnknownTable {
                identifier: name.clone(),
            }),
        }
    }

    pub fn get(&self, identifier: &TableIdentifier) -> EngineResult<&RegisteredTable> {
        let id = self.resolve(identifier)?;
        Ok(self.tables.get(&id).expect("resolve guarantees presence"))
    }

    /// Registers (or re-registers) a table. `table_id` of `None` auto-allocates
    /// the next id strictly greater than the high-water mark.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        table_id: Option<i64>,
        external_schema: &Value,
        meta_schema: &Value,
        config: &EngineConfig,
        builders: &BuilderRegistry,
        options_extractors: &OptionsExtractorRegistry,
    ) -> EngineResult<(i64, String)> {
        let is_new = match table_id {
            Some(id) => !self.tables.contains_key(&id),
            None => true,
        };

        if is_new && self.tables.len() >= config.max_tables {
            return Err(EngineError::Registration {
                message: format!("table cap reached: at most {} tables may be registered", config.max_tables),
            });
        }

        let id = match table_id {
            Some(id) => id,
            None => {
                let next = self.high_water_mark + 1;
                self.high_water_mark = next;
                next
            }
        };

        let output = converter::convert(meta_schema, external_schema, config, builders, options_extractors)?;

        if let Some(old) = self.tables.get(&id) {
            if old.table_name != output.table_name {
                self.names.remove(&old.table_name);
            }
            tracing::info!(
                table_id = id,
                old_table_name = %old.table_name,
                new_table_name = %output.table_name,
                "re-registering table; replacing previous schema"
            );
        }

        if let Some(existing_id) = self.names.get(&output.table_name) {
            if *existing_id != id {
                return Err(EngineError::Registration {
                    message: format!(
                        "table name '{}' is already registered under id {existing_id}",
                        output.table_name
                    ),
                });
            }
        }

        let table_name = output.table_name.clone();
        self.names.insert(table_name.clone(), id);
        self.tables.insert(
            id,
            RegisteredTable {
                external_schema: external_schema.clone(),
                json_schema: output.json_schema,
                field_index: output.field_index,
                table_name: table_name.clone(),
                container_counts_by_name: output.container_counts,
                body_key: output.body_key,
                is_nested: output.is_nested,
                external_schema_id: output.external_schema_id,
            },
        );

        Ok((id, table_name))
    }

    pub fn unregister(&mut self, id: i64) {
        if let Some(record) = self.tables.remove(&id) {
            self.names.remove(&record.table_name);
        }
    }

    pub fn list_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn list_info(&self) -> Vec<(i64, String)> {
        self.list_ids()
            .into_iter()
            .map(|id| (id, self.tables[&id].table_name.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.names.clear();
        self.high_water_mark = 0;
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut RegisteredTable> {
        self.tables.get_mut(&id)
    }
}
