//! Typed row schemas derived from the dictionary, and the per-table cache.

use crate::miner::client::{DictionaryRow, MinerClient, SqlValue};
use crate::source::table::TableId;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Semantic column type resolved from the dictionary's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float64,
    String,
    Timestamp,
}

impl ColumnType {
    /// Resolves a declared data type plus scale/precision into a semantic
    /// type. A NUMBER with positive scale or undeclared precision is a
    /// double; otherwise the smallest signed width covering the precision.
    /// Character types are strings, DATE/TIMESTAMP variants are timestamps,
    /// anything unrecognized defaults to string.
    pub fn resolve(data_type: &str, data_scale: u32, data_precision: u32) -> ColumnType {
        let data_type = if data_type.contains("TIMESTAMP") {
            "TIMESTAMP"
        } else {
            data_type
        };

        match data_type {
            "NUMBER" => {
                if data_scale > 0 || data_precision == 0 {
                    ColumnType::Float64
                } else {
                    match data_precision {
                        1..=2 => ColumnType::Int8,
                        3..=4 => ColumnType::Int16,
                        5..=9 => ColumnType::Int32,
                        _ => ColumnType::Int64,
                    }
                }
            }
            "CHAR" | "VARCHAR" | "VARCHAR2" | "NCHAR" | "NVARCHAR" | "NVARCHAR2" | "LONG"
            | "CLOB" => ColumnType::String,
            "DATE" | "TIMESTAMP" => ColumnType::Timestamp,
            _ => ColumnType::String,
        }
    }

    /// Converts a raw string recovered from redo text into this type.
    pub fn convert(&self, column: &str, raw: &str) -> Result<FieldValue> {
        let conversion = |message: String| Error::TypeConversion {
            column: column.to_string(),
            value: raw.to_string(),
            message,
        };

        match self {
            ColumnType::Int8 => raw
                .parse::<i8>()
                .map(FieldValue::Int8)
                .map_err(|e| conversion(e.to_string())),
            ColumnType::Int16 => raw
                .parse::<i16>()
                .map(FieldValue::Int16)
                .map_err(|e| conversion(e.to_string())),
            ColumnType::Int32 => raw
                .parse::<i32>()
                .map(FieldValue::Int32)
                .map_err(|e| conversion(e.to_string())),
            ColumnType::Int64 => raw
                .parse::<i64>()
                .map(FieldValue::Int64)
                .map_err(|e| conversion(e.to_string())),
            ColumnType::Float64 => raw
                .parse::<f64>()
                .map(FieldValue::Float64)
                .map_err(|e| conversion(e.to_string())),
            ColumnType::String => Ok(FieldValue::String(raw.to_string())),
            ColumnType::Timestamp => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(FieldValue::Timestamp)
                .map_err(|e| conversion(e.to_string())),
        }
    }
}

/// A typed column value for a before or after image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

/// One column of a table's row schema.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Primary/unique key flags from the dictionary, carried for hosts that
    /// derive record keys; not consumed by the mining core.
    pub primary_key: bool,
    pub unique_key: bool,
}

/// Ordered column schema for one table, shared by the before and after image
/// of every event produced for that table.
#[derive(Debug, Clone)]
pub struct RowSchema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl RowSchema {
    pub fn from_dictionary(rows: Vec<DictionaryRow>) -> Self {
        let mut columns = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            let column_type = ColumnType::resolve(&row.data_type, row.data_scale, row.data_precision);
            index.insert(row.column_name.clone(), columns.len());
            columns.push(Column {
                name: row.column_name,
                column_type,
                nullable: row.nullable,
                primary_key: row.primary_key,
                unique_key: row.unique_key,
            });
        }
        Self { columns, index }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|i| &self.columns[*i])
    }

    /// Binds a parsed string image to this schema, converting every value to
    /// its dictionary-declared type. Unknown columns and unconvertible values
    /// are hard errors.
    pub fn bind(&self, image: &[(String, Option<String>)]) -> Result<RowImage> {
        let mut entries = Vec::with_capacity(image.len());
        for (name, raw) in image {
            let column = self.column(name).ok_or_else(|| Error::TypeConversion {
                column: name.clone(),
                value: raw.clone().unwrap_or_default(),
                message: "column not present in dictionary schema".to_string(),
            })?;
            let value = match raw {
                None => FieldValue::Null,
                Some(raw) => column.column_type.convert(name, raw)?,
            };
            entries.push((name.clone(), value));
        }
        Ok(RowImage { entries })
    }
}

/// Typed column values in statement declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowImage {
    entries: Vec<(String, FieldValue)>,
}

impl RowImage {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, FieldValue)] {
        &self.entries
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            map.insert(
                name.clone(),
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Per-table dictionary schema cache.
///
/// Entries never expire on their own; schema drift after a DDL change is only
/// handled through an explicit [`SchemaCache::invalidate`] call.
pub struct SchemaCache {
    schemas: HashMap<TableId, Arc<RowSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    pub async fn get_or_build(
        &mut self,
        table: &TableId,
        client: &Arc<dyn MinerClient>,
        dictionary_sql: &str,
    ) -> Result<Arc<RowSchema>> {
        if let Some(schema) = self.schemas.get(table) {
            trace!(table = %table, "row schema retrieved from cache");
            return Ok(schema.clone());
        }

        let params = [
            SqlValue::from_opt(table.container()),
            SqlValue::from_opt(table.owner()),
            SqlValue::from_opt(table.table()),
        ];
        let rows = client.query_dictionary(dictionary_sql, &params).await?;
        if rows.is_empty() {
            return Err(Error::Database(format!(
                "dictionary returned no columns for {}",
                table
            )));
        }

        let schema = Arc::new(RowSchema::from_dictionary(rows));
        debug!(table = %table, columns = schema.columns().len(), "row schema created and cached");
        self.schemas.insert(table.clone(), schema.clone());
        Ok(schema)
    }

    pub fn invalidate(&mut self, table: &TableId) {
        if self.schemas.remove(table).is_some() {
            debug!(table = %table, "row schema invalidated");
        }
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
