// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Datatable wire model and the metadata pass that classifies columns.
//!
//! Column ids produced by the host follow `col-<level>-<aggId>`. They are parsed
//! into [`ColumnId`] once, here, and every other module works with the typed
//! pair.

use crate::error::{TableError, TableResult};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub type Row = serde_json::Map<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSchema {
    Vertex,
    Field,
    Metric,
    Grouping,
    Time,
    #[serde(rename = "dmetric")]
    DrilldownMetric,
    #[serde(rename = "dbucket")]
    DrilldownBucket,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId {
    pub level: u32,
    pub agg_id: String,
}
impl ColumnId {
    pub fn new(level: u32, agg_id: impl Into<String>) -> Self {
        Self {
            level,
            agg_id: agg_id.into(),
        }
    }
    pub fn parse(raw: &str) -> TableResult<Self> {
        let malformed = || TableError::MalformedColumnId { id: raw.to_string() };
        let rest = raw.strip_prefix("col-").ok_or_else(malformed)?;
        let (level, agg_id) = rest.split_once('-').ok_or_else(malformed)?;
        if level.is_empty() || !level.bytes().all(|b| b.is_ascii_digit()) || agg_id.is_empty() {
            return Err(malformed());
        }
        let level = level.parse::<u32>().map_err(|_| malformed())?;
        Ok(Self::new(level, agg_id))
    }
    /// The composite key under which rows store this column's values.
    pub fn key(&self) -> String {
        self.to_string()
    }
    pub fn read<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get(&self.key())
    }
    /// Like [`ColumnId::read`], with absent cells read as null.
    pub fn value<'r>(&self, row: &'r Row) -> &'r Value {
        self.read(row).unwrap_or(&NULL)
    }
}
impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col-{}-{}", self.level, self.agg_id)
    }
}
impl FromStr for ColumnId {
    type Err = TableError;
    fn from_str(s: &str) -> TableResult<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceParams {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub schema: ColumnSchema,
    #[serde(rename = "type", default)]
    pub agg_type: Option<String>,
    #[serde(default)]
    pub params: Value,
}
impl SourceParams {
    pub fn field(&self) -> Option<&str> {
        self.params.get("field").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(rename = "sourceParams", default)]
    pub source_params: Option<SourceParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawColumn {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub meta: ColumnMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggConfig {
    pub id: String,
    pub schema: ColumnSchema,
    #[serde(rename = "type", default)]
    pub agg_type: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Value,
}
fn enabled_by_default() -> bool {
    true
}

/// One query response as handed over by the host.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Datatable {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub aggs: Vec<AggConfig>,
}
impl Datatable {
    pub fn from_json(value: &Value) -> serde_json::Result<Self> {
        Datatable::deserialize(value)
    }
    pub fn agg_id_for(&self, schema: ColumnSchema) -> Option<&str> {
        self.aggs
            .iter()
            .find(|agg| agg.enabled && agg.schema == schema)
            .map(|agg| agg.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    #[serde(serialize_with = "serialize_column_id")]
    pub id: ColumnId,
    pub name: String,
    pub schema: ColumnSchema,
    pub value_type: ValueType,
    pub source_agg_id: Option<String>,
    pub source_field: Option<String>,
}
fn serialize_column_id<S: serde::Serializer>(id: &ColumnId, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(id)
}
impl Column {
    pub fn from_raw(raw: &RawColumn) -> TableResult<Self> {
        let id = ColumnId::parse(&raw.id)?;
        let source = raw.meta.source_params.as_ref();
        Ok(Self {
            id,
            name: abbreviate_metric_name(&raw.name),
            schema: source.map(|s| s.schema).unwrap_or_default(),
            value_type: raw.meta.value_type,
            source_agg_id: source.and_then(|s| s.id.clone()),
            source_field: source.and_then(|s| s.field().map(str::to_string)),
        })
    }
    pub fn label(&self) -> &str {
        self.name.trim()
    }
}

/// Shortens the host's generated metric descriptions.
pub fn abbreviate_metric_name(name: &str) -> String {
    name.replacen("Average ", "", 1)
        .replacen("Unique count of ", "(count) ", 1)
        .replacen("Max ", "(max) ", 1)
        .replacen("Min ", "(min) ", 1)
        .replacen("Sum of ", "(sum) ", 1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ParsedTable {
    pub vertex_columns: Vec<Column>,
    pub field_columns: Vec<Column>,
    #[serde(skip)]
    pub bucket_column_ids: Vec<ColumnId>,
    #[serde(skip)]
    pub ids_of_interest: Vec<ColumnId>,
}
impl ParsedTable {
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.bucket_column_ids.is_empty() || self.ids_of_interest.is_empty()
    }
    pub fn field_column(&self, id: &ColumnId) -> Option<&Column> {
        self.field_columns.iter().find(|c| &c.id == id)
    }
    pub fn vertex_column(&self, id: &ColumnId) -> Option<&Column> {
        self.vertex_columns.iter().find(|c| &c.id == id)
    }
    pub fn bucket_columns(&self) -> Vec<&Column> {
        self.bucket_column_ids
            .iter()
            .filter_map(|id| self.field_column(id))
            .collect()
    }
}

/// Classifies columns and derives the ids that hold the plotted metric values.
///
/// Tables with fewer than two columns or fewer than two aggregations cannot
/// carry both a bucket and a metric, so they yield [`ParsedTable::empty`].
pub fn parse_table(table: &Datatable) -> TableResult<ParsedTable> {
    if table.columns.len() < 2 || table.aggs.len() < 2 {
        debug!(
            columns = table.columns.len(),
            aggs = table.aggs.len(),
            "datatable too small to plot"
        );
        return Ok(ParsedTable::empty());
    }
    let mut vertex_columns = Vec::new();
    let mut field_columns = Vec::new();
    for raw in &table.columns {
        let schema = raw
            .meta
            .source_params
            .as_ref()
            .map(|s| s.schema)
            .unwrap_or_default();
        match schema {
            ColumnSchema::Vertex => vertex_columns.push(Column::from_raw(raw)?),
            ColumnSchema::Field => field_columns.push(Column::from_raw(raw)?),
            _ => {}
        }
    }
    let bucket_column_ids: Vec<ColumnId> = field_columns.iter().map(|c| c.id.clone()).collect();
    let Some(last_bucket) = bucket_column_ids.last() else {
        debug!("datatable has no field buckets");
        return Ok(ParsedTable {
            vertex_columns,
            field_columns,
            ..ParsedTable::default()
        });
    };
    let metric_agg_ids: IndexSet<&str> = vertex_columns
        .iter()
        .filter_map(|c| c.source_agg_id.as_deref())
        .collect();
    let ids_of_interest = metric_agg_ids
        .iter()
        .enumerate()
        .map(|(i, agg_id)| ColumnId::new(last_bucket.level + i as u32 + 1, *agg_id))
        .collect();
    Ok(ParsedTable {
        vertex_columns,
        field_columns,
        bucket_column_ids,
        ids_of_interest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(id: &str, name: &str, schema: &str, agg: &str, ty: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "meta": {
                "type": ty,
                "sourceParams": { "id": agg, "schema": schema, "type": "terms", "params": { "field": "host" } }
            }
        })
    }

    fn table(columns: Vec<Value>, aggs: usize) -> Datatable {
        let aggs: Vec<Value> = (0..aggs)
            .map(|i| json!({ "id": (i + 1).to_string(), "schema": "metric", "type": "avg" }))
            .collect();
        Datatable::from_json(&json!({ "columns": columns, "rows": [], "aggs": aggs })).unwrap()
    }

    #[test]
    fn parses_column_ids() {
        assert_eq!(ColumnId::parse("col-0-2").unwrap(), ColumnId::new(0, "2"));
        assert_eq!(ColumnId::parse("col-12-a-b").unwrap(), ColumnId::new(12, "a-b"));
        assert_eq!(ColumnId::new(3, "7").to_string(), "col-3-7");
        for bad in ["col-x-2", "col-2", "col--2", "column-1-2", "col-1-", ""] {
            assert_eq!(
                ColumnId::parse(bad),
                Err(TableError::MalformedColumnId { id: bad.to_string() })
            );
        }
    }

    #[test]
    fn derives_ids_of_interest_from_last_bucket() {
        let parsed = parse_table(&table(
            vec![
                column("col-0-3", "host", "field", "3", "string"),
                column("col-1-1", "Average bytes", "vertex", "1", "number"),
                column("col-2-4", "os", "field", "4", "string"),
                column("col-3-1", "Average bytes", "vertex", "1", "number"),
                column("col-4-2", "Max memory", "vertex", "2", "number"),
            ],
            4,
        ))
        .unwrap();
        assert_eq!(
            parsed.bucket_column_ids,
            vec![ColumnId::new(0, "3"), ColumnId::new(2, "4")]
        );
        assert_eq!(
            parsed.ids_of_interest,
            vec![ColumnId::new(3, "1"), ColumnId::new(4, "2")]
        );
        assert_eq!(parsed.vertex_columns[0].name, "bytes");
        assert_eq!(parsed.vertex_columns[2].name, "(max) memory");
    }

    #[test]
    fn small_tables_are_empty() {
        let one_column = table(vec![column("col-0-1", "x", "field", "1", "string")], 3);
        assert!(parse_table(&one_column).unwrap().is_empty());
        let one_agg = table(
            vec![
                column("col-0-1", "x", "field", "1", "string"),
                column("col-1-2", "y", "vertex", "2", "number"),
            ],
            1,
        );
        assert!(parse_table(&one_agg).unwrap().is_empty());
    }

    #[test]
    fn malformed_bucket_id_is_reported() {
        let bad = table(
            vec![
                column("bucket-0", "host", "field", "3", "string"),
                column("col-1-1", "bytes", "vertex", "1", "number"),
            ],
            2,
        );
        assert_eq!(
            parse_table(&bad),
            Err(TableError::MalformedColumnId {
                id: "bucket-0".to_string()
            })
        );
    }

    #[test]
    fn abbreviates_metric_names() {
        assert_eq!(abbreviate_metric_name("Unique count of user"), "(count) user");
        assert_eq!(abbreviate_metric_name("Sum of bytes"), "(sum) bytes");
        assert_eq!(abbreviate_metric_name("Min latency"), "(min) latency");
        assert_eq!(abbreviate_metric_name("Count"), "Count");
    }
}
