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

//! Side-by-side inspection of the first hit behind each series.
//!
//! Rows are `_source` fields picked by the included-keys list, nested objects
//! flattened to dotted paths. Arrays of objects stay whole and open as a
//! [`SecondaryTable`].

use crate::drilldown::SeriesResult;
use crate::format::formatted_number;
use crate::keys::display_value;
use crate::legend::LegendModel;
use chrono::NaiveDateTime;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MISSING: &str = "N/A";
const CELL_DECIMALS: usize = 7;
const MICROSECOND_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Text(String),
    Nested(Vec<Value>),
}
impl Cell {
    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text.as_str()),
            Cell::Nested(_) => None,
        }
    }
}

/// Display form of one field value.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => MISSING.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n
            .as_f64()
            .map(|f| formatted_number(f, Some(CELL_DECIMALS)))
            .unwrap_or_else(|| n.to_string()),
        Value::String(s) => match NaiveDateTime::parse_from_str(s, MICROSECOND_TIMESTAMP) {
            Ok(_) => s.split('.').next().unwrap_or(s).to_string(),
            Err(_) => s.clone(),
        },
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut IndexMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{prefix}.{key}"), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}.{i}"), child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

/// Nested objects become dotted paths; `{"a": {"b": 1}}` yields `a.b`.
pub fn flatten(map: &Map<String, Value>) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    for (key, value) in map {
        flatten_into(key, value, &mut out);
    }
    out
}

/// Letters `A..Z` then `a..z`, used once more than two series are compared.
pub fn column_label(index: usize) -> String {
    match index {
        0..=25 => char::from(b'A' + index as u8).to_string(),
        26..=51 => char::from(b'a' + (index - 26) as u8).to_string(),
        _ => format!("L{index}"),
    }
}

fn included_rank(key: &str, included: &[String]) -> i64 {
    let position = |name: &str| {
        included
            .iter()
            .position(|k| k == name)
            .map_or(-1, |i| i as i64)
    };
    match position(key) {
        -1 => key.find('.').map_or(-1, |dot| position(&key[..dot])),
        rank => rank,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonColumn {
    pub name: String,
    pub key: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub field: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub columns: Vec<ComparisonColumn>,
    pub rows: Vec<ComparisonRow>,
}

struct Picked<'a> {
    key: &'a str,
    flat: IndexMap<String, Value>,
    arrays: Map<String, Value>,
}

impl ComparisonTable {
    pub fn build(results: &[SeriesResult], included: &[String], legend: &LegendModel) -> Self {
        let picked: Vec<Picked> = results
            .iter()
            .filter(|r| legend.contains_key(&r.key))
            .map(|r| {
                let mut scalars = Map::new();
                let mut arrays = Map::new();
                if let Some(Value::Object(source)) = r.first_source() {
                    for (field, value) in source.iter().filter(|(k, _)| included.contains(*k)) {
                        let target = if value.is_array() { &mut arrays } else { &mut scalars };
                        target.insert(field.clone(), value.clone());
                    }
                }
                Picked {
                    key: &r.key,
                    flat: flatten(&scalars),
                    arrays,
                }
            })
            .collect();

        let array_fields: IndexSet<&String> = picked.iter().flat_map(|p| p.arrays.keys()).collect();
        let mut fields: Vec<String> = picked
            .iter()
            .flat_map(|p| p.flat.keys())
            .chain(array_fields.iter().copied())
            .collect::<IndexSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        fields.sort_by_key(|f| included_rank(f, included));

        let by_key = picked.len() <= 2;
        let columns = picked
            .iter()
            .enumerate()
            .map(|(i, p)| ComparisonColumn {
                name: if by_key { p.key.to_string() } else { column_label(i) },
                key: p.key.to_string(),
                color: legend.get(p.key).map(|e| e.color.clone()).unwrap_or_default(),
            })
            .collect();
        let rows = fields
            .into_iter()
            .map(|field| {
                let is_array = array_fields.contains(&field);
                let cells = picked
                    .iter()
                    .map(|p| {
                        let value = if is_array {
                            p.arrays.get(&field)
                        } else {
                            p.flat.get(&field)
                        };
                        match value {
                            Some(Value::Array(items)) if items.first().is_some_and(Value::is_object) => {
                                Cell::Nested(items.clone())
                            }
                            Some(value) => Cell::Text(format_cell(value)),
                            None => Cell::Text(MISSING.to_string()),
                        }
                    })
                    .collect();
                ComparisonRow { field, cells }
            })
            .collect();
        Self { columns, rows }
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    /// Results for every visible series have arrived and produced rows.
    pub fn is_ready(&self, expected_series: usize) -> bool {
        !self.rows.is_empty() && self.columns.len() == expected_series
    }
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row)?.cells.get(column)
    }
    /// Opens a nested cell as its own table, titled with the series it came from.
    pub fn secondary(&self, row: usize, column: usize) -> Option<SecondaryTable> {
        match self.cell(row, column)? {
            Cell::Nested(items) => {
                let owner = self.columns.get(column)?;
                Some(SecondaryTable::new(&owner.key, &owner.color, items))
            }
            Cell::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryTable {
    pub key: String,
    pub color: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
impl SecondaryTable {
    /// Columns are the fields of the first element.
    pub fn new(key: &str, color: &str, items: &[Value]) -> Self {
        let columns: Vec<String> = items
            .first()
            .and_then(Value::as_object)
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();
        let rows = items
            .iter()
            .map(|item| {
                columns
                    .iter()
                    .map(|c| match item.get(c) {
                        None | Some(Value::Null) => MISSING.to_string(),
                        Some(Value::Number(n)) => n
                            .as_f64()
                            .map(|f| formatted_number(f, Some(CELL_DECIMALS)))
                            .unwrap_or_else(|| n.to_string()),
                        Some(other) => display_value(other),
                    })
                    .collect()
            })
            .collect();
        Self {
            key: key.to_string(),
            color: color.to_string(),
            columns,
            rows,
        }
    }
}
