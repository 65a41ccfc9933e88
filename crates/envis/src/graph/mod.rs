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

//! The normalized graph model and the three chart builders that produce it.

pub mod bump;
pub mod line;
pub mod radar;

use crate::error::TableResult;
use crate::keys::{LabelRenderer, SeriesKey};
use crate::table::Datatable;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub use bump::build_bump;
pub use line::build_line;
pub use radar::build_radar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: Value,
    pub y: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesKey,
    pub data: Vec<Point>,
}

/// One radar axis: a metric and its value for every series key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarRow {
    pub metric: String,
    #[serde(flatten)]
    pub values: IndexMap<SeriesKey, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphData {
    Series(Vec<Series>),
    Radar(Vec<RadarRow>),
}
impl Default for GraphData {
    fn default() -> Self {
        GraphData::Series(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Graph {
    pub keys: Vec<SeriesKey>,
    pub data: GraphData,
}
impl Graph {
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
    pub fn series(&self) -> &[Series] {
        match &self.data {
            GraphData::Series(series) => series,
            GraphData::Radar(_) => &[],
        }
    }
    pub fn radar_rows(&self) -> &[RadarRow] {
        match &self.data {
            GraphData::Radar(rows) => rows,
            GraphData::Series(_) => &[],
        }
    }
}

/// Drilldown query terms per series key, built alongside the graph.
pub type QueryMap = IndexMap<SeriesKey, String>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphBuild {
    pub graph: Graph,
    pub queries: QueryMap,
}
impl GraphBuild {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bump,
    Line,
    Radar,
}
impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bump => "bump",
            ChartKind::Line => "line",
            ChartKind::Radar => "radar",
        }
    }
}
impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for ChartKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bump" => Ok(ChartKind::Bump),
            "line" => Ok(ChartKind::Line),
            "radar" => Ok(ChartKind::Radar),
            other => Err(format!("unknown chart kind '{other}'")),
        }
    }
}

pub fn build_graph<R: LabelRenderer + ?Sized>(
    kind: ChartKind,
    table: &Datatable,
    renderer: &R,
) -> TableResult<GraphBuild> {
    let build = match kind {
        ChartKind::Bump => build_bump(table, renderer)?,
        ChartKind::Line => build_line(table, renderer)?,
        ChartKind::Radar => build_radar(table, renderer)?,
    };
    debug!(
        kind = %kind,
        keys = build.graph.keys.len(),
        rows = table.rows.len(),
        "graph built"
    );
    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn radar_rows_flatten_series_values() {
        let mut values = IndexMap::new();
        values.insert("web".to_string(), json!(4));
        values.insert("db".to_string(), Value::Null);
        let graph = Graph {
            keys: vec!["web".into(), "db".into()],
            data: GraphData::Radar(vec![RadarRow {
                metric: "bytes".into(),
                values,
            }]),
        };
        assert_eq!(
            serde_json::to_value(&graph).unwrap(),
            json!({ "keys": ["web", "db"], "data": [{ "metric": "bytes", "web": 4, "db": null }] })
        );
    }

    #[test]
    fn chart_kind_parses_case_insensitively() {
        assert_eq!("Radar".parse::<ChartKind>().unwrap(), ChartKind::Radar);
        assert!("pie".parse::<ChartKind>().is_err());
        assert_eq!(Graph::empty().series().len(), 0);
    }
}
