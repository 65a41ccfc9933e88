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

use super::{Graph, GraphBuild, GraphData, QueryMap, RadarRow};
use crate::error::TableResult;
use crate::keys::{KeyBuilder, LabelRenderer};
use crate::table::{parse_table, Datatable};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

/// One row per distinct metric label with a value for every series key.
///
/// Metrics sharing a label collapse into the first row carrying it, and row
/// `i` reads the `i`-th plotted metric id, so a collapsed label shifts the
/// remaining rows onto earlier metric ids. Rows repeating a series key
/// overwrite its values, keeping the key's first-seen position and query.
pub fn build_radar<R: LabelRenderer + ?Sized>(
    table: &Datatable,
    renderer: &R,
) -> TableResult<GraphBuild> {
    let parsed = parse_table(table)?;
    if parsed.is_empty() {
        return Ok(GraphBuild::empty());
    }
    let metrics: IndexSet<&str> = parsed
        .vertex_columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    let mut rows: Vec<RadarRow> = metrics
        .into_iter()
        .map(|metric| RadarRow {
            metric: metric.to_string(),
            values: IndexMap::new(),
        })
        .collect();
    let key_builder = KeyBuilder::new(&parsed, renderer);
    let mut queries = QueryMap::new();
    let mut keys = Vec::new();
    for row in &table.rows {
        let parts = key_builder.build(row);
        if parts.key.is_empty() {
            continue;
        }
        for (i, radar_row) in rows.iter_mut().enumerate() {
            let value = parsed
                .ids_of_interest
                .get(i)
                .map_or(Value::Null, |id| id.value(row).clone());
            radar_row.values.insert(parts.key.clone(), value);
        }
        if !queries.contains_key(&parts.key) {
            queries.insert(parts.key.clone(), parts.query());
            keys.push(parts.key);
        }
    }
    Ok(GraphBuild {
        graph: Graph {
            keys,
            data: GraphData::Radar(rows),
        },
        queries,
    })
}
