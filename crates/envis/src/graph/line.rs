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

use super::{Graph, GraphBuild, GraphData, Point, QueryMap, Series};
use crate::error::TableResult;
use crate::keys::{KeyBuilder, LabelRenderer};
use crate::table::{parse_table, Column, Datatable};
use serde_json::json;
use tracing::debug;

/// One series per distinct row key; each series runs across the plotted
/// metrics rather than across time.
pub fn build_line<R: LabelRenderer + ?Sized>(
    table: &Datatable,
    renderer: &R,
) -> TableResult<GraphBuild> {
    let parsed = parse_table(table)?;
    if parsed.is_empty() {
        return Ok(GraphBuild::empty());
    }
    let vertices: Vec<&Column> = parsed
        .ids_of_interest
        .iter()
        .filter_map(|id| parsed.vertex_column(id))
        .collect();
    if vertices.is_empty() {
        debug!("no vertex column matches the plotted metric ids");
        return Ok(GraphBuild::empty());
    }
    let key_builder = KeyBuilder::new(&parsed, renderer);
    let mut queries = QueryMap::new();
    let mut keys = Vec::new();
    let mut series = Vec::new();
    for row in &table.rows {
        let parts = key_builder.build(row);
        if parts.key.is_empty() || queries.contains_key(&parts.key) {
            continue;
        }
        let data = vertices
            .iter()
            .map(|vertex| Point {
                x: json!(vertex.name),
                y: vertex.id.value(row).clone(),
            })
            .collect();
        queries.insert(parts.key.clone(), parts.query());
        keys.push(parts.key.clone());
        series.push(Series { id: parts.key, data });
    }
    Ok(GraphBuild {
        graph: Graph {
            keys,
            data: GraphData::Series(series),
        },
        queries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MustacheRenderer;
    use serde_json::Value;

    fn table(rows: Value) -> Datatable {
        Datatable::from_json(&json!({
            "columns": [
                { "id": "col-0-3", "name": "host", "meta": { "type": "string",
                    "sourceParams": { "id": "3", "schema": "field", "params": { "field": "host.name" } } } },
                { "id": "col-1-1", "name": "Average cpu", "meta": { "type": "number",
                    "sourceParams": { "id": "1", "schema": "vertex", "params": { "field": "cpu" } } } },
                { "id": "col-2-2", "name": "Max memory", "meta": { "type": "number",
                    "sourceParams": { "id": "2", "schema": "vertex", "params": { "field": "mem" } } } }
            ],
            "rows": rows,
            "aggs": [
                { "id": "1", "schema": "vertex", "type": "avg" },
                { "id": "2", "schema": "vertex", "type": "max" },
                { "id": "3", "schema": "field", "type": "terms" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_one_series_per_key_across_metrics() {
        let t = table(json!([
            { "col-0-3": "web", "col-1-1": 0.5, "col-2-2": 300 },
            { "col-0-3": "db", "col-1-1": 0.9, "col-2-2": null },
            { "col-0-3": "web", "col-1-1": 0.7, "col-2-2": 100 }
        ]));
        let build = build_line(&t, &MustacheRenderer).unwrap();
        assert_eq!(build.graph.keys, vec!["web", "db"]);
        let web = &build.graph.series()[0];
        assert_eq!(
            web.data,
            vec![
                Point { x: json!("cpu"), y: json!(0.5) },
                Point { x: json!("(max) memory"), y: json!(300) }
            ]
        );
        assert_eq!(build.graph.series()[1].data[1].y, Value::Null);
        assert_eq!(build.queries["db"], "host.name:\"db\"");
    }

    #[test]
    fn table_without_rows_has_no_keys() {
        let build = build_line(&table(json!([])), &MustacheRenderer).unwrap();
        assert!(build.graph.is_empty());
        assert!(build.queries.is_empty());
    }
}
