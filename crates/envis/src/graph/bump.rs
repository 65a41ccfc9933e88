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
use crate::keys::{display_value, KeyBuilder, LabelRenderer, SeriesKey};
use crate::table::{Column, ColumnSchema, Datatable, Row};
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::debug;

struct Entry<'r> {
    key: SeriesKey,
    time: &'r Value,
    metric: Option<f64>,
}

fn find_column(columns: &[Column], agg_id: &str, last: bool) -> Option<Column> {
    let mut matching = columns.iter().filter(|c| c.id.agg_id == agg_id);
    let found = if last { matching.last() } else { matching.next() };
    found.cloned()
}

/// Ranked series over time. Within each time bucket keys are ranked by their
/// metric, ascending and stable, starting at 1.
///
/// Each series lists its points in the order time buckets first appear in the
/// table, not in the order of its own rows. The two only differ when rows are
/// not grouped by time.
pub fn build_bump<R: LabelRenderer + ?Sized>(
    table: &Datatable,
    renderer: &R,
) -> TableResult<GraphBuild> {
    let (Some(metric_id), Some(group_id), Some(time_id)) = (
        table.agg_id_for(ColumnSchema::Metric),
        table.agg_id_for(ColumnSchema::Grouping),
        table.agg_id_for(ColumnSchema::Time),
    ) else {
        debug!("bump chart needs metric, grouping and time aggregations");
        return Ok(GraphBuild::empty());
    };
    let columns = table
        .columns
        .iter()
        .map(Column::from_raw)
        .collect::<TableResult<Vec<_>>>()?;
    let (Some(time_col), Some(group_col), Some(metric_col)) = (
        find_column(&columns, time_id, false),
        find_column(&columns, group_id, false),
        find_column(&columns, metric_id, true),
    ) else {
        debug!("bump aggregations have no matching columns");
        return Ok(GraphBuild::empty());
    };
    let key_builder = KeyBuilder::from_columns(vec![&group_col], renderer);
    let mut queries = QueryMap::new();
    let mut keys: IndexSet<SeriesKey> = IndexSet::new();
    let mut buckets: IndexMap<String, Vec<Entry<'_>>> = IndexMap::new();
    for row in &table.rows {
        let parts = key_builder.build(row);
        if parts.key.is_empty() {
            continue;
        }
        let time = time_col.id.value(row);
        let bucket = buckets.entry(display_value(time)).or_default();
        if bucket.iter().any(|e| e.key == parts.key) {
            continue;
        }
        if keys.insert(parts.key.clone()) {
            queries.insert(parts.key.clone(), parts.query());
        }
        bucket.push(Entry {
            key: parts.key,
            time,
            metric: metric_value(row, &metric_col),
        });
    }
    let mut series: IndexMap<&str, Vec<Point>> =
        keys.iter().map(|k| (k.as_str(), Vec::new())).collect();
    for entries in buckets.values() {
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            entries[a]
                .metric
                .partial_cmp(&entries[b].metric)
                .unwrap_or(Ordering::Equal)
        });
        let mut ranks = vec![0usize; entries.len()];
        for (rank, idx) in order.into_iter().enumerate() {
            ranks[idx] = rank + 1;
        }
        for (entry, rank) in entries.iter().zip(ranks) {
            if let Some(points) = series.get_mut(entry.key.as_str()) {
                points.push(Point {
                    x: entry.time.clone(),
                    y: json!(rank),
                });
            }
        }
    }
    let data = series
        .into_iter()
        .map(|(id, data)| Series {
            id: id.to_string(),
            data,
        })
        .collect();
    Ok(GraphBuild {
        graph: Graph {
            keys: keys.into_iter().collect(),
            data: GraphData::Series(data),
        },
        queries,
    })
}

fn metric_value(row: &Row, column: &Column) -> Option<f64> {
    match column.id.read(row)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MustacheRenderer;

    fn table(rows: Value, aggs: Value) -> Datatable {
        Datatable::from_json(&json!({
            "columns": [
                { "id": "col-0-2", "name": "time", "meta": { "type": "date" } },
                { "id": "col-1-3", "name": "group", "meta": { "type": "string",
                    "sourceParams": { "id": "3", "schema": "grouping", "params": { "field": "team" } } } },
                { "id": "col-2-1", "name": "Average value", "meta": { "type": "number" } }
            ],
            "rows": rows,
            "aggs": aggs
        }))
        .unwrap()
    }

    fn aggs() -> Value {
        json!([
            { "id": "1", "schema": "metric", "type": "avg" },
            { "id": "2", "schema": "time", "type": "date_histogram" },
            { "id": "3", "schema": "grouping", "type": "terms" }
        ])
    }

    fn row(t: &str, g: &str, v: f64) -> Value {
        json!({ "col-0-2": t, "col-1-3": g, "col-2-1": v })
    }

    #[test]
    fn ranks_ascending_per_time_bucket() {
        let t = table(
            json!([
                row("2020-01", "A", 5.0),
                row("2020-01", "B", 9.0),
                row("2020-02", "A", 12.0),
                row("2020-02", "B", 3.0)
            ]),
            aggs(),
        );
        let build = build_bump(&t, &MustacheRenderer).unwrap();
        assert_eq!(build.graph.keys, vec!["A", "B"]);
        let series = build.graph.series();
        assert_eq!(
            series[0].data,
            vec![
                Point { x: json!("2020-01"), y: json!(1) },
                Point { x: json!("2020-02"), y: json!(2) }
            ]
        );
        assert_eq!(
            series[1].data,
            vec![
                Point { x: json!("2020-01"), y: json!(2) },
                Point { x: json!("2020-02"), y: json!(1) }
            ]
        );
        assert_eq!(build.queries["A"], "team:\"A\"");
    }

    #[test]
    fn ties_keep_row_order() {
        let t = table(
            json!([row("t", "C", 1.0), row("t", "A", 1.0), row("t", "B", 0.5)]),
            aggs(),
        );
        let build = build_bump(&t, &MustacheRenderer).unwrap();
        let ranks: Vec<_> = build
            .graph
            .series()
            .iter()
            .map(|s| (s.id.as_str(), s.data[0].y.clone()))
            .collect();
        assert_eq!(ranks, vec![("C", json!(2)), ("A", json!(3)), ("B", json!(1))]);
    }

    #[test]
    fn points_follow_first_seen_bucket_order() {
        let t = table(
            json!([
                row("2020-01", "A", 5.0),
                row("2020-02", "B", 1.0),
                row("2020-02", "A", 2.0),
                row("2020-01", "B", 9.0)
            ]),
            aggs(),
        );
        let build = build_bump(&t, &MustacheRenderer).unwrap();
        let series = build.graph.series();
        assert_eq!(series[1].id, "B");
        assert_eq!(
            series[1].data,
            vec![
                Point { x: json!("2020-01"), y: json!(2) },
                Point { x: json!("2020-02"), y: json!(1) }
            ]
        );
    }

    #[test]
    fn missing_time_aggregation_yields_empty_graph() {
        let t = table(
            json!([row("t", "A", 1.0)]),
            json!([
                { "id": "1", "schema": "metric" },
                { "id": "3", "schema": "grouping" }
            ]),
        );
        assert!(build_bump(&t, &MustacheRenderer).unwrap().graph.is_empty());
    }
}
