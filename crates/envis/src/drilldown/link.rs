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

use super::host::KibanaLocation;
use super::query::ParsedQuery;
use super::rison;
use crate::config::DrilldownConfigSection;
use crate::graph::QueryMap;
use crate::legend::LegendModel;
use crate::palette::to_hex;
use crate::table::{AggConfig, ColumnSchema};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

const URL_STATE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrilldownLink {
    pub key: String,
    pub query: String,
    pub url: String,
}

fn agg_field(agg: &AggConfig) -> Option<&str> {
    let field = agg.params.get("field")?;
    field
        .as_str()
        .or_else(|| field.pointer("/spec/name").and_then(Value::as_str))
        .or_else(|| field.get("name").and_then(Value::as_str))
}

fn param<'a>(agg: &'a AggConfig, name: &str) -> Option<&'a Value> {
    agg.params.get(name).filter(|v| !v.is_null())
}

/// Builds `app/visualize#/create` links that open a drilldown chart for one
/// series, inheriting the current page's state.
#[derive(Debug, Clone)]
pub struct DrilldownLinkBuilder<'a> {
    location: &'a KibanaLocation,
    index_pattern: String,
    vis_type: String,
    default_bar_color: String,
    excluded: Vec<String>,
    metric: Option<Value>,
    bucket: Option<Value>,
}

impl<'a> DrilldownLinkBuilder<'a> {
    pub fn new(
        location: &'a KibanaLocation,
        index_pattern: impl Into<String>,
        config: &DrilldownConfigSection,
    ) -> Self {
        Self {
            location,
            index_pattern: index_pattern.into(),
            vis_type: config.vis_type.clone(),
            default_bar_color: config.default_bar_color.clone(),
            excluded: Vec::new(),
            metric: None,
            bucket: None,
        }
    }
    /// Comma-separated fields to drop from the drilldown query.
    pub fn with_excluded(mut self, excluded: &str) -> Self {
        self.excluded = excluded
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        self
    }
    pub fn with_vis_type(mut self, vis_type: impl Into<String>) -> Self {
        self.vis_type = vis_type.into();
        self
    }
    /// Picks up the `dmetric` and `dbucket` aggregations configured for the
    /// drilldown chart. The bucket is only used alongside a metric.
    pub fn with_aggs(mut self, aggs: &[AggConfig]) -> Self {
        let first = |schema| aggs.iter().find(|a| a.schema == schema);
        self.metric = first(ColumnSchema::DrilldownMetric).map(|agg| {
            json!({
                "enabled": agg.enabled,
                "id": 1,
                "params": { "field": agg_field(agg).unwrap_or_default() },
                "schema": "vertex",
                "type": agg.agg_type
            })
        });
        self.bucket = first(ColumnSchema::DrilldownBucket)
            .filter(|_| self.metric.is_some())
            .map(|agg| {
                let order = param(agg, "order")
                    .and_then(|o| o.as_str().or_else(|| o.get("value").and_then(Value::as_str)))
                    .unwrap_or("desc");
                json!({
                    "enabled": agg.enabled,
                    "id": 2,
                    "params": {
                        "field": agg_field(agg).unwrap_or_default(),
                        "missingBucket": param(agg, "missingBucket").cloned().unwrap_or(json!(false)),
                        "missingBucketLabel": param(agg, "missingBucketLabel").cloned().unwrap_or(json!("Missing")),
                        "order": order,
                        "orderBy": "_key",
                        "otherBucket": param(agg, "otherBucket").cloned().unwrap_or(json!(false)),
                        "otherBucketLabel": param(agg, "otherBucketLabel").cloned().unwrap_or(json!("Other")),
                        "size": param(agg, "size").cloned().unwrap_or(json!(5))
                    },
                    "schema": "field",
                    "type": agg.agg_type
                })
            });
        self
    }

    /// Inherited query bar contents joined with the series terms, minus the
    /// excluded fields.
    pub fn combined_query(&self, series_query: &str) -> String {
        let inherited = self.location.kuery().unwrap_or_default().trim();
        let joined = match (inherited.is_empty(), series_query.trim().is_empty()) {
            (true, _) => series_query.trim().to_string(),
            (false, true) => inherited.to_string(),
            (false, false) => format!("{inherited} and {}", series_query.trim()),
        };
        if self.excluded.is_empty() {
            return joined;
        }
        match ParsedQuery::parse(&joined) {
            Ok(parsed) => parsed.without_fields(&self.excluded).to_string(),
            Err(e) => {
                warn!(error = %e, "could not parse drilldown query, exclusions skipped");
                joined
            }
        }
    }

    fn bar_color(&self, key: &str, legend: &LegendModel) -> String {
        legend
            .get(key)
            .and_then(|entry| to_hex(&entry.color))
            .or_else(|| to_hex(&self.default_bar_color))
            .unwrap_or_else(|| self.default_bar_color.clone())
    }

    pub fn link(&self, key: &str, series_query: &str, legend: &LegendModel) -> DrilldownLink {
        let query = self.combined_query(series_query);
        let mut app = match &self.location.app_state {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        app.insert(
            "query".to_string(),
            json!({ "language": "kuery", "query": query }),
        );
        let aggs: Vec<Value> = self.metric.iter().chain(&self.bucket).cloned().collect();
        app.insert(
            "vis".to_string(),
            json!({
                "aggs": aggs,
                "params": {
                    "barColor": self.bar_color(key, legend),
                    "excluded": self.excluded.join(",")
                },
                "title": format!("[Drilldown] {key}"),
                "type": self.vis_type
            }),
        );
        let encode = |state: &Value| utf8_percent_encode(&rison::encode(state), URL_STATE).to_string();
        let url = format!(
            "{}app/visualize#/create?type={}&indexPattern={}&_g={}&_a={}",
            self.location.base_url,
            self.vis_type,
            self.index_pattern,
            encode(&self.location.global_state),
            encode(&Value::Object(app)),
        );
        DrilldownLink {
            key: key.to_string(),
            query,
            url,
        }
    }

    pub fn links(&self, queries: &QueryMap, legend: &LegendModel) -> Vec<DrilldownLink> {
        queries
            .iter()
            .map(|(key, query)| self.link(key, query, legend))
            .collect()
    }
}
