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

//! One chart's derived state across data refreshes and legend clicks.

use crate::config::{DrilldownConfigSection, EnvisConfig};
use crate::drilldown::{DrilldownLink, DrilldownLinkBuilder, DrilldownQuery, KibanaLocation, SeriesResult};
use crate::error::{ConfigError, QueryResult, Result};
use crate::graph::{build_graph, ChartKind, Graph, Point, QueryMap};
use crate::keys::{LabelRenderer, MustacheRenderer, SeriesKey};
use crate::legend::{HiddenKeySet, LegendModel, LegendReconciler, ReconcileOutcome};
use crate::palette::ColorScheme;
use crate::params::VisParams;
use crate::regression::regression_overlay;
use crate::table::Datatable;
use crate::table_view::ComparisonTable;
use serde_json::Value;
use tracing::{debug, info};

pub struct VisSession<R: LabelRenderer = MustacheRenderer> {
    params: VisParams,
    fallback_scheme: ColorScheme,
    renderer: R,
    reconciler: LegendReconciler,
    queries: QueryMap,
    overlay: Vec<Point>,
}

impl VisSession<MustacheRenderer> {
    /// Session with default parameters for `kind` and the configured fallback palette.
    pub fn new(kind: ChartKind, config: &EnvisConfig) -> Self {
        Self::with_renderer(
            VisParams::defaults(kind),
            config.legend.default_color_scheme,
            MustacheRenderer,
        )
    }
}

impl<R: LabelRenderer> VisSession<R> {
    pub fn with_renderer(params: VisParams, fallback_scheme: ColorScheme, renderer: R) -> Self {
        let palette = params.color_scheme(fallback_scheme).palette();
        Self {
            params,
            fallback_scheme,
            renderer,
            reconciler: LegendReconciler::new(Graph::empty(), palette),
            queries: QueryMap::new(),
            overlay: Vec::new(),
        }
    }

    pub fn kind(&self) -> ChartKind {
        self.params.kind()
    }
    pub fn params(&self) -> &VisParams {
        &self.params
    }
    /// The graph after hidden series are removed.
    pub fn graph(&self) -> &Graph {
        self.reconciler.graph()
    }
    pub fn full_graph(&self) -> &Graph {
        self.reconciler.full_graph()
    }
    pub fn legend(&self) -> &LegendModel {
        self.reconciler.legend()
    }
    pub fn hidden_keys(&self) -> &HiddenKeySet {
        self.reconciler.hidden()
    }
    pub fn queries(&self) -> &QueryMap {
        &self.queries
    }
    /// Best-fit points over the visible series; empty unless the chart is a
    /// line chart with `lineOfBestFit` set.
    pub fn regression_overlay(&self) -> &[Point] {
        &self.overlay
    }

    fn refresh_overlay(&mut self) {
        self.overlay = if self.params.line_of_best_fit() {
            regression_overlay(self.reconciler.graph().series())
        } else {
            Vec::new()
        };
    }

    /// Rebuilds graph and query map from a new response. The legend survives
    /// when the key list is unchanged. On error the previous state is kept.
    pub fn update(&mut self, table: &Datatable) -> Result<ReconcileOutcome> {
        let build = build_graph(self.kind(), table, &self.renderer)?;
        self.queries = build.queries;
        let outcome = self.reconciler.replace_graph(build.graph);
        self.refresh_overlay();
        debug!(
            keys = self.reconciler.full_graph().keys.len(),
            hidden = self.reconciler.hidden().len(),
            "visualization updated"
        );
        Ok(outcome)
    }
    pub fn update_json(&mut self, table: &Value) -> Result<ReconcileOutcome> {
        let table = Datatable::from_json(table)?;
        self.update(&table)
    }

    /// Swaps parameters for the same chart kind. A palette change rebuilds
    /// the legend with fresh colours.
    pub fn set_params(&mut self, params: VisParams) -> Result<ReconcileOutcome> {
        if params.kind() != self.kind() {
            return Err(ConfigError::InvalidValue {
                field: "params".to_string(),
                value: format!("{} parameters for a {} chart", params.kind(), self.kind()),
            }
            .into());
        }
        let scheme_changed = params.color_scheme_name() != self.params.color_scheme_name();
        self.params = params;
        let outcome = if scheme_changed {
            let scheme = self.params.color_scheme(self.fallback_scheme);
            info!(scheme = %scheme, "palette changed");
            self.reconciler.set_palette(scheme.palette())
        } else {
            ReconcileOutcome::default()
        };
        self.refresh_overlay();
        Ok(outcome)
    }

    /// Flips one legend entry and reconciles. `None` for unknown keys.
    pub fn toggle(&mut self, key: &str) -> Option<ReconcileOutcome> {
        self.reconciler.toggle(key)?;
        let outcome = self.reconciler.reconcile();
        self.refresh_overlay();
        Some(outcome)
    }
    pub fn toggle_all(&mut self, checked: bool) -> ReconcileOutcome {
        self.reconciler.toggle_all(checked);
        let outcome = self.reconciler.reconcile();
        self.refresh_overlay();
        outcome
    }

    fn visible_queries(&self) -> impl Iterator<Item = (&SeriesKey, &String)> {
        let legend = self.reconciler.legend();
        self.queries
            .iter()
            .filter(move |(key, _)| legend.get(*key).is_some_and(|e| e.checked))
    }

    /// One drilldown query per visible series, scoped by the page's filters
    /// and time range.
    pub fn drilldown_requests(&self, location: &KibanaLocation) -> QueryResult<Vec<(String, DrilldownQuery)>> {
        self.visible_queries()
            .map(|(key, query)| Ok((key.clone(), DrilldownQuery::for_series(query, location)?)))
            .collect()
    }

    pub fn drilldown_links(
        &self,
        location: &KibanaLocation,
        index_pattern: &str,
        config: &DrilldownConfigSection,
        aggs_from: &Datatable,
        excluded: &str,
    ) -> Vec<DrilldownLink> {
        let builder = DrilldownLinkBuilder::new(location, index_pattern, config)
            .with_excluded(excluded)
            .with_aggs(&aggs_from.aggs);
        self.visible_queries()
            .map(|(key, query)| builder.link(key, query, self.reconciler.legend()))
            .collect()
    }

    /// Comparison view over drilldown results, restricted to the included keys.
    pub fn comparison_table(&self, results: &[SeriesResult]) -> ComparisonTable {
        ComparisonTable::build(results, &self.params.included_keys(), self.reconciler.legend())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LineParams;
    use serde_json::json;

    fn line_table() -> Datatable {
        Datatable::from_json(&json!({
            "columns": [
                { "id": "col-0-2", "name": "host", "meta": { "type": "string", "sourceParams": { "id": "2", "schema": "field", "params": { "field": "host" } } } },
                { "id": "col-1-1", "name": "Count", "meta": { "type": "number", "sourceParams": { "id": "1", "schema": "vertex" } } },
                { "id": "col-2-3", "name": "Sum of bytes", "meta": { "type": "number", "sourceParams": { "id": "3", "schema": "vertex" } } }
            ],
            "rows": [
                { "col-0-2": "web", "col-1-1": 1, "col-2-3": 3 },
                { "col-0-2": "db", "col-1-1": 2, "col-2-3": 6 }
            ],
            "aggs": [
                { "id": "1", "schema": "vertex", "type": "count", "enabled": true, "params": {} },
                { "id": "2", "schema": "field", "type": "terms", "enabled": true, "params": { "field": "host" } },
                { "id": "3", "schema": "vertex", "type": "sum", "enabled": true, "params": { "field": "bytes" } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn toggles_survive_refresh_with_same_keys() {
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        session.update(&line_table()).unwrap();
        assert_eq!(session.full_graph().keys, vec!["web", "db"]);
        assert_eq!(session.queries()["web"], "host:\"web\"");

        let outcome = session.toggle("web").unwrap();
        assert!(outcome.changed);
        assert_eq!(session.graph().keys, vec!["db"]);

        session.update(&line_table()).unwrap();
        assert_eq!(session.graph().keys, vec!["db"]);
        assert!(session.hidden_keys().contains("web"));

        let outcome = session.toggle_all(true);
        assert!(outcome.restored);
        assert_eq!(session.graph().keys, vec!["web", "db"]);
    }

    #[test]
    fn overlay_follows_line_of_best_fit() {
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        session.update(&line_table()).unwrap();
        assert!(session.regression_overlay().is_empty());
        let params = VisParams::Line(LineParams {
            line_of_best_fit: true,
            ..LineParams::default()
        });
        session.set_params(params).unwrap();
        assert_eq!(session.regression_overlay().len(), 2);
    }

    #[test]
    fn palette_change_recolours_legend() {
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        session.update(&line_table()).unwrap();
        let before = session.legend()["db"].color.clone();
        let params = VisParams::Line(LineParams {
            color_scheme: "10color".into(),
            ..LineParams::default()
        });
        session.set_params(params).unwrap();
        assert_eq!(session.legend()["web"].color, ColorScheme::TenColor.palette()[0]);
        assert_eq!(session.legend()["db"].color, ColorScheme::TenColor.palette()[1]);
        assert!(!before.is_empty());
    }

    #[test]
    fn rejects_params_for_another_chart() {
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        assert!(session.set_params(VisParams::defaults(ChartKind::Radar)).is_err());
    }

    #[test]
    fn drilldown_requests_skip_hidden_series() {
        let location = KibanaLocation::parse(
            "http://kibana:5601/app/visualize#/edit/v1?_g=(time:(from:now-1d,to:now))&_a=(query:(language:kuery,query:''))",
        )
        .unwrap();
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        session.update(&line_table()).unwrap();
        session.toggle("web");
        let requests = session.drilldown_requests(&location).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "db");
        assert_eq!(requests[0].1.time_range.as_ref().unwrap().from, "now-1d");
    }

    #[test]
    fn drilldown_body_carries_the_query_bar() {
        let location = KibanaLocation::parse(
            "http://kibana:5601/app/visualize#/edit/v1?_g=(time:(from:now-1d,to:now))&_a=(query:(language:kuery,query:'env:prod'))",
        )
        .unwrap();
        let mut session = VisSession::new(ChartKind::Line, &EnvisConfig::default());
        session.update(&line_table()).unwrap();
        let requests = session.drilldown_requests(&location).unwrap();
        let filter = requests[0].1.body("created").filter;
        assert_eq!(filter[0], json!({ "term": { "env": "prod" } }));
        assert_eq!(filter[1], json!({ "term": { "host": "web" } }));
    }
}
