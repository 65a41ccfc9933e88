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

pub mod config;
pub mod drilldown;
pub mod error;
pub mod format;
pub mod graph;
pub mod keys;
pub mod legend;
pub mod palette;
pub mod params;
pub mod regression;
pub mod session;
pub mod table;
pub mod table_view;

pub use config::EnvisConfig;
pub use drilldown::{
    DrilldownLink, DrilldownLinkBuilder, DrilldownQuery, DrilldownSession, KibanaClient,
    KibanaLocation, ParsedQuery, RetryPolicy, SearchTransport, SeriesResult,
};
pub use error::{
    ConfigError, DrilldownError, EnvisError, ErrorReporter, ErrorSeverity, QueryError, Result,
    TableError, TemplateError,
};
pub use graph::{build_graph, ChartKind, Graph, GraphBuild, GraphData, Point, QueryMap, Series};
pub use keys::{KeyBuilder, LabelRenderer, MustacheRenderer, SeriesKey};
pub use legend::{HiddenKeySet, LegendEntry, LegendModel, LegendReconciler, ReconcileOutcome};
pub use palette::ColorScheme;
pub use params::VisParams;
pub use regression::linear_regression;
pub use session::VisSession;
pub use table::{parse_table, ColumnId, Datatable, ParsedTable};
pub use table_view::{ComparisonTable, SecondaryTable};
