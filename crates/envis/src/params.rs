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

//! User-configured chart parameters as persisted by the host.

use crate::error::{ConfigError, ConfigResult};
use crate::graph::ChartKind;
use crate::palette::ColorScheme;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BumpParams {
    pub color_scheme: String,
    pub curve_type: String,
    pub line_width: f64,
    pub point_size: f64,
    pub point_border_width: f64,
}
impl Default for BumpParams {
    fn default() -> Self {
        Self {
            color_scheme: "10color".to_string(),
            curve_type: "linear".to_string(),
            line_width: 3.0,
            point_size: 10.0,
            point_border_width: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineParams {
    pub color_scheme: String,
    pub curve_type: String,
    pub enable_area: bool,
    pub decimal_count: usize,
    pub line_width: f64,
    pub line_of_best_fit: bool,
    pub point_border_width: f64,
    pub enable_points: bool,
    pub enable_point_label: bool,
    pub show_values: bool,
    pub point_size: f64,
    pub point_color: String,
    pub reg_line_color: String,
    pub legend_alignment: String,
    pub animate: bool,
    pub included_keys: String,
}
impl Default for LineParams {
    fn default() -> Self {
        Self {
            color_scheme: "20colordistinct".to_string(),
            curve_type: "linear".to_string(),
            enable_area: false,
            decimal_count: 3,
            line_width: 3.0,
            line_of_best_fit: false,
            point_border_width: 3.0,
            enable_points: true,
            enable_point_label: false,
            show_values: true,
            point_size: 10.0,
            point_color: "#ffffff".to_string(),
            reg_line_color: "#ff0000".to_string(),
            legend_alignment: "right".to_string(),
            animate: true,
            included_keys: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RadarParams {
    pub color_scheme: String,
    pub radar_shape: String,
    pub curve_type: String,
    pub grid_levels: u32,
    pub show_values: bool,
    pub border_width: f64,
    pub dot_border_width: f64,
    pub dot_size: f64,
    pub dot_color: String,
    pub show_dots: bool,
    pub enable_dot_label: bool,
    pub decimal_count: usize,
    pub legend_alignment: String,
    pub tooltip_alignment: String,
    pub fixed_tooltip: bool,
    pub animate: bool,
    pub included_keys: String,
}
impl Default for RadarParams {
    fn default() -> Self {
        Self {
            color_scheme: "20colordistinct".to_string(),
            radar_shape: "circular".to_string(),
            curve_type: "linearClosed".to_string(),
            grid_levels: 5,
            show_values: true,
            border_width: 3.0,
            dot_border_width: 3.0,
            dot_size: 10.0,
            dot_color: "#ffffff".to_string(),
            show_dots: true,
            enable_dot_label: false,
            decimal_count: 3,
            legend_alignment: "right".to_string(),
            tooltip_alignment: "center".to_string(),
            fixed_tooltip: false,
            animate: false,
            included_keys: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VisParams {
    Bump(BumpParams),
    Line(LineParams),
    Radar(RadarParams),
}
impl VisParams {
    pub fn defaults(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Bump => VisParams::Bump(BumpParams::default()),
            ChartKind::Line => VisParams::Line(LineParams::default()),
            ChartKind::Radar => VisParams::Radar(RadarParams::default()),
        }
    }
    /// Host-supplied parameters merged over the defaults for `kind`.
    pub fn from_json(kind: ChartKind, value: &Value) -> ConfigResult<Self> {
        let parse = |e| ConfigError::InvalidParams { source: e };
        Ok(match kind {
            ChartKind::Bump => VisParams::Bump(BumpParams::deserialize(value).map_err(parse)?),
            ChartKind::Line => VisParams::Line(LineParams::deserialize(value).map_err(parse)?),
            ChartKind::Radar => VisParams::Radar(RadarParams::deserialize(value).map_err(parse)?),
        })
    }
    pub fn kind(&self) -> ChartKind {
        match self {
            VisParams::Bump(_) => ChartKind::Bump,
            VisParams::Line(_) => ChartKind::Line,
            VisParams::Radar(_) => ChartKind::Radar,
        }
    }
    pub fn color_scheme_name(&self) -> &str {
        match self {
            VisParams::Bump(p) => &p.color_scheme,
            VisParams::Line(p) => &p.color_scheme,
            VisParams::Radar(p) => &p.color_scheme,
        }
    }
    pub fn color_scheme(&self, fallback: ColorScheme) -> ColorScheme {
        ColorScheme::resolve(self.color_scheme_name(), fallback)
    }
    /// Comparison-table keys, in configured order.
    pub fn included_keys(&self) -> Vec<String> {
        let raw = match self {
            VisParams::Bump(_) => "",
            VisParams::Line(p) => &p.included_keys,
            VisParams::Radar(p) => &p.included_keys,
        };
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }
    pub fn line_of_best_fit(&self) -> bool {
        matches!(self, VisParams::Line(p) if p.line_of_best_fit)
    }
    pub fn decimal_count(&self) -> usize {
        match self {
            VisParams::Bump(_) => crate::format::DEFAULT_DECIMALS,
            VisParams::Line(p) => p.decimal_count,
            VisParams::Radar(p) => p.decimal_count,
        }
    }
}
