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

//! Series visibility: the legend model, the hidden-key set and the filtered
//! graph, kept consistent with each other.
//!
//! The invariant is `key ∈ hidden ⇔ !legend[key].checked` once
//! [`LegendReconciler::reconcile`] has run. Colours are assigned only when the
//! legend is rebuilt, never while filtering.

use crate::graph::{Graph, GraphData, RadarRow};
use crate::keys::SeriesKey;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub color: String,
    pub checked: bool,
}

pub type LegendModel = IndexMap<SeriesKey, LegendEntry>;
pub type HiddenKeySet = IndexSet<SeriesKey>;

pub fn build_legend(keys: &[SeriesKey], palette: &[String]) -> LegendModel {
    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            let color = if palette.is_empty() {
                String::new()
            } else {
                palette[i % palette.len()].clone()
            };
            (key.clone(), LegendEntry { color, checked: true })
        })
        .collect()
}

pub fn all_checked(legend: &LegendModel) -> bool {
    legend.values().all(|entry| entry.checked)
}

pub fn filter_graph(full: &Graph, hidden: &HiddenKeySet) -> Graph {
    let keys = full
        .keys
        .iter()
        .filter(|k| !hidden.contains(*k))
        .cloned()
        .collect();
    let data = match &full.data {
        GraphData::Series(series) => GraphData::Series(
            series
                .iter()
                .filter(|s| !hidden.contains(&s.id))
                .cloned()
                .collect(),
        ),
        GraphData::Radar(rows) => GraphData::Radar(
            rows.iter()
                .map(|row| RadarRow {
                    metric: row.metric.clone(),
                    values: row
                        .values
                        .iter()
                        .filter(|(k, _)| !hidden.contains(*k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                })
                .collect(),
        ),
    };
    Graph { keys, data }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// The hidden set was non-empty before or after; the visible graph was refiltered.
    pub changed: bool,
    /// Every entry became checked again and the full graph was restored.
    pub restored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LegendReconciler {
    full: Graph,
    visible: Graph,
    legend: LegendModel,
    hidden: HiddenKeySet,
    palette: Vec<String>,
}
impl LegendReconciler {
    pub fn new(graph: Graph, palette: Vec<String>) -> Self {
        let legend = build_legend(&graph.keys, &palette);
        Self {
            visible: graph.clone(),
            full: graph,
            legend,
            hidden: HiddenKeySet::new(),
            palette,
        }
    }
    pub fn full_graph(&self) -> &Graph {
        &self.full
    }
    pub fn graph(&self) -> &Graph {
        &self.visible
    }
    pub fn legend(&self) -> &LegendModel {
        &self.legend
    }
    pub fn hidden(&self) -> &HiddenKeySet {
        &self.hidden
    }
    pub fn palette(&self) -> &[String] {
        &self.palette
    }
    /// Flips one entry and returns its new state, or `None` for unknown keys.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let entry = self.legend.get_mut(key)?;
        entry.checked = !entry.checked;
        Some(entry.checked)
    }
    pub fn set_checked(&mut self, key: &str, checked: bool) -> bool {
        match self.legend.get_mut(key) {
            Some(entry) => {
                entry.checked = checked;
                true
            }
            None => false,
        }
    }
    pub fn toggle_all(&mut self, checked: bool) {
        for entry in self.legend.values_mut() {
            entry.checked = checked;
        }
    }
    pub fn reconcile(&mut self) -> ReconcileOutcome {
        let before = self.hidden.len();
        for (key, entry) in &self.legend {
            if entry.checked {
                self.hidden.shift_remove(key);
            } else {
                self.hidden.insert(key.clone());
            }
        }
        let legend = &self.legend;
        self.hidden.retain(|key| legend.contains_key(key));
        let changed = before > 0 || !self.hidden.is_empty();
        let restored = before > 0 && all_checked(&self.legend);
        if restored {
            self.hidden.clear();
            self.visible = self.full.clone();
        } else if changed {
            self.visible = filter_graph(&self.full, &self.hidden);
        }
        debug!(
            hidden = self.hidden.len(),
            changed, restored, "legend reconciled"
        );
        ReconcileOutcome { changed, restored }
    }
    /// Installs a rebuilt graph. The legend is rebuilt only when the key list
    /// differs; otherwise toggles survive the refresh.
    pub fn replace_graph(&mut self, graph: Graph) -> ReconcileOutcome {
        if graph.keys != self.full.keys {
            self.legend = build_legend(&graph.keys, &self.palette);
        }
        self.full = graph;
        self.visible = filter_graph(&self.full, &self.hidden);
        self.reconcile()
    }
    pub fn set_palette(&mut self, palette: Vec<String>) -> ReconcileOutcome {
        self.palette = palette;
        self.legend = build_legend(&self.full.keys, &self.palette);
        self.reconcile()
    }
}
