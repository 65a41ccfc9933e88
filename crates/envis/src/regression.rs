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

use crate::graph::{Point, Series};
use indexmap::IndexSet;
use serde_json::{json, Value};

/// Ordinary least squares fit evaluated once per distinct x, in first-seen
/// order. Inputs of unequal length are rejected with an empty result; when
/// every x is identical the fit degenerates to the mean of y.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    if xs.is_empty() || ys.is_empty() || xs.len() != ys.len() {
        return Vec::new();
    }
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let (mut covariance, mut variance) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        covariance += (x - x_mean) * (y - y_mean);
        variance += (x - x_mean) * (x - x_mean);
    }
    let mut distinct: Vec<f64> = Vec::new();
    for x in xs {
        if !distinct.iter().any(|d| d == x) {
            distinct.push(*x);
        }
    }
    if variance == 0.0 {
        return vec![y_mean; distinct.len()];
    }
    let slope = covariance / variance;
    let intercept = y_mean - slope * x_mean;
    distinct.into_iter().map(|x| slope * x + intercept).collect()
}

/// Best-fit overlay across every point of the given series. Distinct x labels
/// are placed at ordinal positions in first-seen order; null or non-numeric
/// y values are left out of the fit.
pub fn regression_overlay(series: &[Series]) -> Vec<Point> {
    let mut labels: IndexSet<String> = IndexSet::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for point in series.iter().flat_map(|s| &s.data) {
        let (position, _) = labels.insert_full(label_of(&point.x));
        if let Some(y) = point.y.as_f64() {
            xs.push(position as f64);
            ys.push(y);
        }
    }
    let fitted = linear_regression(&xs, &ys);
    let positions: IndexSet<usize> = xs.iter().map(|x| *x as usize).collect();
    positions
        .into_iter()
        .zip(fitted)
        .filter_map(|(position, y)| {
            labels.get_index(position).map(|label| Point {
                x: json!(label),
                y: json!(y),
            })
        })
        .collect()
}

fn label_of(x: &Value) -> String {
    match x {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
