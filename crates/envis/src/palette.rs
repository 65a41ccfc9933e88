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

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const COLOR_BLIND_BASE: [&str; 10] = [
    "#54B399", "#6092C0", "#D36086", "#9170B8", "#CA8EAE", "#D6BF57", "#B9A888", "#DA8B45",
    "#AA6556", "#E7664C",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorScheme {
    #[default]
    #[serde(rename = "10color")]
    TenColor,
    #[serde(rename = "20color")]
    TwentyColor,
    #[serde(rename = "30color")]
    ThirtyColor,
    #[serde(rename = "20colordistinct")]
    TwentyColorDistinct,
    #[serde(rename = "30colordistinct")]
    ThirtyColorDistinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Lighter,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Append,
    Group,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 5] = [
        ColorScheme::TenColor,
        ColorScheme::TwentyColor,
        ColorScheme::ThirtyColor,
        ColorScheme::TwentyColorDistinct,
        ColorScheme::ThirtyColorDistinct,
    ];
    pub fn name(&self) -> &'static str {
        match self {
            ColorScheme::TenColor => "10color",
            ColorScheme::TwentyColor => "20color",
            ColorScheme::ThirtyColor => "30color",
            ColorScheme::TwentyColorDistinct => "20colordistinct",
            ColorScheme::ThirtyColorDistinct => "30colordistinct",
        }
    }
    pub fn title(&self) -> &'static str {
        match self {
            ColorScheme::TenColor => "10-color",
            ColorScheme::TwentyColor => "20-color",
            ColorScheme::ThirtyColor => "30-color",
            ColorScheme::TwentyColorDistinct => "20-color (distinct)",
            ColorScheme::ThirtyColorDistinct => "30-color (distinct)",
        }
    }
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
    /// Resolves a scheme name, falling back when it is unknown.
    pub fn resolve(name: &str, fallback: ColorScheme) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(scheme = name, fallback = fallback.name(), "unknown colour scheme");
            fallback
        })
    }
    fn layout(&self) -> (usize, Order, Direction) {
        match self {
            ColorScheme::TenColor => (1, Order::Append, Direction::Lighter),
            ColorScheme::TwentyColor => (2, Order::Append, Direction::Lighter),
            ColorScheme::ThirtyColor => (3, Order::Append, Direction::Lighter),
            ColorScheme::TwentyColorDistinct => (2, Order::Group, Direction::Both),
            ColorScheme::ThirtyColorDistinct => (3, Order::Group, Direction::Both),
        }
    }
    pub fn palette(&self) -> Vec<String> {
        let (rotations, order, direction) = self.layout();
        if rotations <= 1 {
            return COLOR_BLIND_BASE.iter().map(|c| c.to_string()).collect();
        }
        let rotated: Vec<Vec<Rgb>> = COLOR_BLIND_BASE
            .iter()
            .filter_map(|hex| Rgb::from_hex(hex))
            .map(|base| {
                let dark = base.mix(Rgb::BLACK, 0.5);
                let light = base.mix(Rgb::WHITE, 0.5);
                match direction {
                    Direction::Lighter => Rgb::scale(&[base, light], rotations),
                    Direction::Both => Rgb::scale(&[dark, base, light], rotations),
                }
            })
            .collect();
        let colors: Vec<Rgb> = match order {
            Order::Group => rotated.into_iter().flatten().collect(),
            Order::Append => (0..rotations)
                .flat_map(|i| rotated.iter().filter_map(move |r| r.get(i).copied()))
                .collect(),
        };
        colors.into_iter().map(|c| c.to_hex()).collect()
    }
}
impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgb(f64, f64, f64);
impl Rgb {
    const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    const WHITE: Rgb = Rgb(255.0, 255.0, 255.0);
    fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        Some(Rgb(
            f64::from(channel(0)?),
            f64::from(channel(2)?),
            f64::from(channel(4)?),
        ))
    }
    fn mix(self, other: Rgb, t: f64) -> Rgb {
        Rgb(
            self.0 + (other.0 - self.0) * t,
            self.1 + (other.1 - self.1) * t,
            self.2 + (other.2 - self.2) * t,
        )
    }
    /// `n` evenly spaced colours along the polyline through `stops`.
    fn scale(stops: &[Rgb], n: usize) -> Vec<Rgb> {
        if n == 1 || stops.len() == 1 {
            return stops.iter().take(n).copied().collect();
        }
        let segments = (stops.len() - 1) as f64;
        (0..n)
            .map(|i| {
                let pos = i as f64 / (n - 1) as f64 * segments;
                let seg = (pos.floor() as usize).min(stops.len() - 2);
                stops[seg].mix(stops[seg + 1], pos - seg as f64)
            })
            .collect()
    }
    fn to_hex(self) -> String {
        let c = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        format!("#{:02X}{:02X}{:02X}", c(self.0), c(self.1), c(self.2))
    }
}

/// Normalises `#rgb`, `#rrggbb` and `rgb(r, g, b)` colours to `#RRGGBB`.
pub fn to_hex(color: &str) -> Option<String> {
    let color = color.trim();
    if let Some(digits) = color.strip_prefix('#') {
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return None,
        };
        return Rgb::from_hex(&format!("#{expanded}")).map(Rgb::to_hex);
    }
    let inner = color
        .strip_prefix("rgba(")
        .or_else(|| color.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f64>().ok());
    let rgb = Rgb(parts.next()??, parts.next()??, parts.next()??);
    Some(rgb.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_sizes_follow_rotations() {
        assert_eq!(ColorScheme::TenColor.palette().len(), 10);
        assert_eq!(ColorScheme::TwentyColor.palette().len(), 20);
        assert_eq!(ColorScheme::ThirtyColorDistinct.palette().len(), 30);
    }

    #[test]
    fn append_order_starts_with_the_base_palette() {
        let palette = ColorScheme::TwentyColor.palette();
        assert_eq!(&palette[..10], &COLOR_BLIND_BASE.map(String::from)[..]);
        assert_ne!(palette[10], palette[0]);
    }

    #[test]
    fn group_order_keeps_variants_together() {
        let palette = ColorScheme::ThirtyColorDistinct.palette();
        assert_eq!(palette[1], "#54B399");
        assert_eq!(palette[4], "#6092C0");
    }

    #[test]
    fn unknown_names_fall_back() {
        assert_eq!(
            ColorScheme::resolve("rainbow", ColorScheme::TwentyColorDistinct),
            ColorScheme::TwentyColorDistinct
        );
        assert_eq!(ColorScheme::resolve("30color", ColorScheme::TenColor), ColorScheme::ThirtyColor);
    }

    #[test]
    fn normalises_colour_notations() {
        assert_eq!(to_hex("rgb(50, 150, 142)").as_deref(), Some("#32968E"));
        assert_eq!(to_hex("#abc").as_deref(), Some("#AABBCC"));
        assert_eq!(to_hex("teal"), None);
    }
}
