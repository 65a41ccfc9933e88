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

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const RANGE_BOUNDS: [&str; 4] = ["gt", "gte", "lt", "lte"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterKind {
    Phrase { value: String },
    Range { bounds: IndexMap<String, Value> },
    Exists,
}

/// One filter-bar pill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub key: String,
    pub disabled: bool,
    pub negate: bool,
    pub kind: FilterKind,
}

impl FilterClause {
    pub fn phrase(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, FilterKind::Phrase { value: value.into() })
    }
    pub fn exists(key: impl Into<String>) -> Self {
        Self::new(key, FilterKind::Exists)
    }
    pub fn new(key: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            key: key.into(),
            disabled: false,
            negate: false,
            kind,
        }
    }
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Maps a decoded host filter object onto the typed model. Filters of
    /// other types (query DSL, spatial, ...) are skipped.
    pub fn from_host(filter: &Value) -> Option<Self> {
        let meta = filter.get("meta")?;
        let flag = |name: &str| meta.get(name).and_then(Value::as_bool).unwrap_or(false);
        let key = meta.get("key").and_then(Value::as_str)?.trim().to_string();
        let params = meta.get("params");
        let kind = match meta.get("type").and_then(Value::as_str)? {
            "phrase" => FilterKind::Phrase {
                value: decode_phrase_value(params?.get("query")?),
            },
            "range" => {
                let bounds = params
                    .and_then(Value::as_object)
                    .into_iter()
                    .flatten()
                    .filter(|(bound, _)| RANGE_BOUNDS.contains(&bound.as_str()))
                    .map(|(bound, v)| (bound.clone(), v.clone()))
                    .collect::<IndexMap<_, _>>();
                if bounds.is_empty() {
                    debug!(key = %key, "range filter without bounds");
                    return None;
                }
                FilterKind::Range { bounds }
            }
            "exists" => FilterKind::Exists,
            other => {
                debug!(key = %key, kind = other, "unsupported filter type");
                return None;
            }
        };
        Some(Self {
            key,
            disabled: flag("disabled"),
            negate: flag("negate"),
            kind,
        })
    }

    pub fn to_clause(&self) -> Value {
        match &self.kind {
            FilterKind::Phrase { value } => json!({ "term": { self.key.as_str(): value } }),
            FilterKind::Range { bounds } => json!({ "range": { self.key.as_str(): bounds } }),
            FilterKind::Exists => json!({ "exists": { "field": self.key } }),
        }
    }
}

/// Phrase values as the query body expects them. Booleans arrive either
/// decoded or in the host's `!t`/`!f` shorthand.
pub fn decode_phrase_value(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::String(s) if s.starts_with('!') => (s.chars().nth(1) == Some('t')).to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_host_filters() {
        let range = FilterClause::from_host(&json!({
            "meta": { "key": "bytes", "negate": true, "type": "range",
                "params": { "gte": 10, "lt": 20, "format": "number" } }
        }))
        .unwrap();
        assert!(range.negate && !range.disabled);
        assert_eq!(
            range.to_clause(),
            json!({ "range": { "bytes": { "gte": 10, "lt": 20 } } })
        );

        let exists = FilterClause::from_host(&json!({
            "exists": { "field": "user" },
            "meta": { "key": "user", "disabled": true, "type": "exists", "value": "exists" }
        }))
        .unwrap();
        assert!(exists.disabled);
        assert_eq!(exists.to_clause(), json!({ "exists": { "field": "user" } }));

        assert!(FilterClause::from_host(&json!({ "meta": { "key": "q", "type": "custom" } })).is_none());
    }

    #[test]
    fn decodes_boolean_shorthand() {
        assert_eq!(decode_phrase_value(&json!("!t")), "true");
        assert_eq!(decode_phrase_value(&json!("!f")), "false");
        assert_eq!(decode_phrase_value(&json!(false)), "false");
        assert_eq!(decode_phrase_value(&json!(42)), "42");
        assert_eq!(decode_phrase_value(&json!("active")), "active");
    }
}
