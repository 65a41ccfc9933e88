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

use crate::error::TemplateError;
use crate::table::{Column, ParsedTable, Row, ValueType};
use minijinja::Environment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

pub type SeriesKey = String;

/// Renders a bucket label template with the bucket value bound to `value`.
pub trait LabelRenderer {
    fn render(&self, template: &str, value: &Value) -> Result<String, TemplateError>;
}

static IF_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*#if\s+([^}]+?)\s*\}\}").expect("valid regex"));
static UNLESS_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*#unless\s+([^}]+?)\s*\}\}").expect("valid regex"));
static ELSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*else\s*\}\}").expect("valid regex"));
static BLOCK_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*/(?:if|unless)\s*\}\}").expect("valid regex"));
static TRIPLE_STASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\{\s*([^}]+?)\s*\}\}\}").expect("valid regex"));

/// Label renderer for the Mustache/Handlebars dialect users write in custom
/// bucket labels (`<prefix>{{value}}`, `{{#if value}}..{{else}}..{{/if}}`,
/// `{{#unless value}}..{{/unless}}`). Block helpers are lowered onto
/// minijinja statements before rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheRenderer;

impl MustacheRenderer {
    pub fn lower(template: &str) -> String {
        let lowered = TRIPLE_STASH.replace_all(template, "{{ $1 }}");
        let lowered = IF_OPEN.replace_all(&lowered, "{% if $1 %}");
        let lowered = UNLESS_OPEN.replace_all(&lowered, "{% if not ($1) %}");
        let lowered = ELSE.replace_all(&lowered, "{% else %}");
        BLOCK_CLOSE.replace_all(&lowered, "{% endif %}").into_owned()
    }
}

impl LabelRenderer for MustacheRenderer {
    fn render(&self, template: &str, value: &Value) -> Result<String, TemplateError> {
        let source = Self::lower(template);
        // null stays unbound so it renders empty and tests falsy
        let ctx = if value.is_null() {
            json!({})
        } else {
            json!({ "value": template_value(value) })
        };
        Environment::new()
            .render_str(&source, ctx)
            .map_err(|e| TemplateError::Render {
                template: template.to_string(),
                reason: e.to_string(),
            })
    }
}

fn template_value(value: &Value) -> Value {
    match value.as_f64() {
        Some(f) if value.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => json!(f as i64),
        _ => value.clone(),
    }
}

/// Text shown for a raw cell value; null renders empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(_) => template_value(value).to_string(),
        other => other.to_string(),
    }
}

/// Normalises a bucket value for the drilldown query term.
pub fn coerce_value(value: &Value, value_type: ValueType) -> String {
    match (value_type, value) {
        (ValueType::Boolean, Value::Null) => "false".to_string(),
        (_, Value::Null) => String::new(),
        (ValueType::Boolean, Value::Bool(b)) => b.to_string(),
        (ValueType::Boolean, Value::Number(n)) => (n.as_f64() != Some(0.0)).to_string(),
        (ValueType::Boolean, Value::String(s)) => {
            (!s.is_empty() && !s.eq_ignore_ascii_case("false")).to_string()
        }
        (ValueType::Number | ValueType::Date, Value::String(s)) => s
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect(),
        (ValueType::Number | ValueType::Date | ValueType::String, v) => display_value(v),
        (ValueType::Boolean | ValueType::Unknown, _) => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub key: SeriesKey,
    pub query_terms: Vec<String>,
}
impl KeyParts {
    /// Terms joined the way drilldown expects them.
    pub fn query(&self) -> String {
        self.query_terms.join(" and ")
    }
}

pub struct KeyBuilder<'a, R: LabelRenderer + ?Sized> {
    columns: Vec<&'a Column>,
    renderer: &'a R,
}
impl<'a, R: LabelRenderer + ?Sized> KeyBuilder<'a, R> {
    pub fn new(parsed: &'a ParsedTable, renderer: &'a R) -> Self {
        Self::from_columns(parsed.bucket_columns(), renderer)
    }
    pub fn from_columns(columns: Vec<&'a Column>, renderer: &'a R) -> Self {
        Self { columns, renderer }
    }
    pub fn build(&self, row: &Row) -> KeyParts {
        let mut parts = Vec::with_capacity(self.columns.len());
        let mut query_terms = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let raw = column.id.value(row);
            let field = column.source_field.as_deref().unwrap_or_else(|| column.label());
            query_terms.push(format!(
                "{field}:\"{}\"",
                coerce_value(raw, column.value_type)
            ));
            let rendered = self.render_label(column, raw);
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        KeyParts {
            key: parts.join("/"),
            query_terms,
        }
    }
    fn render_label(&self, column: &Column, raw: &Value) -> String {
        let label = column.label();
        if !label.contains("{{") {
            return display_value(raw);
        }
        match self.renderer.render(label, raw) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(column = %column.id, error = %err, "label template failed, using raw value");
                display_value(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnId, ColumnSchema};

    fn bucket(level: u32, name: &str, field: &str, value_type: ValueType) -> Column {
        Column {
            id: ColumnId::new(level, format!("{}", level + 10)),
            name: name.to_string(),
            schema: ColumnSchema::Field,
            value_type,
            source_agg_id: Some(format!("{}", level + 10)),
            source_field: Some(field.to_string()),
        }
    }

    fn row(values: &[(u32, Value)]) -> Row {
        values
            .iter()
            .map(|(level, v)| (ColumnId::new(*level, format!("{}", level + 10)).key(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_handlebars_dialect() {
        let r = MustacheRenderer;
        assert_eq!(r.render("v{{value}}", &json!(3)).unwrap(), "v3");
        assert_eq!(r.render("{{value}} ms", &json!(2.0)).unwrap(), "2 ms");
        assert_eq!(
            r.render("{{#if value}}up{{else}}down{{/if}}", &json!(0)).unwrap(),
            "down"
        );
        assert_eq!(
            r.render("{{#unless value}}none{{/unless}}", &Value::Null).unwrap(),
            "none"
        );
        assert_eq!(r.render("{{{value}}}!", &json!("a&b")).unwrap(), "a&b!");
    }

    #[test]
    fn joins_non_empty_parts_and_records_terms() {
        let host = bucket(0, "Host", "host.name", ValueType::String);
        let up = bucket(1, "{{#if value}}online{{else}}offline{{/if}}", "up", ValueType::Boolean);
        let port = bucket(2, "port", "port", ValueType::Number);
        let r = MustacheRenderer;
        let kb = KeyBuilder::from_columns(vec![&host, &up, &port], &r);
        let parts = kb.build(&row(&[(0, json!("web-1")), (1, json!(false)), (2, Value::Null)]));
        assert_eq!(parts.key, "web-1/offline");
        assert_eq!(
            parts.query(),
            "host.name:\"web-1\" and up:\"false\" and port:\"\""
        );
    }

    #[test]
    fn broken_template_falls_back_to_raw_value() {
        let col = bucket(0, "{{#if value}}unterminated", "status", ValueType::String);
        let r = MustacheRenderer;
        let kb = KeyBuilder::from_columns(vec![&col], &r);
        assert_eq!(kb.build(&row(&[(0, json!("ok"))])).key, "ok");
    }

    #[test]
    fn coerces_by_declared_type() {
        assert_eq!(coerce_value(&json!("1,024 B"), ValueType::Number), "1024");
        assert_eq!(coerce_value(&json!(-2.5), ValueType::Number), "-2.5");
        assert_eq!(coerce_value(&Value::Null, ValueType::Boolean), "false");
        assert_eq!(coerce_value(&json!(1), ValueType::Boolean), "true");
        assert_eq!(coerce_value(&Value::Null, ValueType::String), "");
        assert_eq!(coerce_value(&json!("x"), ValueType::Unknown), "");
    }
}
