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

//! Parser for the simplified free-text query syntax:
//! `field:value`, `field:"quoted value"`, `field>value`, `field>=value`,
//! `field<value`, `field<=value` (also `field:>=value`), joined by `and`/`or`.

use crate::error::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}
impl Comparison {
    pub fn keyword(&self) -> &'static str {
        match self {
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
        }
    }
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
    fn from_symbol(symbol: &str) -> Self {
        match symbol {
            ">" => Comparison::Gt,
            "<" => Comparison::Lt,
            "<=" => Comparison::Lte,
            _ => Comparison::Gte,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryTerm {
    Match {
        field: String,
        value: String,
    },
    Range {
        field: String,
        op: Comparison,
        value: String,
    },
}
impl QueryTerm {
    pub fn field(&self) -> &str {
        match self {
            QueryTerm::Match { field, .. } | QueryTerm::Range { field, .. } => field,
        }
    }
    pub fn to_clause(&self) -> Value {
        match self {
            QueryTerm::Match { field, value } => json!({ "term": { field.as_str(): value } }),
            QueryTerm::Range { field, op, value } => {
                json!({ "range": { field.as_str(): { op.keyword(): value } } })
            }
        }
    }
}
impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTerm::Match { field, value } => write!(f, "{field}:\"{value}\""),
            QueryTerm::Range { field, op, value } => write!(f, "{field}{}{value}", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connective {
    And,
    Or,
}
impl Connective {
    fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(Connective::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Connective::Or)
        } else {
            None
        }
    }
}

/// A parsed free-text query. `connectives[i]` joins `terms[i]` and `terms[i + 1]`.
/// The query body treats every term as a filter, so `or` only survives in
/// the rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub terms: Vec<QueryTerm>,
    pub connectives: Vec<Connective>,
}

impl ParsedQuery {
    pub fn parse(input: &str) -> QueryResult<Self> {
        let mut query = ParsedQuery::default();
        let mut pending: Vec<String> = Vec::new();
        for word in words(input)? {
            match Connective::from_word(&word) {
                Some(connective) if !pending.is_empty() => {
                    query.push(parse_term(&pending.join(" "))?, Some(connective));
                    pending.clear();
                }
                Some(_) => {}
                None => pending.push(word),
            }
        }
        if !pending.is_empty() {
            query.push(parse_term(&pending.join(" "))?, None);
        }
        query.connectives.truncate(query.terms.len().saturating_sub(1));
        Ok(query)
    }
    fn push(&mut self, term: QueryTerm, connective: Option<Connective>) {
        self.terms.push(term);
        if let Some(c) = connective {
            self.connectives.push(c);
        }
    }
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
    /// Drops every term on one of `fields`, along with its joining connective.
    pub fn without_fields(&self, fields: &[String]) -> Self {
        let mut out = ParsedQuery::default();
        for (i, term) in self.terms.iter().enumerate() {
            if fields.iter().any(|f| f == term.field()) {
                continue;
            }
            if !out.terms.is_empty() {
                let joining = i
                    .checked_sub(1)
                    .and_then(|j| self.connectives.get(j))
                    .copied()
                    .unwrap_or(Connective::And);
                out.connectives.push(joining);
            }
            out.terms.push(term.clone());
        }
        out
    }
    pub fn clauses(&self) -> Vec<Value> {
        self.terms.iter().map(QueryTerm::to_clause).collect()
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                let word = match self.connectives.get(i - 1) {
                    Some(Connective::Or) => "or",
                    _ => "and",
                };
                write!(f, " {word} ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

/// Whitespace-separated words; quoted sections stay inside their word.
fn words(input: &str) -> QueryResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(QueryError::UnterminatedQuote {
            input: input.to_string(),
        });
    }
    if !current.is_empty() {
        words.push(current);
    }
    Ok(words)
}

/// Position and text of the first operator outside quotes.
fn find_operator(term: &str) -> Option<(usize, &'static str)> {
    let bytes = term.as_bytes();
    let mut in_quotes = false;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'>' | b'<' if !in_quotes => {
                let or_equal = bytes.get(i + 1) == Some(&b'=');
                return Some((
                    i,
                    match (b, or_equal) {
                        (b'>', true) => ">=",
                        (b'>', false) => ">",
                        (_, true) => "<=",
                        _ => "<",
                    },
                ));
            }
            b':' if !in_quotes => return Some((i, ":")),
            _ => {}
        }
    }
    None
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => trimmed.to_string(),
    }
}

fn parse_term(raw: &str) -> QueryResult<QueryTerm> {
    let term = raw.trim().trim_start_matches('(').trim_end_matches(')').trim();
    let (pos, symbol) = find_operator(term).ok_or_else(|| QueryError::MissingOperator {
        term: term.to_string(),
    })?;
    let field = term[..pos].trim();
    if field.is_empty() {
        return Err(QueryError::MissingField {
            term: term.to_string(),
        });
    }
    let mut rest = term[pos + symbol.len()..].trim_start();
    let mut range = (symbol != ":").then(|| Comparison::from_symbol(symbol));
    if range.is_none() {
        for candidate in [">=", "<=", ">", "<"] {
            if let Some(stripped) = rest.strip_prefix(candidate) {
                range = Some(Comparison::from_symbol(candidate));
                rest = stripped;
                break;
            }
        }
    }
    if rest.trim().is_empty() {
        return Err(QueryError::MissingValue {
            term: term.to_string(),
        });
    }
    let value = unquote(rest);
    Ok(match range {
        Some(op) => QueryTerm::Range {
            field: field.to_string(),
            op,
            value,
        },
        None => QueryTerm::Match {
            field: field.to_string(),
            value,
        },
    })
}
