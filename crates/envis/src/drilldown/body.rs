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

use super::filter::{FilterClause, FilterKind};
use super::host::KibanaLocation;
use super::query::ParsedQuery;
use crate::error::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}
impl TimeRange {
    pub fn to_clause(&self, field: &str) -> Value {
        json!({ "range": { field: { "gte": self.from, "lt": self.to } } })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryBody {
    pub filter: Vec<Value>,
    pub must: Vec<Value>,
    pub must_not: Vec<Value>,
}
impl QueryBody {
    pub fn to_json(&self) -> Value {
        json!({
            "query": {
                "bool": {
                    "filter": self.filter,
                    "must_not": self.must_not,
                    "must": self.must
                }
            }
        })
    }
}

/// Everything needed to query one series: its free-text terms, the inherited
/// query bar and filter bar, and the dashboard time range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrilldownQuery {
    pub text: ParsedQuery,
    pub inherited: ParsedQuery,
    pub filters: Vec<FilterClause>,
    pub time_range: Option<TimeRange>,
}

impl DrilldownQuery {
    pub fn new(text: ParsedQuery) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }
    /// Series terms combined with the query bar, filters and time range of the
    /// page the drilldown starts from. An unparseable query bar is skipped.
    pub fn for_series(series_query: &str, location: &KibanaLocation) -> QueryResult<Self> {
        let inherited = match ParsedQuery::parse(location.kuery().unwrap_or_default()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "could not parse inherited query, ignoring it");
                ParsedQuery::default()
            }
        };
        Ok(Self {
            text: ParsedQuery::parse(series_query)?,
            inherited,
            filters: location.filters(),
            time_range: location.time_range(),
        })
    }
    pub fn with_filters(mut self, filters: Vec<FilterClause>) -> Self {
        self.filters = filters;
        self
    }
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Inherited and series terms, enabled phrase and range filters, then the
    /// time range go to `filter`; negated filters to `must_not`; `exists`
    /// filters to `must` or `must_not`. Disabled filters are skipped.
    pub fn body(&self, timestamp_field: &str) -> QueryBody {
        let mut filter = self.inherited.clauses();
        filter.extend(self.text.clauses());
        let mut body = QueryBody {
            filter,
            ..QueryBody::default()
        };
        for clause in self.filters.iter().filter(|c| !c.disabled) {
            let target = match (&clause.kind, clause.negate) {
                (_, true) => &mut body.must_not,
                (FilterKind::Exists, false) => &mut body.must,
                (_, false) => &mut body.filter,
            };
            target.push(clause.to_clause());
        }
        if let Some(range) = &self.time_range {
            body.filter.push(range.to_clause(timestamp_field));
        }
        body
    }
}
