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

//! Boundary adapter for the visualize app's edit URL. Everything past this
//! point works with decoded state and typed filters.

use super::body::TimeRange;
use super::filter::FilterClause;
use super::rison;
use crate::error::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static EDIT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<base>.+?/)app/visualize#/edit/(?P<id>[^?]+)\?(?P<query>.*)$")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct KibanaLocation {
    /// Everything before `app/`, ending in `/`.
    pub base_url: String,
    pub visualization_id: String,
    pub global_state: Value,
    pub app_state: Value,
}

impl KibanaLocation {
    pub fn parse(url: &str) -> QueryResult<Self> {
        let caps = EDIT_URL
            .captures(url.trim())
            .ok_or_else(|| QueryError::UnrecognisedUrl {
                url: url.to_string(),
            })?;
        let mut global_state = None;
        let mut app_state = None;
        for pair in caps["query"].split('&') {
            let Some((name, raw)) = pair.split_once('=') else {
                continue;
            };
            let decoded = percent_decode_str(raw).decode_utf8_lossy();
            match name {
                "_g" => global_state = Some(rison::decode(&decoded)?),
                "_a" => app_state = Some(rison::decode(&decoded)?),
                other => debug!(param = other, "ignoring url parameter"),
            }
        }
        let missing = |part: &str| QueryError::MissingState {
            part: part.to_string(),
        };
        Ok(Self {
            base_url: caps["base"].to_string(),
            visualization_id: caps["id"].to_string(),
            global_state: global_state.ok_or_else(|| missing("_g"))?,
            app_state: app_state.ok_or_else(|| missing("_a"))?,
        })
    }
    pub fn api_base(&self) -> String {
        format!("{}api/", self.base_url)
    }
    pub fn time_range(&self) -> Option<TimeRange> {
        let time = self.global_state.get("time")?;
        Some(TimeRange {
            from: time.get("from")?.as_str()?.to_string(),
            to: time.get("to")?.as_str()?.to_string(),
        })
    }
    /// Pinned (global) filters first, then the app's own filters.
    pub fn filters(&self) -> Vec<FilterClause> {
        [&self.global_state, &self.app_state]
            .into_iter()
            .filter_map(|state| state.get("filters").and_then(Value::as_array))
            .flatten()
            .filter_map(FilterClause::from_host)
            .collect()
    }
    /// The free-text query bar contents, when written in kuery.
    pub fn kuery(&self) -> Option<&str> {
        let query = self.app_state.get("query")?;
        match query.get("language").and_then(Value::as_str) {
            Some("kuery") | None => query.get("query")?.as_str(),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drilldown::filter::FilterKind;

    const URL: &str = "http://kibana.local:5601/abc/app/visualize#/edit/7f1e-22?_g=(filters:!(),time:(from:now-7d,to:now))&_a=(filters:!(('$state':(store:appState),meta:(alias:!n,disabled:!f,key:up,negate:!f,params:(query:!t),type:phrase))),linked:!f,query:(language:kuery,query:'host.name:%22web-1%22'),uiState:(),vis:(title:x))";

    #[test]
    fn parses_edit_url() {
        let loc = KibanaLocation::parse(URL).unwrap();
        assert_eq!(loc.base_url, "http://kibana.local:5601/abc/");
        assert_eq!(loc.api_base(), "http://kibana.local:5601/abc/api/");
        assert_eq!(loc.visualization_id, "7f1e-22");
        assert_eq!(
            loc.time_range(),
            Some(TimeRange {
                from: "now-7d".into(),
                to: "now".into()
            })
        );
        assert_eq!(loc.kuery(), Some("host.name:\"web-1\""));
        let filters = loc.filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].key, "up");
        assert_eq!(
            filters[0].kind,
            FilterKind::Phrase {
                value: "true".into()
            }
        );
    }

    #[test]
    fn rejects_other_pages() {
        assert!(matches!(
            KibanaLocation::parse("http://kibana.local/app/discover#/"),
            Err(QueryError::UnrecognisedUrl { .. })
        ));
        assert!(matches!(
            KibanaLocation::parse("http://k/app/visualize#/edit/1?_g=()"),
            Err(QueryError::MissingState { .. })
        ));
    }
}
