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

use super::body::DrilldownQuery;
use crate::config::DrilldownConfigSection;
use crate::error::{DrilldownError, DrilldownResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Runs an Elasticsearch search body against an index.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn search(&self, index: &str, body: &Value) -> DrilldownResult<Value>;
}

/// Search results for one series key. Failed lookups carry `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub key: String,
    pub results: Value,
}
impl SeriesResult {
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            results: json!({}),
        }
    }
    pub fn has_hits(&self) -> bool {
        has_hits(&self.results)
    }
    /// `_source` of the first hit, if any.
    pub fn first_source(&self) -> Option<&Value> {
        self.results
            .pointer("/hits/hits/0/_source")
            .or_else(|| self.results.pointer("/0/_source"))
    }
}

pub fn has_hits(results: &Value) -> bool {
    let Some(hits) = results.get("hits") else {
        return false;
    };
    let total = hits
        .get("total")
        .and_then(|t| t.get("value").or(Some(t)))
        .and_then(Value::as_u64);
    let listed = hits
        .get("hits")
        .and_then(Value::as_array)
        .is_some_and(|h| !h.is_empty());
    total != Some(0) && listed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub primary_field: String,
    pub fallback_field: String,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DrilldownConfigSection::default())
    }
}
impl From<&DrilldownConfigSection> for RetryPolicy {
    fn from(config: &DrilldownConfigSection) -> Self {
        Self {
            primary_field: config.primary_timestamp_field.clone(),
            fallback_field: config.fallback_timestamp_field.clone(),
        }
    }
}

/// Queries on the primary timestamp field; when that yields no hits or
/// fails, queries once more on the fallback field and returns that answer
/// whatever it is. Failures never escape: they are logged and become `{}`.
pub async fn fetch_with_retry<T: SearchTransport + ?Sized>(
    transport: &T,
    index: &str,
    key: &str,
    query: &DrilldownQuery,
    policy: &RetryPolicy,
) -> SeriesResult {
    let primary = query.body(&policy.primary_field).to_json();
    match transport.search(index, &primary).await {
        Ok(results) if has_hits(&results) => {
            return SeriesResult {
                key: key.to_string(),
                results,
            }
        }
        Ok(_) => debug!(key, field = %policy.primary_field, "no hits, retrying on fallback field"),
        Err(e) => warn!(key, field = %policy.primary_field, error = %e, "drilldown search failed, retrying"),
    }
    let fallback = query.body(&policy.fallback_field).to_json();
    match transport.search(index, &fallback).await {
        Ok(results) => SeriesResult {
            key: key.to_string(),
            results,
        },
        Err(e) => {
            warn!(key, field = %policy.fallback_field, error = %e, "drilldown search failed");
            SeriesResult::empty(key)
        }
    }
}

/// Talks to Kibana's saved-objects API and console proxy.
#[derive(Debug, Clone)]
pub struct KibanaClient {
    client: Client,
    api_base: Url,
    timeout: Duration,
}

impl KibanaClient {
    /// `api_base` is the Kibana root followed by `api/`.
    pub fn new(api_base: &str, timeout: Duration) -> DrilldownResult<Self> {
        let normalised = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{api_base}/")
        };
        let api_base = Url::parse(&normalised).map_err(|e| DrilldownError::InvalidUrl {
            url: normalised.clone(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base,
            timeout,
        })
    }
    fn endpoint(&self, path: &str) -> DrilldownResult<Url> {
        self.api_base
            .join(path)
            .map_err(|e| DrilldownError::InvalidUrl {
                url: format!("{}{path}", self.api_base),
                reason: e.to_string(),
            })
    }
    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> DrilldownResult<Value> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| DrilldownError::Timeout(self.timeout))??;
        let status = response.status();
        debug!(url = %url, status = %status, "kibana responded");
        if !status.is_success() {
            return Err(DrilldownError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json::<Value>().await?)
    }
    async fn get(&self, path: &str) -> DrilldownResult<Value> {
        let url = self.endpoint(path)?;
        let request = self
            .client
            .get(url.clone())
            .header("Content-Type", "application/json");
        self.send(request, &url).await
    }
    /// Index pattern id referenced by a saved visualization.
    pub async fn index_pattern_for_visualization(&self, vis_id: &str) -> DrilldownResult<String> {
        let saved = self
            .get(&format!("saved_objects/visualization/{vis_id}"))
            .await?;
        saved
            .pointer("/references/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DrilldownError::ResponseShape {
                reason: format!("visualization {vis_id} has no references"),
            })
    }
    pub async fn index_title(&self, pattern_id: &str) -> DrilldownResult<String> {
        let saved = self
            .get(&format!("saved_objects/index-pattern/{pattern_id}"))
            .await?;
        saved
            .pointer("/attributes/title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DrilldownError::ResponseShape {
                reason: format!("index pattern {pattern_id} has no title"),
            })
    }
    /// Index pattern id and index title behind a saved visualization.
    pub async fn resolve_index(&self, vis_id: &str) -> DrilldownResult<(String, String)> {
        let pattern = self.index_pattern_for_visualization(vis_id).await?;
        let title = self.index_title(&pattern).await?;
        info!(visualization = vis_id, index = %title, "resolved drilldown index");
        Ok((pattern, title))
    }
}

#[async_trait]
impl SearchTransport for KibanaClient {
    async fn search(&self, index: &str, body: &Value) -> DrilldownResult<Value> {
        let mut url = self.endpoint("console/proxy")?;
        url.query_pairs_mut()
            .append_pair("path", &format!("/{index}/_search"))
            .append_pair("method", "POST");
        let request = self
            .client
            .post(url.clone())
            .header("kbn-xsrf", "true")
            .json(body);
        self.send(request, &url).await
    }
}
