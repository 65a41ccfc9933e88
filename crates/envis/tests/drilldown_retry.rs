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

use async_trait::async_trait;
use envis::drilldown::{fetch_with_retry, TimeRange};
use envis::error::DrilldownResult;
use envis::{
    DrilldownError, DrilldownQuery, DrilldownSession, KibanaClient, ParsedQuery, RetryPolicy,
    SearchTransport,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn zero_hits() -> Value {
    json!({ "hits": { "total": { "value": 0 }, "hits": [] } })
}

fn one_hit(tag: &str) -> Value {
    json!({ "hits": { "total": { "value": 1 }, "hits": [{ "_source": { "tag": tag } }] } })
}

fn query() -> DrilldownQuery {
    DrilldownQuery::new(ParsedQuery::parse("host:\"web\"").unwrap()).with_time_range(TimeRange {
        from: "now-1h".into(),
        to: "now".into(),
    })
}

fn time_field(body: &Value) -> Option<String> {
    body.pointer("/query/bool/filter")?
        .as_array()?
        .iter()
        .find_map(|c| c.get("range")?.as_object()?.keys().next().cloned())
}

/// Replays scripted answers and records which timestamp field each call used.
struct ScriptedTransport {
    answers: Mutex<VecDeque<DrilldownResult<Value>>>,
    fields: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(answers: Vec<DrilldownResult<Value>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            fields: Mutex::new(Vec::new()),
        }
    }
    fn fields(&self) -> Vec<String> {
        self.fields.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
    async fn search(&self, _index: &str, body: &Value) -> DrilldownResult<Value> {
        self.fields
            .lock()
            .unwrap()
            .push(time_field(body).unwrap_or_default());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected extra search"))
    }
}

#[tokio::test]
async fn hits_on_primary_field_need_one_call() {
    let transport = ScriptedTransport::new(vec![Ok(one_hit("first"))]);
    let result = fetch_with_retry(&transport, "logs", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(transport.fields(), vec!["created"]);
    assert_eq!(result.first_source(), Some(&json!({ "tag": "first" })));
}

#[tokio::test]
async fn zero_hits_retry_once_and_return_second_answer() {
    let transport = ScriptedTransport::new(vec![Ok(zero_hits()), Ok(zero_hits())]);
    let result = fetch_with_retry(&transport, "logs", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(transport.fields(), vec!["created", "timestamp"]);
    assert_eq!(result.key, "web");
    assert_eq!(result.results, zero_hits());
}

#[tokio::test]
async fn error_on_primary_falls_back() {
    let transport = ScriptedTransport::new(vec![
        Err(DrilldownError::Timeout(Duration::from_secs(1))),
        Ok(one_hit("fallback")),
    ]);
    let result = fetch_with_retry(&transport, "logs", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(transport.fields(), vec!["created", "timestamp"]);
    assert!(result.has_hits());
}

#[tokio::test]
async fn two_failures_resolve_to_empty_object() {
    let transport = ScriptedTransport::new(vec![
        Err(DrilldownError::Status {
            status: 502,
            url: "http://kibana/api/console/proxy".into(),
        }),
        Err(DrilldownError::Timeout(Duration::from_secs(1))),
    ]);
    let result = fetch_with_retry(&transport, "logs", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(result.results, json!({}));
}

/// Never answers its first search; answers every later one with a hit.
struct StallingTransport {
    calls: AtomicUsize,
    started: Notify,
}

#[async_trait]
impl SearchTransport for StallingTransport {
    async fn search(&self, _index: &str, _body: &Value) -> DrilldownResult<Value> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(one_hit("fresh"))
    }
}

fn stalling() -> Arc<StallingTransport> {
    Arc::new(StallingTransport {
        calls: AtomicUsize::new(0),
        started: Notify::new(),
    })
}

#[tokio::test]
async fn new_request_cancels_the_one_in_flight() {
    let transport = stalling();
    let session = Arc::new(DrilldownSession::new(transport.clone(), "logs", RetryPolicy::default()));
    let stale = {
        let session = session.clone();
        tokio::spawn(async move { session.fetch("old", &query()).await })
    };
    transport.started.notified().await;

    let fresh = session.fetch("new", &query()).await;
    assert!(fresh.has_hits());

    let stale = tokio::time::timeout(Duration::from_secs(5), stale)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale.key, "old");
    assert_eq!(stale.results, json!({}));
}

#[tokio::test]
async fn cancel_resolves_every_pending_series() {
    let transport = stalling();
    let session = Arc::new(DrilldownSession::new(transport.clone(), "logs", RetryPolicy::default()));
    let batch = {
        let session = session.clone();
        tokio::spawn(async move {
            let requests = vec![("a".to_string(), query())];
            session.fetch_all(&requests).await
        })
    };
    transport.started.notified().await;
    session.cancel().await;
    let results = tokio::time::timeout(Duration::from_secs(5), batch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].results, json!({}));
}

#[tokio::test]
async fn kibana_client_searches_through_console_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/console/proxy"))
        .and(query_param("path", "/logs-*/_search"))
        .and(query_param("method", "POST"))
        .and(header("kbn-xsrf", "true"))
        .and(body_partial_json(json!({ "query": { "bool": { "must": [] } } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_hit("proxied")))
        .expect(1)
        .mount(&server)
        .await;

    let client = KibanaClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();
    let result = fetch_with_retry(&client, "logs-*", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(result.first_source(), Some(&json!({ "tag": "proxied" })));
}

#[tokio::test]
async fn kibana_client_retries_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/console/proxy"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = KibanaClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap();
    let result = fetch_with_retry(&client, "logs", "web", &query(), &RetryPolicy::default()).await;
    assert_eq!(result.results, json!({}));
}

#[tokio::test]
async fn resolves_index_from_saved_objects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/saved_objects/visualization/vis-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "references": [{ "id": "pattern-7" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/saved_objects/index-pattern/pattern-7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "attributes": { "title": "logs-*" } })),
        )
        .mount(&server)
        .await;

    let client = KibanaClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap();
    let (pattern, title) = client.resolve_index("vis-1").await.unwrap();
    assert_eq!(pattern, "pattern-7");
    assert_eq!(title, "logs-*");
}

#[tokio::test]
async fn missing_reference_is_a_shape_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/saved_objects/visualization/vis-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "references": [] })))
        .mount(&server)
        .await;
    let client = KibanaClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap();
    assert!(matches!(
        client.index_pattern_for_visualization("vis-2").await,
        Err(DrilldownError::ResponseShape { .. })
    ));
}
