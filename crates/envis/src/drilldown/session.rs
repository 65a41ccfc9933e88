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
use super::client::{fetch_with_retry, RetryPolicy, SearchTransport, SeriesResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Issues drilldown searches for one visualization. Starting a new request
/// cancels the one still in flight; a cancelled request resolves to `{}`.
pub struct DrilldownSession<T: SearchTransport + ?Sized> {
    transport: Arc<T>,
    index: String,
    policy: RetryPolicy,
    current: Mutex<Option<CancellationToken>>,
}

impl<T: SearchTransport + ?Sized> DrilldownSession<T> {
    pub fn new(transport: Arc<T>, index: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            index: index.into(),
            policy,
            current: Mutex::new(None),
        }
    }
    pub fn index(&self) -> &str {
        &self.index
    }
    async fn supersede(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().await;
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }
    /// Cancels whatever is in flight without starting anything new.
    pub async fn cancel(&self) {
        if let Some(token) = self.current.lock().await.take() {
            token.cancel();
        }
    }
    pub async fn fetch(&self, key: &str, query: &DrilldownQuery) -> SeriesResult {
        let token = self.supersede().await;
        tokio::select! {
            _ = token.cancelled() => {
                debug!(key, "drilldown superseded");
                SeriesResult::empty(key)
            }
            result = fetch_with_retry(self.transport.as_ref(), &self.index, key, query, &self.policy) => result,
        }
    }
    /// One request per series, all cancelled together by the next call.
    pub async fn fetch_all(&self, requests: &[(String, DrilldownQuery)]) -> Vec<SeriesResult> {
        let token = self.supersede().await;
        let searches = requests.iter().map(|(key, query)| {
            let token = token.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => SeriesResult::empty(key.as_str()),
                    result = fetch_with_retry(self.transport.as_ref(), &self.index, key, query, &self.policy) => result,
                }
            }
        });
        join_all(searches).await
    }
}
