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

//! Drilldown: from a series key to an Elasticsearch query, a follow-up
//! visualization link and the search results behind it.

pub mod body;
pub mod client;
pub mod filter;
pub mod host;
pub mod link;
pub mod query;
pub mod rison;
pub mod session;

pub use body::{DrilldownQuery, QueryBody, TimeRange};
pub use client::{fetch_with_retry, has_hits, KibanaClient, RetryPolicy, SearchTransport, SeriesResult};
pub use filter::{decode_phrase_value, FilterClause, FilterKind};
pub use host::KibanaLocation;
pub use link::{DrilldownLink, DrilldownLinkBuilder};
pub use query::{Comparison, Connective, ParsedQuery, QueryTerm};
pub use session::DrilldownSession;
