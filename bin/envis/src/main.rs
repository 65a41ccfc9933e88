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

use anyhow::Result;
use clap::{Parser, Subcommand};
use envis::drilldown::TimeRange;
use envis::{
    ChartKind, Datatable, DrilldownLinkBuilder, DrilldownQuery, DrilldownSession, EnvisConfig,
    EnvisError, ErrorReporter, KibanaClient, KibanaLocation, ParsedQuery, RetryPolicy, VisParams,
    VisSession,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "envis", about = "Chart, legend and drilldown pipeline for Kibana datatables")]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Datatable JSON to graph, legend and query map.
    Graph {
        #[arg(long, default_value = "line")]
        kind: ChartKind,
        #[arg(long, value_name = "FILE")]
        table: PathBuf,
        #[arg(long, value_name = "FILE")]
        params: Option<PathBuf>,
        /// Keys to hide before printing.
        #[arg(long, value_delimiter = ',')]
        hide: Vec<String>,
    },
    /// Free-text query and time range to an Elasticsearch body.
    Query {
        text: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        timestamp_field: Option<String>,
    },
    /// Runs one series' drilldown search against Kibana.
    Drilldown {
        /// The visualize edit URL the drilldown starts from.
        #[arg(long)]
        url: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "series")]
        key: String,
        #[arg(long, default_value = "")]
        excluded: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();
    let config = EnvisConfig::load(cli.config.as_deref()).map_err(EnvisError::from);
    let result = match config {
        Ok(config) => run(cli.cmd, &config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        eprintln!("{}", ErrorReporter::new().report(e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cmd: Command, config: &EnvisConfig) -> envis::Result<()> {
    let output = match cmd {
        Command::Graph {
            kind,
            table,
            params,
            hide,
        } => graph(kind, &table, params.as_deref(), &hide, config)?,
        Command::Query {
            text,
            from,
            to,
            timestamp_field,
        } => {
            let mut query = DrilldownQuery::new(ParsedQuery::parse(&text)?);
            if let (Some(from), Some(to)) = (from, to) {
                query = query.with_time_range(TimeRange { from, to });
            }
            let field = timestamp_field.unwrap_or_else(|| config.drilldown.primary_timestamp_field.clone());
            query.body(&field).to_json()
        }
        Command::Drilldown {
            url,
            query,
            key,
            excluded,
        } => drilldown(&url, &query, &key, &excluded, config).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_json(path: &Path) -> envis::Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn graph(
    kind: ChartKind,
    table: &Path,
    params: Option<&Path>,
    hide: &[String],
    config: &EnvisConfig,
) -> envis::Result<Value> {
    let table = Datatable::from_json(&read_json(table)?)?;
    let mut session = VisSession::new(kind, config);
    if let Some(path) = params {
        session.set_params(VisParams::from_json(kind, &read_json(path)?)?)?;
    }
    session.update(&table)?;
    for key in hide {
        session.toggle(key);
    }
    Ok(json!({
        "graph": session.graph(),
        "legend": session.legend(),
        "queries": session.queries(),
        "overlay": session.regression_overlay(),
    }))
}

async fn drilldown(
    url: &str,
    series_query: &str,
    key: &str,
    excluded: &str,
    config: &EnvisConfig,
) -> envis::Result<Value> {
    let location = KibanaLocation::parse(url)?;
    let api_base = match &config.kibana.base_url {
        Some(base) => format!("{}/api/", base.trim_end_matches('/')),
        None => location.api_base(),
    };
    let client = Arc::new(KibanaClient::new(&api_base, config.timeout())?);
    let (pattern, index) = client.resolve_index(&location.visualization_id).await?;

    let link = DrilldownLinkBuilder::new(&location, pattern.as_str(), &config.drilldown)
        .with_excluded(excluded)
        .link(key, series_query, &Default::default());
    let query = DrilldownQuery::for_series(series_query, &location)?;
    let session = DrilldownSession::new(client, index, RetryPolicy::from(&config.drilldown));
    let result = session.fetch(key, &query).await;
    info!(key, hits = result.has_hits(), "drilldown finished");
    Ok(json!({
        "link": link,
        "results": result.results,
    }))
}
