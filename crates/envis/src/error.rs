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

use std::time::Duration;
use thiserror::Error;
#[derive(Error, Debug)]
pub enum EnvisError {
    #[error("Table metadata error: {0}")]
    Table(#[from] TableError),
    #[error("Label template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Query parsing error: {0}")]
    Query(#[from] QueryError),
    #[error("Drilldown error: {0}")]
    Drilldown(#[from] DrilldownError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] SerialisationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Malformed column id '{id}': expected col-<level>-<aggId>")]
    MalformedColumnId { id: String },
}
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Failed to render label template '{template}': {reason}")]
    Render { template: String, reason: String },
}
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query term '{term}' has no field name")]
    MissingField { term: String },
    #[error("Query term '{term}' has no value")]
    MissingValue { term: String },
    #[error("Query term '{term}' has no ':' or comparison operator")]
    MissingOperator { term: String },
    #[error("Unterminated quoted value in '{input}'")]
    UnterminatedQuote { input: String },
    #[error("Invalid Rison at offset {offset}: {reason}")]
    Rison { offset: usize, reason: String },
    #[error("Not a visualize edit URL: {url}")]
    UnrecognisedUrl { url: String },
    #[error("Missing '{part}' in host state")]
    MissingState { part: String },
}
#[derive(Error, Debug)]
pub enum DrilldownError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Unexpected response shape: {reason}")]
    ResponseShape { reason: String },
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {source}")]
    TomlParseError {
        #[from]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {field} = {value}")]
    InvalidValue { field: String, value: String },
    #[error("Invalid visualization parameters: {source}")]
    InvalidParams {
        #[source]
        source: serde_json::Error,
    },
}
#[derive(Error, Debug)]
pub enum SerialisationError {
    #[error("JSON serialisation failed: {source}")]
    JsonSerialisationError {
        #[from]
        source: serde_json::Error,
    },
}
pub type Result<T> = std::result::Result<T, EnvisError>;
pub type TableResult<T> = std::result::Result<T, TableError>;
pub type QueryResult<T> = std::result::Result<T, QueryError>;
pub type DrilldownResult<T> = std::result::Result<T, DrilldownError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
impl From<serde_json::Error> for EnvisError {
    fn from(err: serde_json::Error) -> Self {
        EnvisError::Serialisation(SerialisationError::JsonSerialisationError { source: err })
    }
}
impl EnvisError {
    /// Everything except I/O and configuration failures leaves the session usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EnvisError::Io(_) | EnvisError::Config(_))
    }
    pub fn category(&self) -> &'static str {
        match self {
            EnvisError::Table(_) => "Table",
            EnvisError::Template(_) => "Template",
            EnvisError::Query(_) => "Query",
            EnvisError::Drilldown(_) => "Drilldown",
            EnvisError::Config(_) => "Configuration",
            EnvisError::Serialisation(_) => "Serialisation",
            EnvisError::Io(_) => "I/O",
        }
    }
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EnvisError::Table(TableError::MalformedColumnId { .. }) => ErrorSeverity::Warning,
            EnvisError::Template(_) => ErrorSeverity::Info,
            EnvisError::Query(_) | EnvisError::Drilldown(_) => ErrorSeverity::Warning,
            EnvisError::Config(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            EnvisError::Table(TableError::MalformedColumnId { .. }) => vec![
                "Check that the datatable comes from an esaggs expression".to_string(),
                "Bucket column ids must look like col-<level>-<aggId>".to_string(),
            ],
            EnvisError::Query(QueryError::MissingOperator { .. }) => vec![
                "Write terms as field:value or field>value".to_string(),
                "Join terms with 'and' or 'or'".to_string(),
            ],
            EnvisError::Drilldown(DrilldownError::Status { .. }) => vec![
                "Verify the Kibana base URL and that the console proxy is enabled".to_string(),
            ],
            _ => vec!["Check the error message for specific guidance".to_string()],
        }
    }
    pub fn user_message(&self) -> String {
        match self {
            EnvisError::Table(TableError::MalformedColumnId { id }) => format!(
                "The visualization could not read column '{id}'. The chart is shown without it."
            ),
            EnvisError::Drilldown(_) => {
                "Drilldown data is unavailable right now. Try again or adjust the query.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}
impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }
    pub fn color_code(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "\x1b[36m",
            ErrorSeverity::Warning => "\x1b[33m",
            ErrorSeverity::Error => "\x1b[31m",
            ErrorSeverity::Critical => "\x1b[35m",
        }
    }
}
/// Renders errors as diagnostics for the host UI or a terminal.
pub struct ErrorReporter {
    pub show_suggestions: bool,
    pub colored_output: bool,
}
impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            show_suggestions: true,
            colored_output: true,
        }
    }
    pub fn plain() -> Self {
        Self {
            show_suggestions: true,
            colored_output: false,
        }
    }
    pub fn report(&self, error: &EnvisError) -> String {
        let severity = error.severity();
        let mut output = String::new();
        if self.colored_output {
            output.push_str(severity.color_code());
        }
        output.push_str(&format!(
            "[{}] {}: {}\n",
            severity.as_str(),
            error.category(),
            error
        ));
        if self.colored_output {
            output.push_str("\x1b[0m");
        }
        if self.show_suggestions {
            let suggestions = error.suggestions();
            if !suggestions.is_empty() {
                output.push_str("\nSuggestions:\n");
                for suggestion in suggestions {
                    output.push_str(&format!("  • {suggestion}\n"));
                }
            }
        }
        output
    }
}
impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_a_recoverable_warning() {
        let err = EnvisError::from(TableError::MalformedColumnId {
            id: "bucket-7".to_string(),
        });
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.category(), "Table");
        assert!(err.user_message().contains("bucket-7"));
    }

    #[test]
    fn plain_report_has_no_escape_codes() {
        let err = EnvisError::from(QueryError::MissingOperator {
            term: "status".to_string(),
        });
        let report = ErrorReporter::plain().report(&err);
        assert!(report.starts_with("[WARNING] Query:"));
        assert!(!report.contains('\x1b'));
        assert!(report.contains("field:value"));
    }
}
