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

use crate::error::{ConfigError, ConfigResult};
use crate::palette::{to_hex, ColorScheme};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnvisConfig {
    pub kibana: KibanaConfigSection,
    pub drilldown: DrilldownConfigSection,
    pub legend: LegendConfigSection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KibanaConfigSection {
    /// Root of the Kibana app, ending in `/`; usually taken from the visualize URL.
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DrilldownConfigSection {
    pub primary_timestamp_field: String,
    pub fallback_timestamp_field: String,
    pub default_bar_color: String,
    pub vis_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LegendConfigSection {
    pub default_color_scheme: ColorScheme,
}

impl Default for KibanaConfigSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: 30,
        }
    }
}
impl Default for DrilldownConfigSection {
    fn default() -> Self {
        Self {
            primary_timestamp_field: "created".to_string(),
            fallback_timestamp_field: "timestamp".to_string(),
            default_bar_color: "#32968E".to_string(),
            vis_type: "histogram".to_string(),
        }
    }
}
impl Default for LegendConfigSection {
    fn default() -> Self {
        Self {
            default_color_scheme: ColorScheme::TenColor,
        }
    }
}
impl Default for EnvisConfig {
    fn default() -> Self {
        Self {
            kibana: KibanaConfigSection::default(),
            drilldown: DrilldownConfigSection::default(),
            legend: LegendConfigSection::default(),
        }
    }
}

fn parse_env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}

impl EnvisConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: EnvisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
    pub fn load_from_file(config_path: &Path) -> ConfigResult<Self> {
        let content =
            fs::read_to_string(config_path).map_err(|source| ConfigError::ConfigFileError {
                path: config_path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content)
    }
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config/envis.toml")
    }
    /// Reads the file if given (or the default path if it exists), then
    /// applies `ENVIS_*` overrides.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let path = Self::default_config_path();
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    debug!("no config file, using defaults");
                    Self::default()
                }
            }
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = parse_env_string("ENVIS_KIBANA_URL") {
            self.kibana.base_url = Some(url);
        }
        if let Some(secs) = parse_env_u64("ENVIS_TIMEOUT_SECS") {
            self.kibana.timeout_seconds = secs;
        }
        if let Some(field) = parse_env_string("ENVIS_TIMESTAMP_FIELD") {
            self.drilldown.primary_timestamp_field = field;
        }
        if let Some(field) = parse_env_string("ENVIS_FALLBACK_TIMESTAMP_FIELD") {
            self.drilldown.fallback_timestamp_field = field;
        }
        self
    }
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, value: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };
        if let Some(base) = &self.kibana.base_url {
            Url::parse(base).map_err(|_| invalid("kibana.base_url", base))?;
        }
        if self.kibana.timeout_seconds == 0 {
            return Err(invalid("kibana.timeout_seconds", "0"));
        }
        if self.drilldown.primary_timestamp_field.trim().is_empty() {
            return Err(invalid("drilldown.primary_timestamp_field", ""));
        }
        if self.drilldown.fallback_timestamp_field.trim().is_empty() {
            return Err(invalid("drilldown.fallback_timestamp_field", ""));
        }
        if to_hex(&self.drilldown.default_bar_color).is_none() {
            return Err(invalid(
                "drilldown.default_bar_color",
                &self.drilldown.default_bar_color,
            ));
        }
        Ok(())
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.kibana.timeout_seconds)
    }
}
