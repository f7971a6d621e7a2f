//! YAML configuration for the `erpmap` binary.

use std::fs;
use std::path::Path;

use anyhow::Context;
use erpmap_export::ExportFormat;
use erpmap_store::ConnectionConfig;
use serde::Deserialize;

/// Database file used when neither the config nor `--database` names one.
pub const DEFAULT_DATABASE: &str = "erpmap.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: ConnectionConfig,
    pub export: ExportDefaults,
    pub log_level: Option<String>,
}

/// Defaults for the `export` command, overridable by flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportDefaults {
    pub format: ExportFormat,
    pub flatten: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: ConnectionConfig::local(DEFAULT_DATABASE),
            export: ExportDefaults::default(),
            log_level: None,
        }
    }
}

impl AppConfig {
    /// Read the config file if one was given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.database.validate()?;
        Ok(config)
    }
}
