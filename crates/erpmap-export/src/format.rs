//! Output formats

use std::fmt;
use std::str::FromStr;

use erpmap_model::Record;
use serde::Deserialize;

use crate::serializer::{to_csv, to_json};
use crate::{Error, Result};

/// Export output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    /// Attachment name for downloads; JSON is returned inline.
    pub fn file_name(self) -> Option<&'static str> {
        match self {
            ExportFormat::Json => None,
            ExportFormat::Csv => Some("export.csv"),
        }
    }

    /// # Errors
    ///
    /// Returns a serialization error from the underlying renderer.
    pub fn render(self, rows: &[Record]) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Json => Ok(to_json(rows)?.into_bytes()),
            ExportFormat::Csv => to_csv(rows),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}
