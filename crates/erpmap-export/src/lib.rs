#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # erpmap-export
//!
//! Export orchestration: approved invoices are turned into source records,
//! mapped through the ERP's active rules, and rendered as JSON or CSV.

pub mod format;
pub mod push;
pub mod rows;
pub mod serializer;
pub mod service;

pub use format::ExportFormat;
pub use push::{ErpPusher, LoggingPusher};
pub use rows::{RowBuilder, known_fields};
pub use serializer::{to_csv, to_json};
pub use service::{ExportOutput, ExportRequest, ExportService};

use thiserror::Error;

/// Errors that can occur while producing an export
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] erpmap_store::Error),

    #[error(transparent)]
    Mapping(#[from] erpmap_mapping::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Push to '{erp}' failed: {message}")]
    Push { erp: String, message: String },

    #[error("Unknown export format '{0}': expected json or csv")]
    UnknownFormat(String),
}

impl Error {
    /// Create a push failure for the given ERP.
    pub fn push(erp: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Push {
            erp: erp.into(),
            message: message.into(),
        }
    }

    /// Whether the export failed because the ERP does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_not_found())
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::Csv(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
