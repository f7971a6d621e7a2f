//! # erpmap-mapping
//!
//! Transform-function registry and rule application for ERP field mappings.
//!
//! A [`TransformRegistry`] resolves transform specs such as `TRIM` or
//! `DATE_FMT:dd/MM/yyyy` to named functions, and [`DynamicMappingService`]
//! applies an ordered list of field-mapping rules to one source record.

pub mod builtins;
pub mod date_pattern;
pub mod registry;
pub mod service;

pub use registry::{FnTransform, TransformFunction, TransformRegistry, TransformSpec};
pub use service::DynamicMappingService;

use thiserror::Error;

/// Errors that can occur during mapping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Transform error in {function}: {message}")]
    Transform { function: String, message: String },

    #[error("Rule '{source_field}' -> '{target_field}' failed: {source}")]
    Rule {
        source_field: String,
        target_field: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Create a transform error attributed to a named function.
    pub fn transform(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the rule that produced it.
    pub fn rule(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        source: Error,
    ) -> Self {
        Self::Rule {
            source_field: source_field.into(),
            target_field: target_field.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
