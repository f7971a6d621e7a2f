#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # erpmap-model
//!
//! Value model and domain types shared by every layer of the ERP export engine.
//!
//! Source and target records are insertion-ordered maps of [`Value`]s, so the
//! order in which rules write keys is the order in which they are rendered.

/// ERP and field-mapping rule definitions.
pub mod erp;
/// Invoice header and line-item types.
pub mod invoice;
/// Dynamically typed cell values.
pub mod value;

pub use erp::{Erp, FieldMapping, Status};
pub use invoice::{Invoice, InvoiceItem};
pub use value::Value;

use thiserror::Error;

/// An insertion-ordered record of named values.
pub type Record = indexmap::IndexMap<String, Value>;

/// Errors that can occur when working with the model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid status '{value}': expected ACTIVE or INACTIVE")]
    InvalidStatus { value: String },

    #[error("Conversion error in {context}: {message}")]
    Conversion { context: String, message: String },
}

impl Error {
    /// Build an invalid-status error for the rejected input.
    pub fn invalid_status(value: impl Into<String>) -> Self {
        Self::InvalidStatus {
            value: value.into(),
        }
    }

    /// Build a conversion error with conversion context.
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;
