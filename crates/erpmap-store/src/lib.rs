//! # erpmap-store
//!
//! Mapping-rule persistence, the per-ERP rule cache, and the invoice source.
//!
//! [`MappingRepository`] is the entry point used by exports: it resolves an
//! ERP name to its ordered active rules through a [`RuleCache`], and every
//! write it performs invalidates the affected ERP's cache entry before
//! returning.

pub mod cache;
pub mod config;
#[cfg(feature = "libsql")]
pub mod database;
pub mod memory;
pub mod repository;
pub mod store;

pub use cache::RuleCache;
pub use config::ConnectionConfig;
#[cfg(feature = "libsql")]
pub use database::LibsqlStore;
pub use memory::MemoryStore;
pub use repository::MappingRepository;
pub use store::{FieldMappingUpdate, InvoiceSource, MappingStore, NewErp, NewFieldMapping};

use thiserror::Error;

/// Errors that can occur when reading or writing mapping data.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Conflict: {details}")]
    Conflict { details: String },

    #[error("Validation error: {details}")]
    Validation { details: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Connection error: {details}")]
    Connection { details: String },

    #[cfg(feature = "libsql")]
    #[error("Libsql error during {context}: {source}")]
    Libsql {
        context: String,
        #[source]
        source: libsql::Error,
    },

    #[cfg(feature = "libsql")]
    #[error("SQL error executing `{statement}`: {source}")]
    Sql {
        statement: String,
        #[source]
        source: libsql::Error,
    },

    #[error("Decode error in column '{column}': {details}")]
    Decode { column: String, details: String },

    #[error(transparent)]
    Model(#[from] erpmap_model::Error),
}

impl Error {
    /// Unknown ERP name or id.
    pub fn erp_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "ERP",
            key: key.to_string(),
        }
    }

    /// Unknown mapping rule id.
    pub fn mapping_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Mapping",
            key: id.to_string(),
        }
    }

    pub fn validation(details: impl Into<String>) -> Self {
        Self::Validation {
            details: details.into(),
        }
    }

    pub fn conflict(details: impl Into<String>) -> Self {
        Self::Conflict {
            details: details.into(),
        }
    }

    pub fn decode(column: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            details: details.into(),
        }
    }

    /// Whether this is a not-found condition, as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_carry_entity_and_key() {
        let error = Error::erp_not_found("SAP");
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "ERP not found: SAP");

        let error = Error::mapping_not_found(12);
        assert_eq!(error.to_string(), "Mapping not found: 12");
    }

    #[test]
    fn model_errors_convert_transparently() {
        let error: Error = erpmap_model::Error::invalid_status("GONE").into();
        assert!(!error.is_not_found());
        assert!(error.to_string().contains("GONE"));
    }
}
