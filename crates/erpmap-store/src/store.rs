//! Collaborator interfaces and write requests
//!
//! [`MappingStore`] persists ERPs and their rules; [`InvoiceSource`] yields the
//! approved invoices to export. Both are object safe so callers can hold them
//! as `Arc<dyn ...>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use erpmap_model::{Erp, FieldMapping, Invoice, Status};
use serde::Deserialize;

use crate::{Error, Result};

/// Persistence for ERPs and their field-mapping rules
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Resolve an ERP by name, ignoring case
    async fn find_erp_by_name(&self, name: &str) -> Result<Option<Erp>>;

    async fn find_erp(&self, id: i64) -> Result<Option<Erp>>;

    async fn list_erps(&self) -> Result<Vec<Erp>>;

    /// Create an ERP; names are unique ignoring case
    async fn create_erp(&self, erp: NewErp) -> Result<Erp>;

    async fn set_erp_status(&self, id: i64, status: Status) -> Result<Erp>;

    /// Rules of one ERP in creation order, optionally filtered by status
    async fn list_rules(&self, erp_id: i64, status: Option<Status>) -> Result<Vec<FieldMapping>>;

    async fn find_rule(&self, id: i64) -> Result<Option<FieldMapping>>;

    async fn create_rule(&self, erp_id: i64, rule: NewFieldMapping) -> Result<FieldMapping>;

    async fn update_rule(&self, id: i64, update: FieldMappingUpdate) -> Result<FieldMapping>;

    async fn set_rule_status(&self, id: i64, status: Status) -> Result<FieldMapping>;

    /// Whether the ERP already maps `source_field` (ignoring case, any status)
    async fn exists_rule_for_source(&self, erp_id: i64, source_field: &str) -> Result<bool>;
}

/// Source of invoices eligible for export
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Approved invoices ordered by id, each with items in stored order
    async fn find_approved(&self) -> Result<Vec<erpmap_model::Invoice>>;
}

/// Request to create an ERP
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewErp {
    pub name: String,
}

impl NewErp {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// # Errors
    ///
    /// Returns a validation error for a blank name.
    pub fn validate(&self) -> Result<()> {
        require_non_blank("name", &self.name)
    }
}

/// Request to create a mapping rule under an ERP
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldMapping {
    pub erp_name: String,
    pub source_field: String,
    pub target_field: String,
    #[serde(default)]
    pub transform_fn: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl NewFieldMapping {
    pub fn new(
        erp_name: impl Into<String>,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            erp_name: erp_name.into(),
            source_field: source_field.into(),
            target_field: target_field.into(),
            transform_fn: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform_fn: impl Into<String>) -> Self {
        self.transform_fn = Some(transform_fn.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// # Errors
    ///
    /// Returns a validation error if a required field is blank.
    pub fn validate(&self) -> Result<()> {
        require_non_blank("erpName", &self.erp_name)?;
        require_non_blank("sourceField", &self.source_field)?;
        require_non_blank("targetField", &self.target_field)
    }

    /// Build the stored rule; status defaults to ACTIVE and version to 1
    pub fn into_rule(self, id: i64, erp_id: i64, now: DateTime<Utc>) -> FieldMapping {
        FieldMapping {
            id,
            erp_id,
            source_field: self.source_field,
            target_field: self.target_field,
            transform_fn: normalize_transform(self.transform_fn),
            status: self.status.unwrap_or_default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a mapping rule; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMappingUpdate {
    pub source_field: Option<String>,
    pub target_field: Option<String>,
    /// An empty string clears the transform
    pub transform_fn: Option<String>,
    pub status: Option<Status>,
}

impl FieldMappingUpdate {
    /// # Errors
    ///
    /// Returns a validation error if a provided field name is blank.
    pub fn validate(&self) -> Result<()> {
        if let Some(source) = &self.source_field {
            require_non_blank("sourceField", source)?;
        }
        if let Some(target) = &self.target_field {
            require_non_blank("targetField", target)?;
        }
        Ok(())
    }

    /// Apply the provided fields in place. `version` is left as-is.
    pub fn apply_to(&self, rule: &mut FieldMapping, now: DateTime<Utc>) {
        if let Some(source) = &self.source_field {
            rule.source_field.clone_from(source);
        }
        if let Some(target) = &self.target_field {
            rule.target_field.clone_from(target);
        }
        if let Some(transform) = &self.transform_fn {
            rule.transform_fn = normalize_transform(Some(transform.clone()));
        }
        if let Some(status) = self.status {
            rule.status = status;
        }
        rule.updated_at = now;
    }
}

/// Build a fresh ACTIVE ERP record
pub(crate) fn new_erp_record(id: i64, name: &str, now: DateTime<Utc>) -> Erp {
    Erp {
        id,
        name: name.trim().to_string(),
        status: Status::Active,
        created_at: now,
        updated_at: now,
    }
}

fn normalize_transform(transform: Option<String>) -> Option<String> {
    transform.filter(|t| !t.trim().is_empty())
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Invoices kept in memory, filtered and ordered like a database query
pub(crate) fn approved_in_order(invoices: &[Invoice]) -> Vec<Invoice> {
    let mut approved: Vec<Invoice> = invoices
        .iter()
        .filter(|invoice| invoice.is_approved())
        .cloned()
        .collect();
    approved.sort_by_key(|invoice| invoice.id);
    approved
}
