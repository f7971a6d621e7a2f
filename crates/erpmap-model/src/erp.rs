//! ERP destinations and their field-mapping rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status shared by ERPs and mapping rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Participates in exports
    #[default]
    Active,

    /// Retained for audit/history, ignored by exports
    Inactive,
}

impl Status {
    /// Canonical upper-case spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "ACTIVE",
            Status::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("ACTIVE") {
            Ok(Status::Active)
        } else if trimmed.eq_ignore_ascii_case("INACTIVE") {
            Ok(Status::Inactive)
        } else {
            Err(crate::Error::invalid_status(s))
        }
    }
}

/// An export destination identified by a case-insensitive name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erp {
    pub id: i64,
    pub name: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Erp {
    /// Key used for case-insensitive lookup and caching
    #[must_use]
    pub fn lookup_key(&self) -> String {
        lookup_key(&self.name)
    }
}

/// Normalize an ERP name into its lookup key
#[must_use]
pub fn lookup_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A rule translating one source field into one target field
///
/// `transform_fn` is either `NAME` or `NAME:ARG`. `version` starts at 1 and is
/// stored as-is; nothing increments or checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub id: i64,
    pub erp_id: i64,
    pub source_field: String,
    pub target_field: String,
    pub transform_fn: Option<String>,
    pub status: Status,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldMapping {
    /// Whether the rule participates in exports
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_case_insensitively() {
        assert_eq!("active".parse::<Status>().unwrap(), Status::Active);
        assert_eq!(" Inactive ".parse::<Status>().unwrap(), Status::Inactive);
        assert!("DELETED".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Status::Inactive).unwrap(),
            "\"INACTIVE\""
        );
    }

    #[test]
    fn test_lookup_key_normalizes_case() {
        assert_eq!(lookup_key(" SAP "), "sap");
        assert_eq!(lookup_key("Sap"), lookup_key("sAP"));
    }
}
