//! Rule application
//!
//! Applies an ordered list of field-mapping rules to one source record.

use erpmap_model::{FieldMapping, Record, Value};
use std::sync::Arc;
use tracing::trace;

use crate::registry::TransformRegistry;

/// Stateless mapper from source records to target records
#[derive(Debug, Clone, Default)]
pub struct DynamicMappingService {
    registry: Arc<TransformRegistry>,
}

impl DynamicMappingService {
    /// Create a service backed by a shared registry
    #[must_use]
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self { registry }
    }

    /// The registry used to resolve transform specs
    #[must_use]
    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Map one source record through `rules`
    ///
    /// The output holds exactly the rules' target fields. Rules run in order
    /// and a later rule overwrites the value of an earlier rule with the same
    /// target field; the key keeps the position of its first write. A missing
    /// source field reads as `Null`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rule`] when a transform rejects its value; the
    /// whole record fails.
    pub fn apply(&self, rules: &[FieldMapping], source: &Record) -> crate::Result<Record> {
        let mut target = Record::with_capacity(rules.len());

        for rule in rules {
            let value = source.get(&rule.source_field).cloned().unwrap_or(Value::Null);
            let value = self
                .registry
                .apply(rule.transform_fn.as_deref(), value)
                .map_err(|error| {
                    crate::Error::rule(&rule.source_field, &rule.target_field, error)
                })?;
            trace!(
                source_field = %rule.source_field,
                target_field = %rule.target_field,
                "Applied rule"
            );
            target.insert(rule.target_field.clone(), value);
        }

        Ok(target)
    }

    /// Map many source records, failing on the first bad record
    ///
    /// # Errors
    ///
    /// Returns the first rule failure.
    pub fn apply_all(&self, rules: &[FieldMapping], sources: &[Record]) -> crate::Result<Vec<Record>> {
        sources
            .iter()
            .map(|source| self.apply(rules, source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use erpmap_model::Status;

    fn rule(source: &str, target: &str, transform: Option<&str>) -> FieldMapping {
        let now = Utc::now();
        FieldMapping {
            id: 0,
            erp_id: 1,
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform_fn: transform.map(str::to_string),
            status: Status::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_rules_yield_empty_record() {
        let service = DynamicMappingService::default();
        let source = record(&[("a", Value::from("x"))]);
        assert!(service.apply(&[], &source).unwrap().is_empty());
    }

    #[test]
    fn test_missing_source_field_reads_null() {
        let service = DynamicMappingService::default();
        let out = service
            .apply(&[rule("missing", "out", Some("TRIM"))], &Record::new())
            .unwrap();
        assert_eq!(out.get("out"), Some(&Value::Null));
    }

    #[test]
    fn test_last_write_wins_keeps_first_position() {
        let service = DynamicMappingService::default();
        let source = record(&[
            ("a", Value::from("first")),
            ("b", Value::from("second")),
            ("c", Value::from("other")),
        ]);
        let rules = [
            rule("a", "x", None),
            rule("c", "y", None),
            rule("b", "x", Some("UPPER")),
        ];

        let out = service.apply(&rules, &source).unwrap();
        assert_eq!(out.get("x"), Some(&Value::from("SECOND")));
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_transform_failure_names_the_rule() {
        let service = DynamicMappingService::default();
        let source = record(&[("issueDate", Value::from("yesterday"))]);
        let error = service
            .apply(&[rule("issueDate", "issuedOn", Some("DATE_FMT:yyyy"))], &source)
            .unwrap_err();

        match error {
            crate::Error::Rule {
                source_field,
                target_field,
                source,
            } => {
                assert_eq!(source_field, "issueDate");
                assert_eq!(target_field, "issuedOn");
                assert!(matches!(*source, crate::Error::Transform { .. }));
            }
            other => panic!("expected rule error, got {other:?}"),
        }
    }
}
