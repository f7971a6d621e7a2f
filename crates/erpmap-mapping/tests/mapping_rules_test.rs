//! Integration test: rule application over invoice-shaped records
//!
//! Covers the documented mapping behaviour end to end: transforms chosen by
//! rule specs, last-write-wins on duplicate targets, and strict projection.

use chrono::{NaiveDate, Utc};
use erpmap_mapping::{DynamicMappingService, FnTransform, TransformRegistry};
use erpmap_model::{FieldMapping, Record, Status, Value};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;

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

fn invoice_source() -> Record {
    let mut source = Record::new();
    source.insert(
        "senderBusinessName".to_string(),
        Value::from(" example corp "),
    );
    source.insert("documentType".to_string(), Value::from("FV"));
    source.insert(
        "issueDate".to_string(),
        Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
    );
    source.insert("amount".to_string(), Value::Decimal(Decimal::new(2500, 2)));
    source
}

fn sap_rules() -> Vec<FieldMapping> {
    vec![
        rule("senderBusinessName", "customer", Some("TRIM")),
        rule("documentType", "docType", Some("UPPER")),
        rule("issueDate", "issuedOn", Some("DATE_FMT:yyyy-MM-dd")),
        rule("amount", "gross", None),
    ]
}

#[test]
fn test_invoice_scenario_maps_all_fields() {
    let service = DynamicMappingService::default();
    let target = service.apply(&sap_rules(), &invoice_source()).unwrap();

    let mut expected = Record::new();
    expected.insert("customer".to_string(), Value::from("example corp"));
    expected.insert("docType".to_string(), Value::from("FV"));
    expected.insert("issuedOn".to_string(), Value::from("2024-03-15"));
    expected.insert("gross".to_string(), Value::Decimal(Decimal::new(2500, 2)));

    assert_eq!(target, expected);
    let keys: Vec<&String> = target.keys().collect();
    assert_eq!(keys, vec!["customer", "docType", "issuedOn", "gross"]);
}

#[test]
fn test_second_rule_for_same_target_wins() {
    let service = DynamicMappingService::default();
    let mut source = Record::new();
    source.insert("a".to_string(), Value::from("from a"));
    source.insert("b".to_string(), Value::from("  from b  "));

    let rules = vec![rule("a", "x", Some("UPPER")), rule("b", "x", Some("TRIM"))];
    let target = service.apply(&rules, &source).unwrap();

    assert_eq!(target.len(), 1);
    assert_eq!(target.get("x"), Some(&Value::from("from b")));
}

#[test]
fn test_projection_only_emits_target_fields() {
    let service = DynamicMappingService::default();
    let mut source = invoice_source();
    source.insert("status".to_string(), Value::from("APPROVED"));
    source.insert("receiverTaxId".to_string(), Value::from("900123"));

    let rule_sets: Vec<Vec<FieldMapping>> = vec![
        vec![],
        vec![rule("amount", "gross", None)],
        vec![rule("nope", "ghost", None), rule("status", "state", Some("UPPER"))],
        sap_rules(),
        vec![rule("amount", "a", None), rule("amount", "a", None)],
    ];

    for rules in rule_sets {
        let target = service.apply(&rules, &source).unwrap();
        for key in target.keys() {
            assert!(
                rules.iter().any(|r| &r.target_field == key),
                "unexpected key {key}"
            );
        }
        for r in &rules {
            assert!(target.contains_key(&r.target_field));
        }
    }
}

#[test]
fn test_unknown_transform_passes_value_through() {
    let service = DynamicMappingService::default();
    let target = service
        .apply(&[rule("documentType", "docType", Some("LOWER"))], &invoice_source())
        .unwrap();
    assert_eq!(target.get("docType"), Some(&Value::from("FV")));
}

#[test]
fn test_bad_date_fails_the_whole_record() {
    let service = DynamicMappingService::default();
    let mut source = invoice_source();
    source.insert("issueDate".to_string(), Value::from("15.03.2024"));

    assert!(service.apply(&sap_rules(), &source).is_err());
}

#[test]
fn test_custom_transform_through_service() {
    let mut registry = TransformRegistry::with_builtins();
    registry.register(FnTransform::new("PAD", |value, arg| {
        let width: usize = arg.and_then(|a| a.parse().ok()).unwrap_or(0);
        Ok(match value {
            Value::Null => Value::Null,
            other => Value::String(format!("{:0>width$}", other.to_string())),
        })
    }));
    let service = DynamicMappingService::new(Arc::new(registry));

    let mut source = Record::new();
    source.insert("documentNumber".to_string(), Value::Integer(42));
    let target = service
        .apply(&[rule("documentNumber", "docNo", Some("PAD:6"))], &source)
        .unwrap();
    assert_eq!(target.get("docNo"), Some(&Value::from("000042")));
}

#[test]
fn test_concurrent_application_is_deterministic() -> anyhow::Result<()> {
    let service = Arc::new(DynamicMappingService::default());
    let rules = Arc::new(sap_rules());
    let expected = service.apply(&rules, &invoice_source())?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let rules = Arc::clone(&rules);
            thread::spawn(move || {
                (0..50)
                    .map(|_| service.apply(&rules, &invoice_source()))
                    .collect::<Result<Vec<_>, _>>()
            })
        })
        .collect();

    for handle in handles {
        let results = handle.join().expect("worker panicked")?;
        assert!(results.iter().all(|r| r == &expected));
    }
    Ok(())
}
