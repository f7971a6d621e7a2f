//! In-process store for tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use erpmap_model::erp::lookup_key;
use erpmap_model::{Erp, FieldMapping, Invoice, Status};
use tokio::sync::RwLock;

use crate::store::{
    FieldMappingUpdate, InvoiceSource, MappingStore, NewErp, NewFieldMapping, approved_in_order,
    new_erp_record,
};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct State {
    erps: Vec<Erp>,
    rules: Vec<FieldMapping>,
    invoices: Vec<Invoice>,
    next_erp_id: i64,
    next_rule_id: i64,
}

/// Mapping store and invoice source held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    rule_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times rules were listed, for observing cache hits.
    pub fn rule_queries(&self) -> usize {
        self.rule_queries.load(Ordering::SeqCst)
    }

    /// Add or replace an invoice by id.
    pub async fn save_invoice(&self, invoice: Invoice) {
        let mut state = self.state.write().await;
        match state.invoices.iter_mut().find(|i| i.id == invoice.id) {
            Some(existing) => *existing = invoice,
            None => state.invoices.push(invoice),
        }
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn find_erp_by_name(&self, name: &str) -> Result<Option<Erp>> {
        let key = lookup_key(name);
        let state = self.state.read().await;
        Ok(state.erps.iter().find(|erp| erp.lookup_key() == key).cloned())
    }

    async fn find_erp(&self, id: i64) -> Result<Option<Erp>> {
        let state = self.state.read().await;
        Ok(state.erps.iter().find(|erp| erp.id == id).cloned())
    }

    async fn list_erps(&self) -> Result<Vec<Erp>> {
        Ok(self.state.read().await.erps.clone())
    }

    async fn create_erp(&self, erp: NewErp) -> Result<Erp> {
        erp.validate()?;
        let key = lookup_key(&erp.name);
        let mut state = self.state.write().await;
        if state.erps.iter().any(|existing| existing.lookup_key() == key) {
            return Err(Error::conflict(format!("ERP '{}' already exists", erp.name.trim())));
        }
        state.next_erp_id += 1;
        let record = new_erp_record(state.next_erp_id, &erp.name, Utc::now());
        state.erps.push(record.clone());
        Ok(record)
    }

    async fn set_erp_status(&self, id: i64, status: Status) -> Result<Erp> {
        let mut state = self.state.write().await;
        let erp = state
            .erps
            .iter_mut()
            .find(|erp| erp.id == id)
            .ok_or_else(|| Error::erp_not_found(id))?;
        erp.status = status;
        erp.updated_at = Utc::now();
        Ok(erp.clone())
    }

    async fn list_rules(&self, erp_id: i64, status: Option<Status>) -> Result<Vec<FieldMapping>> {
        self.rule_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Ok(state
            .rules
            .iter()
            .filter(|rule| rule.erp_id == erp_id)
            .filter(|rule| status.is_none_or(|s| rule.status == s))
            .cloned()
            .collect())
    }

    async fn find_rule(&self, id: i64) -> Result<Option<FieldMapping>> {
        let state = self.state.read().await;
        Ok(state.rules.iter().find(|rule| rule.id == id).cloned())
    }

    async fn create_rule(&self, erp_id: i64, rule: NewFieldMapping) -> Result<FieldMapping> {
        rule.validate()?;
        let mut state = self.state.write().await;
        if !state.erps.iter().any(|erp| erp.id == erp_id) {
            return Err(Error::erp_not_found(erp_id));
        }
        state.next_rule_id += 1;
        let record = rule.into_rule(state.next_rule_id, erp_id, Utc::now());
        state.rules.push(record.clone());
        Ok(record)
    }

    async fn update_rule(&self, id: i64, update: FieldMappingUpdate) -> Result<FieldMapping> {
        update.validate()?;
        let mut state = self.state.write().await;
        let rule = state
            .rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or_else(|| Error::mapping_not_found(id))?;
        update.apply_to(rule, Utc::now());
        Ok(rule.clone())
    }

    async fn set_rule_status(&self, id: i64, status: Status) -> Result<FieldMapping> {
        let update = FieldMappingUpdate {
            status: Some(status),
            ..FieldMappingUpdate::default()
        };
        self.update_rule(id, update).await
    }

    async fn exists_rule_for_source(&self, erp_id: i64, source_field: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.rules.iter().any(|rule| {
            rule.erp_id == erp_id && rule.source_field.eq_ignore_ascii_case(source_field.trim())
        }))
    }
}

#[async_trait]
impl InvoiceSource for MemoryStore {
    async fn find_approved(&self) -> Result<Vec<Invoice>> {
        Ok(approved_in_order(&self.state.read().await.invoices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn erp_names_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        store.create_erp(NewErp::new("SAP")).await.unwrap();
        let error = store.create_erp(NewErp::new(" sap ")).await.unwrap_err();
        assert!(matches!(error, Error::Conflict { .. }));
        assert!(store.find_erp_by_name("Sap").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rules_keep_creation_order_and_filter_by_status() {
        let store = MemoryStore::new();
        let erp = store.create_erp(NewErp::new("SAP")).await.unwrap();
        for (source, target) in [("b", "y"), ("a", "x"), ("c", "z")] {
            store
                .create_rule(erp.id, NewFieldMapping::new("SAP", source, target))
                .await
                .unwrap();
        }
        store.set_rule_status(2, Status::Inactive).await.unwrap();

        let active = store.list_rules(erp.id, Some(Status::Active)).await.unwrap();
        let targets: Vec<&str> = active.iter().map(|r| r.target_field.as_str()).collect();
        assert_eq!(targets, vec!["y", "z"]);
        assert_eq!(store.list_rules(erp.id, None).await.unwrap().len(), 3);
        assert_eq!(store.rule_queries(), 2);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.set_erp_status(7, Status::Inactive).await.unwrap_err().is_not_found());
        assert!(
            store
                .update_rule(7, FieldMappingUpdate::default())
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            store
                .create_rule(7, NewFieldMapping::new("X", "a", "b"))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn approved_invoices_are_ordered_by_id() {
        let store = MemoryStore::new();
        for (id, status) in [(3, "APPROVED"), (1, "APPROVED"), (2, "PENDING")] {
            store
                .save_invoice(Invoice {
                    id,
                    status: status.to_string(),
                    ..Invoice::default()
                })
                .await;
        }
        let ids: Vec<i64> = store
            .find_approved()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn source_field_check_ignores_case() {
        let store = MemoryStore::new();
        let erp = store.create_erp(NewErp::new("SAP")).await.unwrap();
        store
            .create_rule(erp.id, NewFieldMapping::new("SAP", "amount", "gross"))
            .await
            .unwrap();
        assert!(store.exists_rule_for_source(erp.id, "AMOUNT").await.unwrap());
        assert!(!store.exists_rule_for_source(erp.id, "status").await.unwrap());
    }
}
