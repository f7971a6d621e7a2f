//! Approved invoices as read from the invoice source

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice header with its ordered line items
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub id: i64,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub receiver_tax_id: Option<String>,
    pub receiver_tax_id_without_check_digit: Option<String>,
    pub receiver_business_name: Option<String>,
    pub sender_tax_id: Option<String>,
    pub sender_tax_id_without_check_digit: Option<String>,
    pub sender_business_name: Option<String>,
    pub related_document_number: Option<String>,
    pub amount: Option<Decimal>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// PENDING, APPROVED, REJECTED or PAID
    pub status: String,
    pub items: Vec<InvoiceItem>,
}

/// Status value selected by the export
pub const APPROVED: &str = "APPROVED";

impl Invoice {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status.eq_ignore_ascii_case(APPROVED)
    }
}

/// One line of an invoice
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceItem {
    pub id: i64,
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case_invoice() {
        let json = r#"{
            "id": 7,
            "documentType": "FV",
            "senderBusinessName": "Example Corp",
            "amount": "25.00",
            "issueDate": "2024-03-15",
            "status": "APPROVED",
            "items": [{"id": 1, "itemCode": "A-1", "quantity": 2, "total": "10.50"}]
        }"#;
        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.id, 7);
        assert_eq!(invoice.document_type.as_deref(), Some("FV"));
        assert_eq!(invoice.amount, Some(Decimal::new(2500, 2)));
        assert_eq!(invoice.issue_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert!(invoice.is_approved());
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].item_code.as_deref(), Some("A-1"));
        assert_eq!(invoice.items[0].total, Some(Decimal::new(1050, 2)));
        assert_eq!(invoice.items[0].unit, None);
    }
}
