//! Source-record construction from invoices
//!
//! A record carries the invoice header fields under camelCase keys. When
//! flattening, each line item produces its own record with the item's fields
//! appended under `item.`-prefixed keys; an invoice without items produces no
//! flattened record at all.

use erpmap_model::{Invoice, InvoiceItem, Record, Value};

const HEADER_FIELDS: [&str; 14] = [
    "id",
    "documentType",
    "documentNumber",
    "receiverTaxId",
    "receiverTaxIdWithoutCheckDigit",
    "receiverBusinessName",
    "senderTaxId",
    "senderTaxIdWithoutCheckDigit",
    "senderBusinessName",
    "relatedDocumentNumber",
    "amount",
    "issueDate",
    "dueDate",
    "status",
];

const ITEM_FIELDS: [&str; 9] = [
    "item.id",
    "item.itemCode",
    "item.description",
    "item.quantity",
    "item.unit",
    "item.unitPrice",
    "item.subtotal",
    "item.taxAmount",
    "item.total",
];

/// Source keys a rule can read, in record order
pub fn known_fields(flatten: bool) -> Vec<&'static str> {
    let mut fields = HEADER_FIELDS.to_vec();
    if flatten {
        fields.extend(ITEM_FIELDS);
    }
    fields
}

/// Builds source records from invoices
#[derive(Debug, Clone, Copy, Default)]
pub struct RowBuilder {
    flatten: bool,
}

impl RowBuilder {
    pub fn new(flatten: bool) -> Self {
        Self { flatten }
    }

    pub fn flatten(&self) -> bool {
        self.flatten
    }

    /// Records for all invoices, preserving invoice and item order.
    pub fn build(&self, invoices: &[Invoice]) -> Vec<Record> {
        if !self.flatten {
            return invoices.iter().map(header_record).collect();
        }

        invoices
            .iter()
            .flat_map(|invoice| {
                invoice.items.iter().map(move |item| {
                    let mut record = header_record(invoice);
                    append_item(&mut record, item);
                    record
                })
            })
            .collect()
    }
}

fn header_record(invoice: &Invoice) -> Record {
    let values = [
        Value::Integer(invoice.id),
        Value::from(invoice.document_type.clone()),
        Value::from(invoice.document_number.clone()),
        Value::from(invoice.receiver_tax_id.clone()),
        Value::from(invoice.receiver_tax_id_without_check_digit.clone()),
        Value::from(invoice.receiver_business_name.clone()),
        Value::from(invoice.sender_tax_id.clone()),
        Value::from(invoice.sender_tax_id_without_check_digit.clone()),
        Value::from(invoice.sender_business_name.clone()),
        Value::from(invoice.related_document_number.clone()),
        Value::from(invoice.amount),
        Value::from(invoice.issue_date),
        Value::from(invoice.due_date),
        Value::from(invoice.status.clone()),
    ];

    let mut record = Record::with_capacity(HEADER_FIELDS.len() + ITEM_FIELDS.len());
    for (key, value) in HEADER_FIELDS.iter().zip(values) {
        record.insert((*key).to_string(), value);
    }
    record
}

fn append_item(record: &mut Record, item: &InvoiceItem) {
    let values = [
        Value::Integer(item.id),
        Value::from(item.item_code.clone()),
        Value::from(item.description.clone()),
        Value::from(item.quantity),
        Value::from(item.unit.clone()),
        Value::from(item.unit_price),
        Value::from(item.subtotal),
        Value::from(item.tax_amount),
        Value::from(item.total),
    ];
    for (key, value) in ITEM_FIELDS.iter().zip(values) {
        record.insert((*key).to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(id: i64, items: usize) -> Invoice {
        Invoice {
            id,
            document_number: Some(format!("F-{id}")),
            status: "APPROVED".to_string(),
            items: (0..items)
                .map(|n| InvoiceItem {
                    id: id * 10 + i64::try_from(n).unwrap(),
                    ..InvoiceItem::default()
                })
                .collect(),
            ..Invoice::default()
        }
    }

    #[test]
    fn header_rows_hold_only_header_fields() {
        let rows = RowBuilder::new(false).build(&[invoice(1, 2)]);
        assert_eq!(rows.len(), 1);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, known_fields(false));
        assert_eq!(rows[0].get("documentNumber"), Some(&Value::from("F-1")));
        assert_eq!(rows[0].get("dueDate"), Some(&Value::Null));
    }

    #[test]
    fn flattening_cross_joins_items() {
        let invoices = [invoice(1, 2), invoice(2, 0), invoice(3, 3)];
        let rows = RowBuilder::new(true).build(&invoices);
        assert_eq!(rows.len(), 5);

        let pairs: Vec<(Value, Value)> = rows
            .iter()
            .map(|r| (r["id"].clone(), r["item.id"].clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Value::Integer(1), Value::Integer(10)),
                (Value::Integer(1), Value::Integer(11)),
                (Value::Integer(3), Value::Integer(30)),
                (Value::Integer(3), Value::Integer(31)),
                (Value::Integer(3), Value::Integer(32)),
            ]
        );
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, known_fields(true));
    }
}
