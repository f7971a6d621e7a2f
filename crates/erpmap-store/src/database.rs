//! libsql-backed mapping store and invoice source.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use erpmap_model::{Erp, FieldMapping, Invoice, InvoiceItem, Status};
use libsql::{Builder, Connection, Database, Value, params_from_iter};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::store::{
    FieldMappingUpdate, InvoiceSource, MappingStore, NewErp, NewFieldMapping, new_erp_record,
};
use crate::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS erps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS field_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    erp_id INTEGER NOT NULL REFERENCES erps(id),
    source_field TEXT NOT NULL,
    target_field TEXT NOT NULL,
    transform_fn TEXT,
    status TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_field_mappings_erp ON field_mappings (erp_id, status);
CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_type TEXT,
    document_number TEXT,
    receiver_tax_id TEXT,
    receiver_tax_id_without_check_digit TEXT,
    receiver_business_name TEXT,
    sender_tax_id TEXT,
    sender_tax_id_without_check_digit TEXT,
    sender_business_name TEXT,
    related_document_number TEXT,
    amount TEXT,
    issue_date TEXT,
    due_date TEXT,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    item_code TEXT,
    description TEXT,
    quantity INTEGER,
    unit TEXT,
    unit_price TEXT,
    subtotal TEXT,
    tax_amount TEXT,
    total TEXT
);
";

const ERP_COLUMNS: &str = "id, name, status, created_at, updated_at";
const RULE_COLUMNS: &str =
    "id, erp_id, source_field, target_field, transform_fn, status, version, created_at, updated_at";
const INVOICE_COLUMNS: &str = "id, document_type, document_number, receiver_tax_id, \
    receiver_tax_id_without_check_digit, receiver_business_name, sender_tax_id, \
    sender_tax_id_without_check_digit, sender_business_name, related_document_number, \
    amount, issue_date, due_date, status";
const ITEM_COLUMNS: &str = "id, invoice_id, item_code, description, quantity, unit, unit_price, \
    subtotal, tax_amount, total";

/// Mapping store over a single libsql connection
pub struct LibsqlStore {
    // Keeps the database open for as long as the connection lives.
    _database: Database,
    connection: Connection,
    writes: Mutex<()>,
}

impl LibsqlStore {
    /// Open the database described by `config` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings, [`Error::Connection`]
    /// if opening exceeds the configured timeout, and libsql errors otherwise.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let database = tokio::time::timeout(
            Duration::from_millis(config.timeout_ms),
            build_database(config),
        )
        .await
        .map_err(|_| Error::Connection {
            details: format!(
                "Timed out after {}ms while opening database",
                config.timeout_ms
            ),
        })??;

        let connection = database.connect().map_err(|source| Error::Libsql {
            context: "connect database".to_string(),
            source,
        })?;
        if !config.is_remote() {
            connection
                .busy_timeout(Duration::from_millis(config.timeout_ms))
                .map_err(|source| Error::Libsql {
                    context: "set busy timeout".to_string(),
                    source,
                })?;
        }
        execute(&connection, "PRAGMA foreign_keys = ON", Vec::new()).await?;
        connection
            .execute_batch(SCHEMA)
            .await
            .map_err(|source| Error::Libsql {
                context: "apply schema".to_string(),
                source,
            })?;

        info!(database = %config.database_url, "Opened mapping database");
        Ok(Self {
            _database: database,
            connection,
            writes: Mutex::new(()),
        })
    }

    /// Shorthand for a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&ConnectionConfig::in_memory()).await
    }

    /// Insert an invoice with its items, replacing any invoice with the same id.
    ///
    /// An id of 0 lets the database assign one. Returns the stored id.
    pub async fn save_invoice(&self, invoice: &Invoice) -> Result<i64> {
        let _guard = self.writes.lock().await;
        let tx = self
            .connection
            .transaction()
            .await
            .map_err(|source| Error::Libsql {
                context: "begin transaction".to_string(),
                source,
            })?;

        if invoice.id != 0 {
            execute(
                &tx,
                "DELETE FROM invoice_items WHERE invoice_id = ?1",
                vec![Value::Integer(invoice.id)],
            )
            .await?;
            execute(
                &tx,
                "DELETE FROM invoices WHERE id = ?1",
                vec![Value::Integer(invoice.id)],
            )
            .await?;
        }

        let sql = format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) RETURNING id"
        );
        let params = vec![
            id_param(invoice.id),
            opt_text(invoice.document_type.as_deref()),
            opt_text(invoice.document_number.as_deref()),
            opt_text(invoice.receiver_tax_id.as_deref()),
            opt_text(invoice.receiver_tax_id_without_check_digit.as_deref()),
            opt_text(invoice.receiver_business_name.as_deref()),
            opt_text(invoice.sender_tax_id.as_deref()),
            opt_text(invoice.sender_tax_id_without_check_digit.as_deref()),
            opt_text(invoice.sender_business_name.as_deref()),
            opt_text(invoice.related_document_number.as_deref()),
            opt_decimal(invoice.amount),
            opt_date(invoice.issue_date),
            opt_date(invoice.due_date),
            Value::Text(invoice.status.clone()),
        ];
        let invoice_id = returning_id(&tx, &sql, params).await?;

        let item_sql = format!(
            "INSERT INTO invoice_items ({ITEM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        );
        for item in &invoice.items {
            let params = vec![
                id_param(item.id),
                Value::Integer(invoice_id),
                opt_text(item.item_code.as_deref()),
                opt_text(item.description.as_deref()),
                item.quantity.map_or(Value::Null, Value::Integer),
                opt_text(item.unit.as_deref()),
                opt_decimal(item.unit_price),
                opt_decimal(item.subtotal),
                opt_decimal(item.tax_amount),
                opt_decimal(item.total),
            ];
            execute(&tx, &item_sql, params).await?;
        }

        tx.commit().await.map_err(|source| Error::Libsql {
            context: "commit invoice".to_string(),
            source,
        })?;
        debug!(invoice_id, items = invoice.items.len(), "Saved invoice");
        Ok(invoice_id)
    }

    async fn query_erps(&self, filter: &str, params: Vec<Value>) -> Result<Vec<Erp>> {
        let sql = format!("SELECT {ERP_COLUMNS} FROM erps {filter}");
        let rows = query_rows(&self.connection, &sql, params).await?;
        rows.iter().map(decode_erp).collect()
    }

    async fn query_rules(&self, filter: &str, params: Vec<Value>) -> Result<Vec<FieldMapping>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM field_mappings {filter}");
        let rows = query_rows(&self.connection, &sql, params).await?;
        rows.iter().map(decode_rule).collect()
    }

    async fn write_rule(&self, rule: &FieldMapping) -> Result<()> {
        let sql = "UPDATE field_mappings SET source_field = ?1, target_field = ?2, \
                   transform_fn = ?3, status = ?4, updated_at = ?5 WHERE id = ?6";
        let params = vec![
            Value::Text(rule.source_field.clone()),
            Value::Text(rule.target_field.clone()),
            opt_text(rule.transform_fn.as_deref()),
            Value::Text(rule.status.as_str().to_string()),
            timestamp(rule.updated_at),
            Value::Integer(rule.id),
        ];
        execute(&self.connection, sql, params).await?;
        Ok(())
    }
}

impl std::fmt::Debug for LibsqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl MappingStore for LibsqlStore {
    async fn find_erp_by_name(&self, name: &str) -> Result<Option<Erp>> {
        let erps = self
            .query_erps(
                "WHERE name = ?1 COLLATE NOCASE",
                vec![Value::Text(name.trim().to_string())],
            )
            .await?;
        Ok(erps.into_iter().next())
    }

    async fn find_erp(&self, id: i64) -> Result<Option<Erp>> {
        let erps = self
            .query_erps("WHERE id = ?1", vec![Value::Integer(id)])
            .await?;
        Ok(erps.into_iter().next())
    }

    async fn list_erps(&self) -> Result<Vec<Erp>> {
        self.query_erps("ORDER BY id", Vec::new()).await
    }

    async fn create_erp(&self, erp: NewErp) -> Result<Erp> {
        erp.validate()?;
        let _guard = self.writes.lock().await;
        if self.find_erp_by_name(&erp.name).await?.is_some() {
            return Err(Error::conflict(format!(
                "ERP '{}' already exists",
                erp.name.trim()
            )));
        }

        let record = new_erp_record(0, &erp.name, now());
        let sql = "INSERT INTO erps (name, status, created_at, updated_at) \
                   VALUES (?1, ?2, ?3, ?4) RETURNING id";
        let params = vec![
            Value::Text(record.name.clone()),
            Value::Text(record.status.as_str().to_string()),
            timestamp(record.created_at),
            timestamp(record.updated_at),
        ];
        let id = returning_id(&self.connection, sql, params).await?;
        Ok(Erp { id, ..record })
    }

    async fn set_erp_status(&self, id: i64, status: Status) -> Result<Erp> {
        let _guard = self.writes.lock().await;
        let sql = "UPDATE erps SET status = ?1, updated_at = ?2 WHERE id = ?3";
        let params = vec![
            Value::Text(status.as_str().to_string()),
            timestamp(now()),
            Value::Integer(id),
        ];
        if execute(&self.connection, sql, params).await? == 0 {
            return Err(Error::erp_not_found(id));
        }
        self.find_erp(id)
            .await?
            .ok_or_else(|| Error::erp_not_found(id))
    }

    async fn list_rules(&self, erp_id: i64, status: Option<Status>) -> Result<Vec<FieldMapping>> {
        match status {
            Some(status) => {
                self.query_rules(
                    "WHERE erp_id = ?1 AND status = ?2 ORDER BY id",
                    vec![
                        Value::Integer(erp_id),
                        Value::Text(status.as_str().to_string()),
                    ],
                )
                .await
            }
            None => {
                self.query_rules("WHERE erp_id = ?1 ORDER BY id", vec![Value::Integer(erp_id)])
                    .await
            }
        }
    }

    async fn find_rule(&self, id: i64) -> Result<Option<FieldMapping>> {
        let rules = self
            .query_rules("WHERE id = ?1", vec![Value::Integer(id)])
            .await?;
        Ok(rules.into_iter().next())
    }

    async fn create_rule(&self, erp_id: i64, rule: NewFieldMapping) -> Result<FieldMapping> {
        rule.validate()?;
        let _guard = self.writes.lock().await;
        if self.find_erp(erp_id).await?.is_none() {
            return Err(Error::erp_not_found(erp_id));
        }

        let record = rule.into_rule(0, erp_id, now());
        let sql = format!(
            "INSERT INTO field_mappings ({RULE_COLUMNS}) \
             VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING id"
        );
        let params = vec![
            Value::Integer(record.erp_id),
            Value::Text(record.source_field.clone()),
            Value::Text(record.target_field.clone()),
            opt_text(record.transform_fn.as_deref()),
            Value::Text(record.status.as_str().to_string()),
            Value::Integer(i64::from(record.version)),
            timestamp(record.created_at),
            timestamp(record.updated_at),
        ];
        let id = returning_id(&self.connection, &sql, params).await?;
        Ok(FieldMapping { id, ..record })
    }

    async fn update_rule(&self, id: i64, update: FieldMappingUpdate) -> Result<FieldMapping> {
        update.validate()?;
        let _guard = self.writes.lock().await;
        let mut rule = self
            .find_rule(id)
            .await?
            .ok_or_else(|| Error::mapping_not_found(id))?;
        update.apply_to(&mut rule, now());
        self.write_rule(&rule).await?;
        Ok(rule)
    }

    async fn set_rule_status(&self, id: i64, status: Status) -> Result<FieldMapping> {
        let update = FieldMappingUpdate {
            status: Some(status),
            ..FieldMappingUpdate::default()
        };
        self.update_rule(id, update).await
    }

    async fn exists_rule_for_source(&self, erp_id: i64, source_field: &str) -> Result<bool> {
        let sql = "SELECT 1 FROM field_mappings \
                   WHERE erp_id = ?1 AND source_field = ?2 COLLATE NOCASE LIMIT 1";
        let rows = query_rows(
            &self.connection,
            sql,
            vec![
                Value::Integer(erp_id),
                Value::Text(source_field.trim().to_string()),
            ],
        )
        .await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl InvoiceSource for LibsqlStore {
    async fn find_approved(&self) -> Result<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE status = ?1 COLLATE NOCASE ORDER BY id"
        );
        let approved = || vec![Value::Text(erpmap_model::invoice::APPROVED.to_string())];
        let mut invoices: Vec<Invoice> = query_rows(&self.connection, &sql, approved())
            .await?
            .iter()
            .map(decode_invoice)
            .collect::<Result<_>>()?;

        let item_sql = format!(
            "SELECT {} FROM invoice_items i JOIN invoices v ON v.id = i.invoice_id \
             WHERE v.status = ?1 COLLATE NOCASE ORDER BY i.invoice_id, i.id",
            ITEM_COLUMNS
                .split(", ")
                .map(|column| format!("i.{column}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = query_rows(&self.connection, &item_sql, approved()).await?;
        let mut cursor = 0;
        for row in &rows {
            let invoice_id = required_integer(row, 1, "invoice_id")?;
            let item = decode_item(row)?;
            while cursor < invoices.len() && invoices[cursor].id < invoice_id {
                cursor += 1;
            }
            if let Some(invoice) = invoices.get_mut(cursor).filter(|i| i.id == invoice_id) {
                invoice.items.push(item);
            }
        }

        debug!(invoices = invoices.len(), items = rows.len(), "Loaded approved invoices");
        Ok(invoices)
    }
}

async fn build_database(config: &ConnectionConfig) -> Result<Database> {
    let url = config.database_url.trim();
    if config.is_remote() {
        let token = config.auth_token.clone().ok_or_else(|| Error::Config {
            details: "auth_token is required for remote databases".to_string(),
        })?;
        Builder::new_remote(url.to_string(), token)
            .build()
            .await
            .map_err(|source| Error::Libsql {
                context: "open remote database".to_string(),
                source,
            })
    } else {
        let path = url.strip_prefix("file:").unwrap_or(url);
        Builder::new_local(path)
            .build()
            .await
            .map_err(|source| Error::Libsql {
                context: "open local database".to_string(),
                source,
            })
    }
}

type SqlRow = Vec<Value>;

async fn query_rows(connection: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<SqlRow>> {
    let mut rows = connection
        .query(sql, params_from_iter(params))
        .await
        .map_err(|source| Error::Sql {
            statement: sql.to_string(),
            source,
        })?;

    let mut output = Vec::new();
    while let Some(row) = rows.next().await.map_err(|source| Error::Sql {
        statement: sql.to_string(),
        source,
    })? {
        let count = row.column_count();
        let mut values = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        for idx in 0..count {
            let value = row.get_value(idx).map_err(|source| Error::Sql {
                statement: sql.to_string(),
                source,
            })?;
            values.push(value);
        }
        output.push(values);
    }
    Ok(output)
}

async fn execute(connection: &Connection, sql: &str, params: Vec<Value>) -> Result<u64> {
    connection
        .execute(sql, params_from_iter(params))
        .await
        .map_err(|source| Error::Sql {
            statement: sql.to_string(),
            source,
        })
}

async fn returning_id(connection: &Connection, sql: &str, params: Vec<Value>) -> Result<i64> {
    let rows = query_rows(connection, sql, params).await?;
    let row = rows
        .first()
        .ok_or_else(|| Error::decode("id", "INSERT returned no row"))?;
    required_integer(row, 0, "id")
}

/// Current time at the precision timestamps are stored with
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn id_param(id: i64) -> Value {
    if id == 0 { Value::Null } else { Value::Integer(id) }
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn opt_decimal(value: Option<Decimal>) -> Value {
    value.map_or(Value::Null, |d| Value::Text(d.to_string()))
}

fn opt_date(value: Option<NaiveDate>) -> Value {
    value.map_or(Value::Null, |d| {
        Value::Text(d.format(erpmap_model::value::ISO_DATE).to_string())
    })
}

fn timestamp(value: DateTime<Utc>) -> Value {
    Value::Text(value.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn column<'a>(row: &'a SqlRow, idx: usize, name: &str) -> Result<&'a Value> {
    row.get(idx)
        .ok_or_else(|| Error::decode(name, format!("missing column at index {idx}")))
}

fn text(row: &SqlRow, idx: usize, name: &str) -> Result<Option<String>> {
    match column(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text.clone())),
        Value::Integer(value) => Ok(Some(value.to_string())),
        Value::Real(value) => Ok(Some(value.to_string())),
        Value::Blob(bytes) => String::from_utf8(bytes.clone())
            .map(Some)
            .map_err(|error| Error::decode(name, error.to_string())),
    }
}

fn required_text(row: &SqlRow, idx: usize, name: &str) -> Result<String> {
    text(row, idx, name)?.ok_or_else(|| Error::decode(name, "unexpected NULL"))
}

fn integer(row: &SqlRow, idx: usize, name: &str) -> Result<Option<i64>> {
    match column(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(*value)),
        Value::Text(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::decode(name, format!("'{text}' is not an integer"))),
        other => Err(Error::decode(name, format!("expected integer, found {other:?}"))),
    }
}

fn required_integer(row: &SqlRow, idx: usize, name: &str) -> Result<i64> {
    integer(row, idx, name)?.ok_or_else(|| Error::decode(name, "unexpected NULL"))
}

fn decimal(row: &SqlRow, idx: usize, name: &str) -> Result<Option<Decimal>> {
    match column(row, idx, name)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(Decimal::from(*value))),
        Value::Real(value) => Decimal::try_from(*value)
            .map(Some)
            .map_err(|error| Error::decode(name, error.to_string())),
        Value::Text(text) => Decimal::from_str(text.trim())
            .map(Some)
            .map_err(|error| Error::decode(name, format!("'{text}': {error}"))),
        Value::Blob(_) => Err(Error::decode(name, "expected decimal, found blob")),
    }
}

fn date(row: &SqlRow, idx: usize, name: &str) -> Result<Option<NaiveDate>> {
    text(row, idx, name)?
        .map(|text| {
            NaiveDate::parse_from_str(text.trim(), erpmap_model::value::ISO_DATE)
                .map_err(|error| Error::decode(name, format!("'{text}': {error}")))
        })
        .transpose()
}

fn utc(row: &SqlRow, idx: usize, name: &str) -> Result<DateTime<Utc>> {
    let text = required_text(row, idx, name)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| Error::decode(name, format!("'{text}': {error}")))
}

fn status(row: &SqlRow, idx: usize, name: &str) -> Result<Status> {
    Ok(required_text(row, idx, name)?.parse()?)
}

fn decode_erp(row: &SqlRow) -> Result<Erp> {
    Ok(Erp {
        id: required_integer(row, 0, "id")?,
        name: required_text(row, 1, "name")?,
        status: status(row, 2, "status")?,
        created_at: utc(row, 3, "created_at")?,
        updated_at: utc(row, 4, "updated_at")?,
    })
}

fn decode_rule(row: &SqlRow) -> Result<FieldMapping> {
    let version = required_integer(row, 6, "version")?;
    Ok(FieldMapping {
        id: required_integer(row, 0, "id")?,
        erp_id: required_integer(row, 1, "erp_id")?,
        source_field: required_text(row, 2, "source_field")?,
        target_field: required_text(row, 3, "target_field")?,
        transform_fn: text(row, 4, "transform_fn")?,
        status: status(row, 5, "status")?,
        version: i32::try_from(version)
            .map_err(|_| Error::decode("version", format!("{version} out of range")))?,
        created_at: utc(row, 7, "created_at")?,
        updated_at: utc(row, 8, "updated_at")?,
    })
}

fn decode_invoice(row: &SqlRow) -> Result<Invoice> {
    Ok(Invoice {
        id: required_integer(row, 0, "id")?,
        document_type: text(row, 1, "document_type")?,
        document_number: text(row, 2, "document_number")?,
        receiver_tax_id: text(row, 3, "receiver_tax_id")?,
        receiver_tax_id_without_check_digit: text(row, 4, "receiver_tax_id_without_check_digit")?,
        receiver_business_name: text(row, 5, "receiver_business_name")?,
        sender_tax_id: text(row, 6, "sender_tax_id")?,
        sender_tax_id_without_check_digit: text(row, 7, "sender_tax_id_without_check_digit")?,
        sender_business_name: text(row, 8, "sender_business_name")?,
        related_document_number: text(row, 9, "related_document_number")?,
        amount: decimal(row, 10, "amount")?,
        issue_date: date(row, 11, "issue_date")?,
        due_date: date(row, 12, "due_date")?,
        status: required_text(row, 13, "status")?,
        items: Vec::new(),
    })
}

fn decode_item(row: &SqlRow) -> Result<InvoiceItem> {
    Ok(InvoiceItem {
        id: required_integer(row, 0, "id")?,
        item_code: text(row, 2, "item_code")?,
        description: text(row, 3, "description")?,
        quantity: integer(row, 4, "quantity")?,
        unit: text(row, 5, "unit")?,
        unit_price: decimal(row, 6, "unit_price")?,
        subtotal: decimal(row, 7, "subtotal")?,
        tax_amount: decimal(row, 8, "tax_amount")?,
        total: decimal(row, 9, "total")?,
    })
}
