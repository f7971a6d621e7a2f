//! JSON and CSV rendering of mapped records

use erpmap_model::Record;
use tracing::debug;

use crate::Result;

/// Render records as a JSON array of objects, keys in record order.
///
/// # Errors
///
/// Returns [`crate::Error::Serialize`] if a value cannot be encoded.
pub fn to_json(rows: &[Record]) -> Result<String> {
    let json = serde_json::to_string(rows)?;
    debug!(rows = rows.len(), bytes = json.len(), "Rendered JSON export");
    Ok(json)
}

/// Render records as CSV.
///
/// The header is the first record's keys; every row is written in that
/// column order with absent or null cells left empty. Lines end in `\n` and
/// cells are quoted only when needed. No records yields no bytes; records
/// without keys yield one empty line each, plus an empty header line.
///
/// # Errors
///
/// Returns [`crate::Error::Csv`] if writing fails.
pub fn to_csv(rows: &[Record]) -> Result<Vec<u8>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    if headers.is_empty() {
        // csv renders an empty record as `""`
        return Ok(vec![b'\n'; rows.len() + 1]);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&headers)?;
    for row in rows {
        let cells = headers
            .iter()
            .map(|header| row.get(*header).map(ToString::to_string).unwrap_or_default());
        writer.write_record(cells)?;
    }
    writer.flush().map_err(|e| crate::Error::Csv(e.to_string()))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::Error::Csv(e.to_string()))?;
    debug!(rows = rows.len(), bytes = bytes.len(), "Rendered CSV export");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use erpmap_model::Value;
    use rust_decimal::Decimal;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn csv_uses_first_row_header() {
        let rows = vec![
            record(&[("a", Value::Integer(1)), ("b", Value::from("x"))]),
            record(&[("a", Value::Integer(2)), ("b", Value::from("y"))]),
        ];
        let csv = to_csv(&rows).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "a,b\n1,x\n2,y\n");
    }

    #[test]
    fn csv_of_nothing_is_empty() {
        assert!(to_csv(&[]).unwrap().is_empty());
    }

    #[test]
    fn csv_of_keyless_records_is_blank_lines() {
        let csv = to_csv(&[Record::new(), Record::new()]).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "\n\n\n");
    }

    #[test]
    fn csv_fills_missing_and_null_cells() {
        let rows = vec![
            record(&[("a", Value::Integer(1)), ("b", Value::Null)]),
            record(&[("b", Value::from("only b")), ("c", Value::from("dropped"))]),
        ];
        let csv = String::from_utf8(to_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "a,b\n1,\n,only b\n");
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let rows = vec![record(&[("name", Value::from("Acme, Inc."))])];
        let csv = String::from_utf8(to_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "name\n\"Acme, Inc.\"\n");
    }

    #[test]
    fn json_keeps_key_order_and_value_types() {
        let rows = vec![record(&[
            ("issuedOn", Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())),
            ("gross", Value::Decimal(Decimal::new(2500, 2))),
            ("customer", Value::from("ACME")),
            ("note", Value::Null),
        ])];
        assert_eq!(
            to_json(&rows).unwrap(),
            r#"[{"issuedOn":"2024-03-15","gross":25.00,"customer":"ACME","note":null}]"#
        );
        assert_eq!(to_json(&[]).unwrap(), "[]");
    }
}
