//! Decoded source rows.
//!
//! The spreadsheet collaborator hands the core already-decoded rows: an
//! ordered mapping of column header to cell text, plus the row's position in
//! the source file for error reporting. Parsing bytes into cells is not this
//! crate's job.

use crate::config::ColumnMap;
use crate::types::RowNumber;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRow {
    pub row_number: RowNumber,
    /// Header → cell text, in source column order. Duplicate headers keep
    /// first-wins semantics on lookup.
    pub cells: Vec<(String, String)>,
}

impl SourceRow {
    pub fn new(row_number: RowNumber, cells: Vec<(String, String)>) -> Self {
        Self { row_number, cells }
    }

    /// Cell text under `header`, trimmed. None when the column is absent.
    pub fn value(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.trim())
    }
}

/// A source row validated against the ingestion column map.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    pub row_number: RowNumber,
    pub name: String,
    pub id_number: String,
    pub jurisdiction: String,
    pub payment_category: String,
    pub payment_amount: f64,
}

impl ValidatedRow {
    /// Extract and validate the required fields. Returns a human-readable
    /// reason on failure; validation failures are row-local and never abort
    /// a batch.
    pub fn from_source(row: &SourceRow, columns: &ColumnMap) -> Result<ValidatedRow, String> {
        let field = |header: &str, label: &str| -> Result<String, String> {
            match row.value(header) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(format!("missing {label} (column '{header}')")),
            }
        };

        let name = field(&columns.name, "name")?;
        let id_number = field(&columns.id_number, "id number")?;
        let jurisdiction = field(&columns.jurisdiction, "jurisdiction")?;
        let payment_category = field(&columns.payment_category, "payment category")?;
        let amount_text = field(&columns.payment_amount, "payment amount")?;
        let payment_amount = amount_text
            .parse::<f64>()
            .map_err(|_| format!("payment amount '{amount_text}' is not a number"))?;

        Ok(ValidatedRow {
            row_number: row.row_number,
            name,
            id_number,
            jurisdiction,
            payment_category,
            payment_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnMap {
        ColumnMap {
            name: "name".into(),
            id_number: "id".into(),
            jurisdiction: "street".into(),
            payment_category: "category".into(),
            payment_amount: "amount".into(),
        }
    }

    fn row(cells: &[(&str, &str)]) -> SourceRow {
        SourceRow::new(
            1,
            cells.iter().map(|(h, v)| (h.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn valid_row_extracts_all_fields() {
        let r = row(&[
            ("name", " 张三 "),
            ("id", "X1"),
            ("street", "Town"),
            ("category", "CategoryA"),
            ("amount", "360.00"),
        ]);
        let v = ValidatedRow::from_source(&r, &columns()).unwrap();
        assert_eq!(v.name, "张三");
        assert_eq!(v.payment_amount, 360.00);
    }

    #[test]
    fn blank_required_field_is_rejected_with_reason() {
        let r = row(&[
            ("name", ""),
            ("id", "X1"),
            ("street", "Town"),
            ("category", "CategoryA"),
            ("amount", "360.00"),
        ]);
        let err = ValidatedRow::from_source(&r, &columns()).unwrap_err();
        assert!(err.contains("name"), "unexpected reason: {err}");
    }

    #[test]
    fn non_numeric_amount_is_rejected() {
        let r = row(&[
            ("name", "A"),
            ("id", "X1"),
            ("street", "Town"),
            ("category", "CategoryA"),
            ("amount", "three-sixty"),
        ]);
        assert!(ValidatedRow::from_source(&r, &columns()).is_err());
    }
}
