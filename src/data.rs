//! Loosely-typed row values and the raw/standardized dataset shapes.
//!
//! Source cells carry a small tagged [`Scalar`] rather than a bare string so
//! that values arriving from structured payloads (JSON numbers, explicit
//! nulls) stringify deterministically. CSV ingestion only ever produces
//! `Text` and `Empty`; `Number` appears when rows round-trip through the
//! analyzer or an external transformation provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{STANDARD_COLUMNS, StandardColumn};

/// A single cell value from the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Empty,
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn from_csv_field(field: &str) -> Self {
        if field.is_empty() {
            Scalar::Empty
        } else {
            Scalar::Text(field.to_string())
        }
    }

    /// Stringify for output. Integral floats print without a fractional part
    /// so a spreadsheet-sourced `25` never becomes `"25.0"`.
    pub fn as_display(&self) -> String {
        match self {
            Scalar::Empty => String::new(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Scalar::Text(s) => s.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Number(_) => false,
            Scalar::Text(s) => s.is_empty(),
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Empty
    }
}

/// One source row: arbitrary source column name to cell value. Column order
/// within a row is irrelevant; header order is tracked separately.
pub type RawRow = BTreeMap<String, Scalar>;

/// All source rows in original file order.
pub type RawDataset = Vec<RawRow>;

/// One standardized output row: every target column maps to a string value,
/// `""` for unmapped or missing data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardizedRow(BTreeMap<StandardColumn, String>);

impl StandardizedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: StandardColumn) -> &str {
        self.0.get(&column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: StandardColumn, value: String) {
        self.0.insert(column, value);
    }

    /// Values in registry order, ready for CSV or table output.
    pub fn values(&self) -> Vec<String> {
        STANDARD_COLUMNS
            .iter()
            .map(|column| self.get(*column).to_string())
            .collect()
    }
}

/// Standardized rows, positionally aligned with the raw dataset they were
/// derived from.
pub type StandardizedDataset = Vec<StandardizedRow>;

pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}
