//! Row-oriented record tables

use serde::{Deserialize, Serialize};

/// A single cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// System-missing
    Null,

    Number(f64),

    Text(String),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "."),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// An ordered set of named columns with rows of cells
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordTable {
    /// Column names in physical order
    pub columns: Vec<String>,

    /// Rows; every row has one cell per column
    pub rows: Vec<Vec<CellValue>>,
}

impl RecordTable {
    /// Create an empty table with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first row whose width differs from the column count
    pub fn ragged_row(&self) -> Option<(usize, usize)> {
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
            .map(|(idx, row)| (idx, row.len()))
    }

    /// Remove a column if the table has it; dropping an absent column is a no-op
    ///
    /// Returns whether a column was removed.
    pub fn drop_column_if_present(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };

        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
        true
    }

    /// Keep only the columns accepted by `keep`, preserving their order
    pub fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let dropped: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !keep(c.as_str()))
            .cloned()
            .collect();

        for name in dropped {
            self.drop_column_if_present(&name);
        }
    }

    /// Append a column holding the same value in every row
    pub fn push_constant_column(&mut self, name: impl Into<String>, value: CellValue) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    /// Move an existing column to the last position
    pub fn move_column_to_end(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };

        let column = self.columns.remove(idx);
        self.columns.push(column);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.push(cell);
        }
        true
    }

    /// Row-concatenate another table
    ///
    /// Columns are unioned in first-seen order; cells for columns a table
    /// lacks are filled with `CellValue::Null`.
    pub fn concat(&mut self, other: &RecordTable) {
        for column in &other.columns {
            if !self.has_column(column) {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(CellValue::Null);
                }
            }
        }

        let positions: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();

        for row in &other.rows {
            let merged = positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i).cloned()).unwrap_or(CellValue::Null))
                .collect();
            self.rows.push(merged);
        }
    }

    /// Rebuild the table with columns in `order`
    ///
    /// Columns named in `order` that the table lacks are returned instead of
    /// being invented. Table columns not named in `order` are dropped.
    pub fn reorder(&self, order: &[String]) -> (RecordTable, Vec<String>) {
        let mut columns = Vec::with_capacity(order.len());
        let mut positions = Vec::with_capacity(order.len());
        let mut missing = Vec::new();

        for name in order {
            match self.column_index(name) {
                Some(idx) => {
                    columns.push(name.clone());
                    positions.push(idx);
                }
                None => missing.push(name.clone()),
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect();

        (RecordTable { columns, rows }, missing)
    }
}
