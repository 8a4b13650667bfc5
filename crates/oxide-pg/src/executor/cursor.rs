//! Row cursor over a scanned result.

use std::vec;

use crate::coder::{RawValue, ValueCoder};
use crate::dialect::PgDialect;
use crate::error::Result;
use crate::record::Record;
use crate::value::Row;

use super::{ColumnInfo, RowSet};

/// Iterates over result rows, coercing each column by its declared type.
///
/// A row that fails coercion yields an error for that row only; iteration
/// continues with the next one.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<ColumnInfo>,
    rows: vec::IntoIter<Vec<RawValue>>,
    dialect: PgDialect,
}

impl Cursor {
    pub(super) fn new(set: RowSet, dialect: PgDialect) -> Self {
        Self {
            columns: set.columns,
            rows: set.rows.into_iter(),
            dialect,
        }
    }

    /// Result columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Rows not yet fetched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    fn coerce(&self, raw: Vec<RawValue>) -> Result<Row> {
        let mut row = Row::new();
        for (column, value) in self.columns.iter().zip(raw) {
            let value = self
                .dialect
                .to_native(value, &column.type_name)
                .map_err(|e| e.at_column(&column.name))?;
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }

    /// Fetches the next row.
    pub fn fetch(&mut self) -> Option<Result<Row>> {
        self.next()
    }

    /// Fetches up to `n` rows; 0 fetches all remaining rows.
    ///
    /// # Errors
    ///
    /// Returns the first coercion error. Rows after it stay in the cursor.
    pub fn fetch_n(&mut self, n: usize) -> Result<Vec<Row>> {
        let n = if n == 0 { self.remaining() } else { n };
        self.by_ref().take(n).collect()
    }

    /// Fetches every remaining row.
    ///
    /// # Errors
    ///
    /// Returns the first coercion error.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.fetch_n(0)
    }

    /// Fetches the next row as a record.
    pub fn fetch_record<T: Record>(&mut self) -> Option<Result<T>> {
        self.next().map(|row| row.and_then(|row| T::from_row(&row)))
    }

    /// Fetches every remaining row as records.
    ///
    /// # Errors
    ///
    /// Returns the first coercion error.
    pub fn fetch_records<T: Record>(&mut self) -> Result<Vec<T>> {
        self.by_ref()
            .map(|row| row.and_then(|row| T::from_row(&row)))
            .collect()
    }
}

impl Iterator for Cursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        Some(self.coerce(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
