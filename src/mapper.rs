//! Row-to-record mapping.
//!
//! Mapping is column driven: each result column is offered to the target's
//! binding table by name. Columns without a matching property are skipped,
//! which keeps `SELECT *` usable; properties without a column keep their
//! default value.

use std::marker::PhantomData;

use sqlx::sqlite::{SqliteColumn, SqliteRow};
use sqlx::{Column as _, Row, TypeInfo, ValueRef};
use tracing::trace;

use crate::record::Record;
use crate::value::{Value, ValueType};

/// One result column, in physical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// 0-based position in the row.
    pub index: usize,
    pub name: String,
    /// Declared type, when SQLite reports one.
    pub ty: Option<ValueType>,
}

impl Column {
    pub(crate) fn from_sqlite(column: &SqliteColumn) -> Self {
        Self {
            index: column.ordinal(),
            name: column.name().to_owned(),
            ty: ValueType::from_sqlite(column.type_info().name()),
        }
    }
}

/// Reads a cell as the engine primitive of its runtime storage class.
pub fn read_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let ty = ValueType::from_sqlite(raw.type_info().name());
    let value = match ty {
        Some(ValueType::Null) => Value::Null,
        Some(ValueType::Integer) | Some(ValueType::Boolean) => {
            Value::Integer(row.try_get_unchecked::<i64, _>(index)?)
        }
        Some(ValueType::Real) => Value::Real(row.try_get_unchecked::<f64, _>(index)?),
        Some(ValueType::Blob) => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        Some(ValueType::Text) | Some(ValueType::DateTime) | None => {
            Value::Text(row.try_get_unchecked::<String, _>(index)?)
        }
    };
    Ok(value)
}

/// Builds one `R` per row from the statement's columns.
pub struct ResultMapper<'a, R> {
    columns: &'a [Column],
    sql: &'a str,
    _pd: PhantomData<fn() -> R>,
}

impl<'a, R: Record> ResultMapper<'a, R> {
    /// `sql` is the caller's SQL text and only appears in error reports.
    pub fn new(columns: &'a [Column], sql: &'a str) -> Self {
        Self {
            columns,
            sql,
            _pd: PhantomData,
        }
    }

    /// Maps the current row into a fresh `R`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Map`](crate::Error::Map) when a cell cannot be read
    /// or cannot be converted to its property's type.
    pub fn map_row(&self, row: &SqliteRow) -> crate::Result<R> {
        let bindings = R::bindings();
        let mut record = R::default();

        for column in self.columns {
            if !bindings.contains(&column.name) {
                trace!(column = %column.name, "skipping column without matching property");
                continue;
            }
            let value = read_value(row, column.index).map_err(|e| self.failure(column, e))?;
            if let Some(assigned) = bindings.set(&mut record, &column.name, value) {
                assigned.map_err(|e| self.failure(column, e))?;
            }
        }
        Ok(record)
    }

    fn failure(&self, column: &Column, reason: impl ToString) -> crate::Error {
        crate::Error::Map {
            column: column.name.clone(),
            reason: reason.to_string(),
            sql: self.sql.to_owned(),
        }
    }
}

