//! Schema-free row to metric mapping.
//!
//! Each column value is decoded into a [`Value`] before classification:
//! strings become tags (or the metric name when the column is `measurement`),
//! everything else becomes a field. Result-by-row queries instead keep the
//! `value` column, whatever its type, as their only field.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Column name that names the metric instead of becoming a tag.
pub const MEASUREMENT_COLUMN: &str = "measurement";

/// Single field of a result-by-row metric.
pub const VALUE_COLUMN: &str = "value";

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Null,
}

impl Value {
    /// Numeric sample for gauges; `None` for strings and NULL.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Time(t) => Some(t.timestamp_millis() as f64 / 1000.0),
            Self::String(_) | Self::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// One mapped row.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("row has {values} values for {columns} columns")]
    ColumnMismatch { columns: usize, values: usize },

    #[error("result-by-row query has no 'value' column")]
    MissingValue,
}

/// Map one row, stamped with the current time.
///
/// # Errors
///
/// Returns an error if the row does not match its columns or a result-by-row
/// query lacks a `value` column.
pub fn map_row(columns: &[String], values: Vec<Value>, result_by_row: bool) -> Result<Metric, MapError> {
    map_row_at(columns, values, result_by_row, Utc::now())
}

/// Map one row with an explicit timestamp.
///
/// # Errors
///
/// See [`map_row`].
pub fn map_row_at(
    columns: &[String],
    values: Vec<Value>,
    result_by_row: bool,
    timestamp: DateTime<Utc>,
) -> Result<Metric, MapError> {
    if columns.len() != values.len() {
        return Err(MapError::ColumnMismatch {
            columns: columns.len(),
            values: values.len(),
        });
    }

    let mut measurement = String::new();
    let mut tags = BTreeMap::new();
    let mut fields = BTreeMap::new();
    let mut row_value = None;

    for (column, value) in columns.iter().zip(values) {
        if result_by_row && column == VALUE_COLUMN {
            row_value = Some(value.clone());
        }

        match value {
            Value::String(s) if column == MEASUREMENT_COLUMN => measurement = s,
            Value::String(s) => {
                tags.insert(column.clone(), s);
            }
            _ if result_by_row => {}
            other => {
                fields.insert(column.clone(), other);
            }
        }
    }

    if result_by_row {
        let value = row_value.ok_or(MapError::MissingValue)?;
        fields.insert(VALUE_COLUMN.to_string(), value);
    }

    Ok(Metric {
        measurement,
        tags,
        fields,
        timestamp,
    })
}
