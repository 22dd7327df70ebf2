//! Raw report rows to time-series points
//!
//! The value column is the data-quality filter: blank or placeholder cells
//! ("n/e", "") mean the row carries no observation and it is dropped without
//! error. Anything structurally wrong past that point is a [`RowError`] and the
//! caller decides whether to skip the row or abort the report.

use crate::domain::dataset::DatasetKind;
use crate::domain::point::{PointFields, RawRow, TimeSeriesPoint};
use crate::services::timestamp::{parse_report_datetime, TimestampError};
use std::collections::BTreeMap;
use std::fmt;

/// Row that passed the value filter but cannot become a point
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    /// Row is shorter than the layout requires
    MissingColumn { column: usize, len: usize },
    /// Date/time column is malformed
    Timestamp(TimestampError),
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::MissingColumn { column, len } => {
                write!(f, "Missing column {} (row has {} columns)", column, len)
            }
            RowError::Timestamp(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RowError::Timestamp(e) => Some(e),
            RowError::MissingColumn { .. } => None,
        }
    }
}

impl From<TimestampError> for RowError {
    fn from(err: TimestampError) -> Self {
        RowError::Timestamp(err)
    }
}

/// Parse a value cell; `None` for anything that is not a finite number
#[inline]
pub fn parse_value(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn column(row: &RawRow, index: usize) -> Result<&str, RowError> {
    row.get(index).ok_or(RowError::MissingColumn { column: index, len: row.len() })
}

/// Maps rows of one dataset kind onto points of one measurement
#[derive(Debug, Clone)]
pub struct PointBuilder {
    kind: DatasetKind,
    measurement: String,
}

impl PointBuilder {
    pub fn new(kind: DatasetKind, measurement: impl Into<String>) -> Self {
        Self { kind, measurement: measurement.into() }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Build the point for one row
    ///
    /// `Ok(None)` means the value cell is not numeric and the row is dropped.
    pub fn build(&self, row: &RawRow) -> Result<Option<TimeSeriesPoint>, RowError> {
        let layout = self.kind.layout();

        let Some(value) = row.get(layout.value).and_then(parse_value) else {
            return Ok(None);
        };

        let time = parse_report_datetime(column(row, layout.datetime)?)?;

        let mut tags = BTreeMap::new();
        for tag in layout.tags {
            let raw = column(row, tag.index)?.trim();
            let tag_value = if tag.replace_slash { raw.replace('/', "-") } else { raw.to_string() };
            tags.insert(tag.key, tag_value);
        }

        Ok(Some(TimeSeriesPoint {
            time,
            measurement: self.measurement.clone(),
            fields: PointFields { value },
            tags,
        }))
    }
}
