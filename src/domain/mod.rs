//! Domain models - report rows, points and dataset kinds
//!
//! - `dataset` - the closed set of report families and their column layouts
//! - `point` - raw report rows and the time-series points built from them

pub mod dataset;
pub mod point;

pub use dataset::{ColumnLayout, DatasetKind, TagColumn, UnknownDatasetKind};
pub use point::{PointFields, RawRow, TimeSeriesPoint};
