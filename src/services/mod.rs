//! Services - import logic
//!
//! - `timestamp` - report date/time to epoch seconds
//! - `point_builder` - raw rows to points per dataset layout
//! - `batch_writer` - size-triggered batched writes with pause
//! - `pipeline` - one report through parse, build and batch
//! - `importer` - month selection and per-file orchestration

pub mod batch_writer;
pub mod importer;
pub mod pipeline;
pub mod point_builder;
pub mod timestamp;

// Re-export commonly used types
pub use batch_writer::BatchWriter;
pub use importer::{ImportError, Importer};
pub use pipeline::{ingest_report, IngestError, IngestStats};
pub use point_builder::{PointBuilder, RowError};
