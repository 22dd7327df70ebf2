//! One report through parse, build and batch
//!
//! Rows are pulled lazily from the decoder and pushed through the point builder
//! into the batch writer. Nothing is buffered beyond the writer's own batch.

use crate::infra::config::RowErrorPolicy;
use crate::io::report::read_report;
use crate::io::store::StoreError;
use crate::services::batch_writer::BatchWriter;
use crate::services::point_builder::{PointBuilder, RowError};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use tracing::{info, warn};

/// Counters for one report, or summed over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Data rows yielded by the decoder (header excluded)
    pub rows_read: u64,
    pub points_written: u64,
    /// Value cell not numeric
    pub rows_dropped: u64,
    /// Row error under the skip policy
    pub rows_rejected: u64,
    /// Records the CSV layer could not read
    pub records_skipped: u64,
    pub batches: u64,
}

impl IngestStats {
    pub fn merge(&mut self, other: &IngestStats) {
        self.rows_read += other.rows_read;
        self.points_written += other.points_written;
        self.rows_dropped += other.rows_dropped;
        self.rows_rejected += other.rows_rejected;
        self.records_skipped += other.records_skipped;
        self.batches += other.batches;
    }
}

#[derive(Debug)]
pub enum IngestError {
    /// Row error under the abort policy; `row` is 1-based over data rows
    Row { row: u64, error: RowError },
    Store(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Row { row, error } => write!(f, "Rejected row {}: {}", row, error),
            IngestError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Row { error, .. } => Some(error),
            IngestError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        IngestError::Store(err)
    }
}

/// Ingest one decoded report and flush the writer's remainder
pub async fn ingest_report<R: Read>(
    reader: R,
    builder: &PointBuilder,
    writer: &mut BatchWriter,
    policy: RowErrorPolicy,
) -> Result<IngestStats, IngestError> {
    let mut stats = IngestStats::default();
    let flushes_before = writer.flushes();
    let written_before = writer.points_written();

    let mut rows = read_report(reader);
    for row in rows.by_ref() {
        stats.rows_read += 1;

        match builder.build(&row) {
            Ok(Some(point)) => writer.append(point).await?,
            Ok(None) => stats.rows_dropped += 1,
            Err(error) => match policy {
                RowErrorPolicy::Skip => {
                    stats.rows_rejected += 1;
                    warn!(row = %stats.rows_read, error = %error, "row_rejected");
                }
                RowErrorPolicy::Abort => {
                    return Err(IngestError::Row { row: stats.rows_read, error });
                }
            },
        }
    }
    stats.records_skipped = rows.skipped();

    writer.finish().await?;

    stats.points_written = writer.points_written() - written_before;
    stats.batches = writer.flushes() - flushes_before;

    info!(
        kind = %builder.kind(),
        measurement = %builder.measurement(),
        rows = %stats.rows_read,
        points = %stats.points_written,
        dropped = %stats.rows_dropped,
        rejected = %stats.rows_rejected,
        batches = %stats.batches,
        "report_ingested"
    );
    Ok(stats)
}
