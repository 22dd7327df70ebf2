//! Batch writer - size-triggered flushes with a pause after each flush
//!
//! Points are appended in arrival order. When the buffer reaches
//! `max_lines_per_insert` the whole buffer goes to the store in one call, the
//! buffer is cleared, and the writer sleeps for `wait_after_insert` before
//! accepting more work. That pause is the only throttle on write rate.
//!
//! A failed write is not retried: the batch is gone and the error goes to the
//! caller.

use crate::domain::point::TimeSeriesPoint;
use crate::io::store::{PointStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct BatchWriter {
    store: Arc<dyn PointStore>,
    buffer: Vec<TimeSeriesPoint>,
    max_lines: usize,
    wait_after_insert: Duration,
    flushes: u64,
    points_written: u64,
}

impl BatchWriter {
    /// `max_lines_per_insert` below 1 is treated as 1
    pub fn new(
        store: Arc<dyn PointStore>,
        max_lines_per_insert: usize,
        wait_after_insert: Duration,
    ) -> Self {
        let max_lines = max_lines_per_insert.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(max_lines.min(65_536)),
            max_lines,
            wait_after_insert,
            flushes: 0,
            points_written: 0,
        }
    }

    /// Add a point; flushes and pauses when the threshold is reached
    pub async fn append(&mut self, point: TimeSeriesPoint) -> Result<(), StoreError> {
        self.buffer.push(point);

        if self.buffer.len() >= self.max_lines {
            self.flush().await?;
            if !self.wait_after_insert.is_zero() {
                tokio::time::sleep(self.wait_after_insert).await;
            }
        }
        Ok(())
    }

    /// Write whatever is left. No pause afterwards; an empty buffer never touches the store.
    pub async fn finish(&mut self) -> Result<(), StoreError> {
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);

        self.store.write_points(&batch).await?;

        self.flushes += 1;
        self.points_written += batch.len() as u64;
        info!(points = %batch.len(), flushes = %self.flushes, "batch_flushed");
        Ok(())
    }

    /// Points waiting for the next flush
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Non-empty batches written so far
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn points_written(&self) -> u64 {
        self.points_written
    }
}
