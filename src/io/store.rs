//! Point store interface
//!
//! The batch writer only sees `dyn PointStore`; InfluxDB, the JSONL dry-run
//! sink and the in-memory recorder all sit behind it.

use crate::domain::point::TimeSeriesPoint;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Failure while writing to a store
#[derive(Debug)]
pub enum StoreError {
    /// Store unreachable (connect failure, timeout, failed ping)
    Connection(String),
    /// Store answered with a non-success status
    Http { status: u16, body: String },
    /// Request failed after the connection was established
    Request(String),
    /// Local sink I/O failed
    Io(std::io::Error),
    /// Point could not be serialized
    Serialize(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "Store connection failed: {}", msg),
            StoreError::Http { status, body } => {
                write!(f, "Store returned HTTP {}: {}", status, body)
            }
            StoreError::Request(msg) => write!(f, "Store request failed: {}", msg),
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::Serialize(msg) => write!(f, "Point serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// Append-only destination for points
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Write `points` in order with second precision.
    ///
    /// An empty slice must succeed without touching the store.
    async fn write_points(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError>;
}

/// Store that keeps every written batch in memory
///
/// Used for embedding the pipeline and in tests.
#[derive(Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Vec<TimeSeriesPoint>>>,
    write_calls: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent non-empty writes fail with a connection error
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Non-empty batches, in write order
    pub fn batches(&self) -> Vec<Vec<TimeSeriesPoint>> {
        self.batches.lock().clone()
    }

    /// All stored points, in write order
    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Number of `write_points` calls, empty ones included
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    async fn write_points(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if points.is_empty() {
            return Ok(());
        }
        if self.fail.load(Ordering::Relaxed) {
            return Err(StoreError::Connection("memory store set to fail".to_string()));
        }
        self.batches.lock().push(points.to_vec());
        Ok(())
    }
}
