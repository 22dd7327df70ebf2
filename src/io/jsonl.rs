//! Dry-run sink - writes points as JSON lines instead of sending them to InfluxDB
//!
//! One JSON object per line, in the store write shape:
//! `{"time":1619827200,"measurement":"generation","fields":{"value":10.0},"tags":{..}}`

use crate::domain::point::TimeSeriesPoint;
use crate::io::store::{PointStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

pub struct JsonlStore {
    target: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlStore {
    pub fn stdout() -> Self {
        info!(target_file = "stdout", "jsonl_store_initialized");
        Self::from_writer("stdout", Box::new(io::stdout()))
    }

    /// Append to `path`, creating it and its parent directories if needed
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(target_file = %path.display(), "jsonl_store_initialized");
        Ok(Self { target: path.display().to_string(), writer: Mutex::new(Box::new(file)) })
    }

    /// Write into any sink
    pub fn from_writer(target: &str, writer: Box<dyn Write + Send>) -> Self {
        Self { target: target.to_string(), writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl PointStore for JsonlStore {
    async fn write_points(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for point in points {
            let json =
                serde_json::to_string(point).map_err(|e| StoreError::Serialize(e.to_string()))?;
            buf.push_str(&json);
            buf.push('\n');
        }

        let mut writer = self.writer.lock();
        writer.write_all(buf.as_bytes())?;
        writer.flush()?;
        debug!(target_file = %self.target, points = %points.len(), "jsonl_written");
        Ok(())
    }
}
