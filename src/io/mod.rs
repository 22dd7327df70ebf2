//! IO modules - external system interfaces
//!
//! - `report` - UTF-16 report decoding into raw rows
//! - `archive` - report extraction from downloaded zip archives
//! - `source` - report repository trait and local mirror
//! - `sftp` - SFTP repository client
//! - `store` - point store trait and in-memory recorder
//! - `influx` - InfluxDB HTTP client (line protocol)
//! - `jsonl` - JSON lines sink for dry runs

pub mod archive;
pub mod influx;
pub mod jsonl;
pub mod report;
pub mod sftp;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use influx::InfluxStore;
pub use jsonl::JsonlStore;
pub use sftp::SftpSource;
pub use source::{LocalDirSource, ReportSource, SourceError};
pub use store::{MemoryStore, PointStore, StoreError};
