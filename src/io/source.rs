//! Report repositories - list a directory, fetch one archive to staging
//!
//! The importer only needs two things from a repository: the names in a
//! dataset's directory, and a way to copy one of them to a local path.
//! `SftpSource` talks to the publisher's server; `LocalDirSource` reads a
//! mirrored copy of the same tree.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub enum SourceError {
    /// Session could not be established or was lost
    Connection(String),
    /// Listing or transfer failed
    Io(io::Error),
    /// Blocking worker panicked or was cancelled
    Task(String),
}

impl SourceError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SourceError::Connection(_))
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Connection(msg) => write!(f, "Remote connection failed: {}", msg),
            SourceError::Io(e) => write!(f, "Remote I/O failed: {}", e),
            SourceError::Task(msg) => write!(f, "Remote worker failed: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        SourceError::Io(err)
    }
}

impl From<tokio::task::JoinError> for SourceError {
    fn from(err: tokio::task::JoinError) -> Self {
        SourceError::Task(err.to_string())
    }
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    /// File names (not paths) in `dir`, in the repository's listing order
    async fn list(&self, dir: &str) -> Result<Vec<String>, SourceError>;

    /// Copy `dir/name` to `dest`, replacing any existing file
    async fn fetch(&self, dir: &str, name: &str, dest: &Path) -> Result<(), SourceError>;

    /// End the session; later calls may fail
    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Reads from a local mirror of the remote tree
///
/// Dataset directories are resolved relative to `root` (a leading `/` is
/// ignored). Archives are copied to staging and never removed from the mirror.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, dir: &str) -> PathBuf {
        self.root.join(dir.trim_start_matches('/'))
    }
}

#[async_trait]
impl ReportSource for LocalDirSource {
    async fn list(&self, dir: &str) -> Result<Vec<String>, SourceError> {
        let path = self.resolve(dir);
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        // read_dir order is platform dependent
        names.sort();

        debug!(dir = %path.display(), files = %names.len(), "source_listed");
        Ok(names)
    }

    async fn fetch(&self, dir: &str, name: &str, dest: &Path) -> Result<(), SourceError> {
        let src = self.resolve(dir).join(name);
        let bytes = tokio::fs::copy(&src, dest).await?;
        debug!(src = %src.display(), dest = %dest.display(), bytes = %bytes, "source_fetched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_list_skips_directories() {
        let mirror = tempfile::tempdir().unwrap();
        let dir = mirror.path().join("gen");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("2021_5_A.zip"), b"a").unwrap();
        std::fs::write(dir.join("2021_4_A.zip"), b"b").unwrap();

        let source = LocalDirSource::new(mirror.path());
        let names = source.list("/gen").await.unwrap();

        assert_eq!(names, vec!["2021_4_A.zip".to_string(), "2021_5_A.zip".to_string()]);
    }

    #[tokio::test]
    async fn test_local_fetch_copies_and_keeps_original() {
        let mirror = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(mirror.path().join("gen")).unwrap();
        std::fs::write(mirror.path().join("gen/report.zip"), b"payload").unwrap();

        let source = LocalDirSource::new(mirror.path());
        let dest = staging.path().join("report.zip");
        source.fetch("gen", "report.zip", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(mirror.path().join("gen/report.zip").exists());
    }

    #[tokio::test]
    async fn test_local_list_missing_dir_is_io_error() {
        let mirror = tempfile::tempdir().unwrap();
        let source = LocalDirSource::new(mirror.path());

        let err = source.list("missing").await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
        assert!(!err.is_connection());
    }
}
