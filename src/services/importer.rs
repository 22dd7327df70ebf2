//! Run orchestration - select, fetch, extract, ingest, clean up
//!
//! For every configured dataset the importer lists the dataset's remote
//! directory, keeps the archives published for the current and the previous
//! calendar month, and processes them one at a time. Each archive is staged,
//! its report extracted and ingested, and both local files are removed again
//! whether or not ingestion succeeded.

use crate::domain::dataset::DatasetKind;
use crate::infra::config::Config;
use crate::io::archive::{extract_report, ArchiveError};
use crate::io::source::{ReportSource, SourceError};
use crate::io::store::PointStore;
use crate::services::batch_writer::BatchWriter;
use crate::services::pipeline::{ingest_report, IngestError, IngestStats};
use crate::services::point_builder::PointBuilder;
use chrono::{Datelike, Months, NaiveDate};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum ImportError {
    Source(SourceError),
    Archive(ArchiveError),
    Ingest(IngestError),
    /// Staging directory or report file
    Io(io::Error),
    /// Single-file mode got something that is neither `.csv` nor `.zip`
    UnsupportedFile(PathBuf),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Source(e) => write!(f, "{}", e),
            ImportError::Archive(e) => write!(f, "{}", e),
            ImportError::Ingest(e) => write!(f, "{}", e),
            ImportError::Io(e) => write!(f, "Staging I/O failed: {}", e),
            ImportError::UnsupportedFile(path) => {
                write!(f, "Unsupported report file {} (expected .csv or .zip)", path.display())
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Source(e) => Some(e),
            ImportError::Archive(e) => Some(e),
            ImportError::Ingest(e) => Some(e),
            ImportError::Io(e) => Some(e),
            ImportError::UnsupportedFile(_) => None,
        }
    }
}

impl From<SourceError> for ImportError {
    fn from(err: SourceError) -> Self {
        ImportError::Source(err)
    }
}

impl From<ArchiveError> for ImportError {
    fn from(err: ArchiveError) -> Self {
        ImportError::Archive(err)
    }
}

impl From<IngestError> for ImportError {
    fn from(err: IngestError) -> Self {
        ImportError::Ingest(err)
    }
}

impl From<io::Error> for ImportError {
    fn from(err: io::Error) -> Self {
        ImportError::Io(err)
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::Io(io::Error::other(err.to_string()))
    }
}

/// Name prefix of a month's archives: "2021_5_" (month not zero padded)
pub fn month_prefix(date: NaiveDate) -> String {
    format!("{}_{}_", date.year(), date.month())
}

/// Prefixes for the month of `today` and the month before it
pub fn month_prefixes(today: NaiveDate) -> [String; 2] {
    let first = today.with_day(1).unwrap_or(today);
    let previous = first.checked_sub_months(Months::new(1)).unwrap_or(first);
    [month_prefix(today), month_prefix(previous)]
}

/// Names containing any prefix, grouped by prefix order, listing order within a group
pub fn select_files(listing: &[String], prefixes: &[String]) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for prefix in prefixes {
        for name in listing {
            if name.contains(prefix.as_str()) && !selected.contains(name) {
                selected.push(name.clone());
            }
        }
    }
    selected
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "artifact_removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "artifact_remove_failed"),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

pub struct Importer {
    config: Config,
    source: Option<Arc<dyn ReportSource>>,
    store: Arc<dyn PointStore>,
}

impl Importer {
    pub fn new(config: Config, source: Arc<dyn ReportSource>, store: Arc<dyn PointStore>) -> Self {
        Self { config, source: Some(source), store }
    }

    /// Importer without a repository, for single-file ingestion only
    pub fn offline(config: Config, store: Arc<dyn PointStore>) -> Self {
        Self { config, source: None, store }
    }

    fn staging_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.remote().local_path)
    }

    /// Import every configured dataset for the month of `today` and the one before
    pub async fn run(&self, today: NaiveDate) -> Result<IngestStats, ImportError> {
        let mut totals = IngestStats::default();

        for name in &self.config.pipeline().datasets {
            let kind = match name.parse::<DatasetKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    error!(error = %e, "dataset_skipped");
                    continue;
                }
            };
            let stats = self.import_dataset(kind, today).await?;
            totals.merge(&stats);
        }

        info!(
            rows = %totals.rows_read,
            points = %totals.points_written,
            dropped = %totals.rows_dropped,
            rejected = %totals.rows_rejected,
            batches = %totals.batches,
            "run_completed"
        );
        Ok(totals)
    }

    /// List, select and import the archives of one dataset
    pub async fn import_dataset(
        &self,
        kind: DatasetKind,
        today: NaiveDate,
    ) -> Result<IngestStats, ImportError> {
        let Some(source) = &self.source else {
            return Err(ImportError::Source(SourceError::Connection(
                "no report repository configured".to_string(),
            )));
        };
        let dir = self.config.remote().remote_path(kind);

        let listing = source.list(dir).await?;
        let selected = select_files(&listing, &month_prefixes(today));
        info!(kind = %kind, dir = %dir, listed = %listing.len(), selected = %selected.len(), "files_selected");

        let mut stats = IngestStats::default();
        for name in &selected {
            let file_stats = self.import_remote_file(source.as_ref(), kind, dir, name).await?;
            stats.merge(&file_stats);
        }
        Ok(stats)
    }

    async fn import_remote_file(
        &self,
        source: &dyn ReportSource,
        kind: DatasetKind,
        dir: &str,
        name: &str,
    ) -> Result<IngestStats, ImportError> {
        let staging = self.staging_dir();
        tokio::fs::create_dir_all(&staging).await?;
        let archive = staging.join(name);

        info!(kind = %kind, file = %name, "file_download");
        let result = match source.fetch(dir, name, &archive).await {
            Ok(()) => self.ingest_archive(kind, &archive).await,
            Err(e) => Err(e.into()),
        };
        remove_artifact(&archive);

        let stats = result?;
        info!(kind = %kind, file = %name, points = %stats.points_written, "file_imported");
        Ok(stats)
    }

    /// Extract the report next to the archive, ingest it, remove the extracted copy
    async fn ingest_archive(
        &self,
        kind: DatasetKind,
        archive: &Path,
    ) -> Result<IngestStats, ImportError> {
        let zip_path = archive.to_path_buf();
        let staging = self.staging_dir();
        let report =
            tokio::task::spawn_blocking(move || extract_report(&zip_path, &staging)).await??;

        let result = self.ingest_csv(kind, &report).await;
        remove_artifact(&report);
        result
    }

    /// Decodes with blocking reads from local staging on the current worker;
    /// only one report is in flight per run.
    async fn ingest_csv(&self, kind: DatasetKind, path: &Path) -> Result<IngestStats, ImportError> {
        let reader = BufReader::new(File::open(path)?);
        let builder = PointBuilder::new(kind, self.config.influxdb().measurement(kind));
        let mut writer = BatchWriter::new(
            self.store.clone(),
            self.config.max_lines_per_insert(),
            self.config.wait_after_insert(),
        );

        Ok(ingest_report(reader, &builder, &mut writer, self.config.row_error_policy()).await?)
    }

    /// Ingest one local `.csv` report or `.zip` archive
    ///
    /// The given file is left in place; only an extracted report is removed.
    pub async fn ingest_local_file(
        &self,
        kind: DatasetKind,
        path: &Path,
    ) -> Result<IngestStats, ImportError> {
        if has_extension(path, "zip") {
            tokio::fs::create_dir_all(self.staging_dir()).await?;
            self.ingest_archive(kind, path).await
        } else if has_extension(path, "csv") {
            self.ingest_csv(kind, path).await
        } else {
            Err(ImportError::UnsupportedFile(path.to_path_buf()))
        }
    }
}
