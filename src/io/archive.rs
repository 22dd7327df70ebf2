//! Archive extraction - pull the report out of a downloaded zip
//!
//! Each published archive carries one `.csv` report. The first such entry is
//! written into the staging directory under its bare file name; other entries
//! are ignored. Blocking; callers on the runtime go through `spawn_blocking`.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    /// Archive holds no `.csv` entry
    NoReport(PathBuf),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "Archive I/O failed: {}", e),
            ArchiveError::Zip(e) => write!(f, "Invalid archive: {}", e),
            ArchiveError::NoReport(path) => {
                write!(f, "No .csv report in archive {}", path.display())
            }
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Zip(e) => Some(e),
            ArchiveError::NoReport(_) => None,
        }
    }
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        ArchiveError::Io(err)
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ArchiveError::Zip(err)
    }
}

fn is_report(name: &Path) -> bool {
    name.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Extract the report from `zip_path` into `dest_dir` and return its path
pub fn extract_report(zip_path: &Path, dest_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let mut archive = zip::ZipArchive::new(File::open(zip_path)?)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        // Entries escaping the archive root are ignored
        let Some(inner) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        if !is_report(&inner) {
            continue;
        }
        let Some(file_name) = inner.file_name() else {
            continue;
        };

        std::fs::create_dir_all(dest_dir)?;
        let out_path = dest_dir.join(file_name);
        let mut out = File::create(&out_path)?;
        let bytes = io::copy(&mut entry, &mut out)?;

        debug!(archive = %zip_path.display(), report = %out_path.display(), bytes = %bytes, "report_extracted");
        return Ok(out_path);
    }

    Err(ArchiveError::NoReport(zip_path.to_path_buf()))
}
