//! ENTSO-E report importer
//!
//! Fetches the current and previous month's grid reports (generation per type,
//! cross-border physical flows) from the transparency platform's repository and
//! writes them to InfluxDB in paced batches.
//!
//! Module structure:
//! - `domain/` - Dataset layouts and point types
//! - `io/` - External interfaces (report decoding, SFTP, archives, InfluxDB, JSONL)
//! - `services/` - Import logic (point building, batching, orchestration)
//! - `infra/` - Infrastructure (Config, logging)

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use entsoe_importer::domain::DatasetKind;
use entsoe_importer::infra::{init_logging, Config, RemoteKind};
use entsoe_importer::io::{
    InfluxStore, JsonlStore, LocalDirSource, PointStore, ReportSource, SftpSource,
};
use entsoe_importer::services::Importer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Store unreachable at startup
const EXIT_STORE_UNREACHABLE: u8 = 3;

/// ENTSO-E report importer - grid reports into InfluxDB
#[derive(Parser, Debug)]
#[command(
    name = "entsoe-importer",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about
)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/importer.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Append log output to this file instead of stderr
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Write points as JSON lines (stdout, or PATH) instead of InfluxDB
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    dry_run: Option<Option<PathBuf>>,

    /// Reference date for month selection (YYYY-MM-DD, default today)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Ingest one local report (.csv or .zip) instead of the remote repository
    #[arg(long, requires = "kind")]
    file: Option<PathBuf>,

    /// Dataset kind of --file (generation | cross_border_flow)
    #[arg(long, requires = "file")]
    kind: Option<DatasetKind>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("entsoe-importer: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "entsoe-importer starting");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "import_failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::from_file(&config_path)?;

    info!(
        config_file = %config.config_file(),
        remote_kind = ?config.remote().kind,
        remote_host = %config.remote().host,
        staging = %config.remote().local_path,
        influxdb = %config.influxdb().base_url(),
        database = %config.influxdb().database,
        max_lines_per_insert = %config.max_lines_per_insert(),
        wait_after_insert = ?config.wait_after_insert(),
        datasets = ?config.pipeline().datasets,
        row_error_policy = ?config.row_error_policy(),
        "config_loaded"
    );

    let store: Arc<dyn PointStore> = match &args.dry_run {
        Some(Some(path)) => Arc::new(
            JsonlStore::create(path)
                .with_context(|| format!("Failed to open dry-run output {}", path.display()))?,
        ),
        Some(None) => Arc::new(JsonlStore::stdout()),
        None => {
            let influx = InfluxStore::new(config.influxdb()).context("Failed to build InfluxDB client")?;
            if let Err(e) = influx.ping().await {
                error!(url = %config.influxdb().base_url(), error = %e, "influxdb_unreachable");
                return Ok(ExitCode::from(EXIT_STORE_UNREACHABLE));
            }
            info!(url = %config.influxdb().base_url(), "influxdb_connected");
            Arc::new(influx)
        }
    };

    if let (Some(path), Some(kind)) = (&args.file, args.kind) {
        let importer = Importer::offline(config, store);
        let stats = importer
            .ingest_local_file(kind, path)
            .await
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
        info!(file = %path.display(), points = %stats.points_written, "file_imported");
        return Ok(ExitCode::SUCCESS);
    }

    let source: Arc<dyn ReportSource> = match config.remote().kind {
        RemoteKind::Sftp => Arc::new(
            SftpSource::connect(config.remote())
                .await
                .with_context(|| format!("Failed to connect to {}", config.remote().host))?,
        ),
        RemoteKind::Local => Arc::new(LocalDirSource::new(&config.remote().mirror_path)),
    };

    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    info!(date = %today, "import_started");

    let importer = Importer::new(config, source.clone(), store);
    let result = importer.run(today).await;

    if let Err(e) = source.close().await {
        warn!(error = %e, "source_close_failed");
    }
    result.context("Import run failed")?;

    Ok(ExitCode::SUCCESS)
}
