//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/importer.toml

use crate::domain::dataset::DatasetKind;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/importer.toml";

/// Where report archives are listed and fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Sftp,
    /// Directory holding a local mirror of the repository
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub kind: RemoteKind,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Remote directory of the generation reports
    pub generation_path: String,
    /// Remote directory of the cross-border flow reports
    pub cross_border_flow_path: String,
    /// Local staging directory for downloaded and extracted files
    pub local_path: String,
    /// Root of the mirrored tree when `kind = "local"`
    #[serde(default)]
    pub mirror_path: String,
}

fn default_sftp_port() -> u16 {
    22
}

impl RemoteConfig {
    pub fn remote_path(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Generation => &self.generation_path,
            DatasetKind::CrossBorderFlow => &self.cross_border_flow_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    /// Host name, or a full base URL such as "https://influx.example.com:8086"
    pub host: String,
    #[serde(default = "default_influx_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default = "default_measurement_generation")]
    pub measurement_generation: String,
    #[serde(default = "default_measurement_cross_border_flow")]
    pub measurement_cross_border_flow: String,
    /// Flush threshold of the batch writer
    #[serde(default = "default_max_lines_per_insert")]
    pub max_lines_per_insert: usize,
    /// Pause after each flush, in seconds
    #[serde(default)]
    pub wait_after_insert: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_influx_port() -> u16 {
    8086
}

fn default_measurement_generation() -> String {
    "generation".to_string()
}

fn default_measurement_cross_border_flow() -> String {
    "cross_border_flow".to_string()
}

fn default_max_lines_per_insert() -> usize {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

impl InfluxConfig {
    pub fn measurement(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Generation => &self.measurement_generation,
            DatasetKind::CrossBorderFlow => &self.measurement_cross_border_flow,
        }
    }

    /// Base URL of the HTTP API
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

/// What happens to a row whose value is numeric but whose other columns are malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Log and drop the row, keep going
    #[default]
    Skip,
    /// Fail the report being ingested
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Dataset names to import, in order
    #[serde(default = "default_datasets")]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub row_error_policy: RowErrorPolicy,
}

fn default_datasets() -> Vec<String> {
    DatasetKind::ALL.iter().map(|k| k.as_str().to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { datasets: default_datasets(), row_error_policy: RowErrorPolicy::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub remote: RemoteConfig,
    pub influxdb: InfluxConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    remote: RemoteConfig,
    influxdb: InfluxConfig,
    pipeline: PipelineConfig,
    config_file: String,
    wait_after_insert: Duration,
}

impl Config {
    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml_str(&content, &path.display().to_string())
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str, origin: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("Failed to parse TOML")?;

        let wait = toml_config.influxdb.wait_after_insert;
        let wait_after_insert = Duration::try_from_secs_f64(wait).map_err(|e| {
            anyhow::anyhow!(
                "influxdb.wait_after_insert must be a non-negative number of seconds, got {} ({})",
                wait,
                e
            )
        })?;

        let config = Self {
            remote: toml_config.remote,
            influxdb: toml_config.influxdb,
            pipeline: toml_config.pipeline,
            config_file: origin.to_string(),
            wait_after_insert,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.influxdb.max_lines_per_insert == 0 {
            bail!("influxdb.max_lines_per_insert must be at least 1");
        }
        if self.remote.kind == RemoteKind::Sftp && self.remote.host.trim().is_empty() {
            bail!("remote.host is required when remote.kind = \"sftp\"");
        }
        if self.remote.kind == RemoteKind::Local && self.remote.mirror_path.trim().is_empty() {
            bail!("remote.mirror_path is required when remote.kind = \"local\"");
        }
        if self.remote.local_path.trim().is_empty() {
            bail!("remote.local_path must not be empty");
        }
        Ok(())
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }

    pub fn influxdb(&self) -> &InfluxConfig {
        &self.influxdb
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn row_error_policy(&self) -> RowErrorPolicy {
        self.pipeline.row_error_policy
    }

    pub fn max_lines_per_insert(&self) -> usize {
        self.influxdb.max_lines_per_insert
    }

    pub fn wait_after_insert(&self) -> Duration {
        self.wait_after_insert
    }
}
