// configuration type definitions

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// command line interface definition
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "chunkyard", version = env!("CARGO_PKG_VERSION"))]
#[command(about = "chunked multipart upload service")]
pub struct Cli {
    /// root directory merged files are written under
    #[arg(short = 'd', long, env = "CHUNKYARD_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// directory multipart parts are staged in before merging
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// host to listen on
    #[arg(short = 'l', long, env = "CHUNKYARD_HOST")]
    pub host: Option<String>,

    /// port to listen on
    #[arg(short = 'p', long, env = "CHUNKYARD_PORT")]
    pub port: Option<u16>,

    /// config file to use
    #[arg(short = 'c', long)]
    pub config_file: Option<PathBuf>,

    /// increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

/// complete application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// server configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
}

/// upload and merge configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
    #[serde(default = "default_true")]
    pub create_directories: bool,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default = "default_true")]
    pub cleanup_rejected: bool,
    #[serde(default = "default_true")]
    pub purge_staging_on_start: bool,
}

/// how merged bytes reach the destination file
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// build the result in a sibling temp file and rename it into place
    #[default]
    Atomic,
    /// append straight into the destination file
    InPlace,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "atomic" => Ok(MergeStrategy::Atomic),
            "in_place" | "in-place" => Ok(MergeStrategy::InPlace),
            _ => Err(format!("Invalid merge strategy: {s}")),
        }
    }
}

impl AppConfig {
    /// root directory all resolved destinations live under
    pub fn upload_dir(&self) -> &PathBuf {
        &self.server.upload_dir
    }

    /// effective staging directory (defaults to `<upload_dir>/.staging`)
    pub fn staging_dir(&self) -> PathBuf {
        self.upload
            .staging_dir
            .clone()
            .unwrap_or_else(|| self.server.upload_dir.join(".staging"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 327,
            upload_dir: PathBuf::from("upload"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_dir: None,
            max_file_size: default_max_file_size(),
            max_request_size: default_max_request_size(),
            create_directories: true,
            merge_strategy: MergeStrategy::default(),
            cleanup_rejected: true,
            purge_staging_on_start: true,
        }
    }
}

// default value functions for serde
fn default_max_file_size() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

fn default_max_request_size() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_true() -> bool {
    true
}
