// configuration loading and merging logic

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;
use tracing::{debug, info};

use super::types::{AppConfig, Cli};

/// prefix for environment overrides, `__` separates nested keys
pub const ENV_PREFIX: &str = "CHUNKYARD_";

/// load and merge configuration from multiple sources
/// precedence: defaults < config file < environment < cli arguments
pub fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    debug!("loading configuration with cli args: {:?}", cli);

    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

    if let Some(config_path) = &cli.config_file {
        if config_path.exists() {
            info!("loading config file: {}", config_path.display());
            figment = figment.merge(Toml::file(config_path));
        } else {
            anyhow::bail!("config file not found: {}", config_path.display());
        }
    }

    figment = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(cli_overrides(cli));

    let config: AppConfig = figment.extract().context("failed to parse configuration")?;

    validate_configuration(&config)?;

    debug!("final configuration: {:?}", config);
    Ok(config)
}

/// load configuration from a single toml file on top of the defaults
pub fn load_config_from_file(config_path: &Path) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(config_path))
        .extract()
        .context("failed to parse configuration file")?;

    validate_configuration(&config)?;
    Ok(config)
}

/// only flags the user actually passed become overrides
fn cli_overrides(cli: &Cli) -> Figment {
    let mut overrides = Figment::new();

    if let Some(host) = &cli.host {
        overrides = overrides.merge(Serialized::default("server.host", host));
    }
    if let Some(port) = cli.port {
        overrides = overrides.merge(Serialized::default("server.port", port));
    }
    if let Some(upload_dir) = &cli.upload_dir {
        overrides = overrides.merge(Serialized::default("server.upload_dir", upload_dir));
    }
    if let Some(staging_dir) = &cli.staging_dir {
        overrides = overrides.merge(Serialized::default("upload.staging_dir", staging_dir));
    }

    overrides
}

/// validate configuration for consistency
fn validate_configuration(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("port cannot be 0");
    }

    if config.upload.max_file_size == 0 {
        anyhow::bail!("upload.max_file_size must be greater than 0");
    }

    let upload_dir = config.upload_dir();
    if upload_dir.exists() && !upload_dir.is_dir() {
        anyhow::bail!(
            "upload directory is not a directory: {}",
            upload_dir.display()
        );
    }

    if !upload_dir.exists() && !config.upload.create_directories {
        anyhow::bail!(
            "upload directory does not exist and create_directories is false: {}",
            upload_dir.display()
        );
    }

    // staged parts are purged, so the upload tree must not live inside them
    if upload_dir.starts_with(config.staging_dir()) {
        anyhow::bail!(
            "upload directory must not be inside the staging directory: {}",
            upload_dir.display()
        );
    }

    Ok(())
}
