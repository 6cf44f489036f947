// chunkyard: chunked multipart upload service
// main entry point with minimal bootstrap logic

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use chunkyard::config::{load_configuration, Cli};
use chunkyard::server::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet)?;

    // defaults < config file < environment < cli
    let config = load_configuration(&cli)?;

    start_server(config).await
}

/// initialize structured logging with tracing
fn init_logging(verbose_count: u8, quiet_count: u8) -> Result<()> {
    // info (default) + verbose - quiet
    let base_level = 2i8;
    let adjustment = verbose_count as i8 - quiet_count as i8;
    let final_level = (base_level + adjustment).clamp(0, 4);

    let level = match final_level {
        i8::MIN..=0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        4.. => Level::TRACE,
    };

    // RUST_LOG, when set, wins over the flag-derived level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("logging initialized at level: {}", level);
    Ok(())
}
