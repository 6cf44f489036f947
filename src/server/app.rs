// axum application setup and server startup

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers::upload::handle_upload;
use super::uploads::{purge_staging_dir, StagingArea};
use crate::config::AppConfig;
use crate::pipeline::DestinationLocks;

/// shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub staging: StagingArea,
    pub locks: DestinationLocks,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            staging: StagingArea::from_config(&config),
            locks: DestinationLocks::new(),
            config: Arc::new(config),
        }
    }
}

/// create the axum application with all routes and middleware
pub fn create_app(config: AppConfig) -> Router {
    let body_limit = usize::try_from(config.upload.max_request_size).unwrap_or(usize::MAX);
    let app_state = AppState::new(config);

    Router::new()
        .route("/upload", post(handle_upload))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(app_state)
}

/// prepare the upload directory, then serve until the listener fails
pub async fn start_server(config: AppConfig) -> Result<()> {
    prepare_directories(&config).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid host/port combination")?;

    info!("starting chunkyard v{} at http://{}", env!("CARGO_PKG_VERSION"), addr);
    info!("upload dir: {}", config.upload_dir().display());
    info!("staging dir: {}", config.staging_dir().display());
    info!(
        "merge strategy: {:?}, max file size: {} bytes",
        config.upload.merge_strategy, config.upload.max_file_size
    );

    let app = create_app(config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    info!("server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn prepare_directories(config: &AppConfig) -> Result<()> {
    let upload_dir = config.upload_dir();

    if !upload_dir.exists() {
        if !config.upload.create_directories {
            anyhow::bail!("upload directory does not exist: {}", upload_dir.display());
        }
        tokio::fs::create_dir_all(upload_dir)
            .await
            .with_context(|| format!("failed to create upload directory {}", upload_dir.display()))?;
        info!("created upload directory {}", upload_dir.display());
    }

    if config.upload.purge_staging_on_start {
        let staging_dir = config.staging_dir();
        let removed = purge_staging_dir(&staging_dir)
            .await
            .with_context(|| format!("failed to purge staging dir {}", staging_dir.display()))?;
        if removed > 0 {
            warn!("removed {} orphaned staged part(s) from {}", removed, staging_dir.display());
        }
    }

    Ok(())
}
