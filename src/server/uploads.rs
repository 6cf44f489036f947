// multipart staging and upload error mapping

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::{
    extract::multipart::{Field, MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::pipeline::{PipelineError, ResolveError, UploadedPart};
use crate::utils::paths::PathTraversalError;

const MAX_FILENAME_BYTES: usize = 255;
const STAGED_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no files were uploaded")]
    NoFiles,
    #[error("duplicate files in request, do not upload them twice: {}", .0.join(", "))]
    Duplicates(Vec<String>),
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("invalid sub folder: {0}")]
    InvalidSubFolder(#[source] PathTraversalError),
    #[error("file {name} exceeds the {limit} byte limit")]
    PayloadTooLarge { name: String, limit: u64 },
    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Pipeline(PipelineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for UploadError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoFiles => UploadError::NoFiles,
            PipelineError::Resolve(ResolveError::InvalidSubFolder(err)) => {
                UploadError::InvalidSubFolder(err)
            }
            other => UploadError::Pipeline(other),
        }
    }
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NoFiles => StatusCode::BAD_REQUEST,
            UploadError::Duplicates(_) => StatusCode::BAD_REQUEST,
            UploadError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            UploadError::InvalidSubFolder(_) => StatusCode::BAD_REQUEST,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Multipart(err) => err.status(),
            UploadError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // server-side detail stays in the log
        let message = if status.is_server_error() {
            error!("upload failed: {}", self);
            "internal server error".to_string()
        } else {
            warn!("upload rejected: {}", self);
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// directory where incoming file parts are written under unique names
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    max_file_size: u64,
}

impl StagingArea {
    pub fn new(dir: PathBuf, max_file_size: u64) -> Self {
        Self { dir, max_file_size }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.staging_dir(), config.upload.max_file_size)
    }

    /// stream one multipart file field to a fresh staging file
    pub async fn stage_field(
        &self,
        original_name: &str,
        mut field: Field<'_>,
    ) -> Result<UploadedPart, UploadError> {
        let original_name = sanitize_filename(original_name)?;

        fs::create_dir_all(&self.dir).await?;
        let temp_path = self
            .dir
            .join(format!("{}{STAGED_SUFFIX}", Uuid::new_v4().simple()));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        match write_field_to_file(&mut field, &mut file, &original_name, self.max_file_size).await
        {
            Ok(size) => {
                debug!(
                    "staged {} ({} bytes) at {}",
                    original_name,
                    size,
                    temp_path.display()
                );
                Ok(UploadedPart {
                    original_name,
                    temp_path,
                    size,
                })
            }
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&temp_path).await;
                Err(err)
            }
        }
    }
}

/// delete staged parts left behind by a previous process.
/// returns how many were removed.
pub async fn purge_staging_dir(dir: &Path) -> std::io::Result<usize> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut removed = 0;
    while let Some(entry) = read_dir.next_entry().await? {
        let is_staged = entry.file_name().to_string_lossy().ends_with(STAGED_SUFFIX);
        if is_staged && entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }

    Ok(removed)
}

fn sanitize_filename(filename: &str) -> Result<String, UploadError> {
    let invalid = filename.is_empty()
        || filename.len() > MAX_FILENAME_BYTES
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
        || filename == "."
        || filename == "..";

    if invalid {
        return Err(UploadError::InvalidFilename(filename.to_string()));
    }

    Ok(filename.to_string())
}

async fn write_field_to_file(
    field: &mut Field<'_>,
    file: &mut fs::File,
    name: &str,
    max_bytes: u64,
) -> Result<u64, UploadError> {
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(UploadError::PayloadTooLarge {
                name: name.to_string(),
                limit: max_bytes,
            });
        }

        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
