// file upload handler

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::pipeline::{self, dedup, MergeOutcome, RequestBatch, UploadedPart};
use crate::server::app::AppState;
use crate::server::uploads::UploadError;

/// multipart text field naming the destination subfolder
pub const SUB_FOLDER_FIELD: &str = "subFolder";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub files: Vec<UploadedFile>,
}

/// one accepted part; `path` is the merged file now holding its bytes
#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub originalname: String,
    pub path: String,
}

impl UploadedFile {
    fn merged(part: &UploadedPart, destination: &Path) -> Self {
        Self {
            originalname: part.original_name.clone(),
            path: destination.display().to_string(),
        }
    }
}

/// `POST /upload`: stage every file part, then dedup and merge them
#[instrument(skip(state, multipart))]
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    info!("processing upload request");

    let batch = collect_batch(&state, multipart).await?;
    debug!(
        "received {} file part(s), sub folder {:?}",
        batch.parts.len(),
        batch.sub_folder
    );

    match pipeline::process_batch(&state.config, &state.locks, batch).await? {
        MergeOutcome::Merged {
            destination, parts, ..
        } => {
            info!("upload completed successfully: {}", destination.display());
            Ok(Json(UploadResponse {
                success: true,
                message: "files uploaded successfully".to_string(),
                files: parts
                    .iter()
                    .map(|part| UploadedFile::merged(part, &destination))
                    .collect(),
            }))
        }
        MergeOutcome::Rejected { duplicates } => Err(UploadError::Duplicates(duplicates)),
    }
}

/// read the whole body; parts staged so far are removed if reading fails
async fn collect_batch(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<RequestBatch, UploadError> {
    let mut batch = RequestBatch::default();

    if let Err(err) = read_fields(state, &mut multipart, &mut batch).await {
        dedup::discard_all(&batch.parts).await;
        return Err(err);
    }

    Ok(batch)
}

async fn read_fields(
    state: &AppState,
    multipart: &mut Multipart,
    batch: &mut RequestBatch,
) -> Result<(), UploadError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(|s| s.to_string());

        debug!(
            "processing multipart field: {} (filename: {:?})",
            name, filename
        );

        match filename {
            // browsers send an empty filename for an empty file input
            Some(filename) if filename.is_empty() => continue,
            Some(filename) => {
                let part = state.staging.stage_field(&filename, field).await?;
                batch.parts.push(part);
            }
            None if name == SUB_FOLDER_FIELD => {
                batch.sub_folder = field.text().await?;
            }
            None => continue,
        }
    }

    Ok(())
}
