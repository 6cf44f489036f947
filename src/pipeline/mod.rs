// upload & merge pipeline: duplicate filter -> destination resolver -> chunk merger

pub mod dedup;
pub mod locks;
pub mod merge;
pub mod resolver;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
pub use dedup::{partition, Partition};
pub use locks::{DestinationGuard, DestinationLocks};
pub use merge::{merge_chunks, MergeError};
pub use resolver::{MediaKind, ResolveError};

/// one staged file fragment received in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// client-supplied file name; dedup key and final name
    pub original_name: String,
    /// where the staged bytes live until merged or discarded
    pub temp_path: PathBuf,
    /// bytes staged (informational)
    pub size: u64,
}

/// every file part of one request plus its `subFolder` field.
/// part order is the multipart field order the client sent.
#[derive(Debug, Clone, Default)]
pub struct RequestBatch {
    pub parts: Vec<UploadedPart>,
    pub sub_folder: String,
}

/// what happened to a batch that made it past validation
#[derive(Debug)]
pub enum MergeOutcome {
    Merged {
        destination: PathBuf,
        /// accepted parts as they were before merging
        parts: Vec<UploadedPart>,
        bytes_written: u64,
    },
    Rejected {
        duplicates: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no files in request")]
    NoFiles,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// run one request's batch through the pipeline.
///
/// All accepted parts are concatenated, in arrival order, into
/// `<resolved dir of first part>/<first part's name>`. Any repeated name
/// rejects the whole batch. On rejection or failure no staged part of the
/// batch is left behind when `upload.cleanup_rejected` is set.
pub async fn process_batch(
    config: &AppConfig,
    locks: &DestinationLocks,
    batch: RequestBatch,
) -> Result<MergeOutcome, PipelineError> {
    if batch.parts.is_empty() {
        return Err(PipelineError::NoFiles);
    }

    let split = partition(batch.parts).await;

    if split.has_duplicates() {
        warn!("rejecting batch with duplicate names: {:?}", split.duplicates);
        if config.upload.cleanup_rejected {
            dedup::discard_all(&split.accepted).await;
        }
        return Ok(MergeOutcome::Rejected {
            duplicates: split.duplicates,
        });
    }

    let accepted = split.accepted;

    let result = merge_accepted(config, locks, &batch.sub_folder, &accepted).await;

    match result {
        Ok((destination, bytes_written)) => {
            info!(
                "merged {} part(s) into {} ({} bytes)",
                accepted.len(),
                destination.display(),
                bytes_written
            );
            Ok(MergeOutcome::Merged {
                destination,
                parts: accepted,
                bytes_written,
            })
        }
        Err(err) => {
            if config.upload.cleanup_rejected {
                dedup::discard_all(&accepted).await;
            }
            Err(err)
        }
    }
}

async fn merge_accepted(
    config: &AppConfig,
    locks: &DestinationLocks,
    sub_folder: &str,
    accepted: &[UploadedPart],
) -> Result<(PathBuf, u64), PipelineError> {
    let first = accepted.first().ok_or(PipelineError::NoFiles)?;

    let dir = resolver::resolve(
        config.upload_dir(),
        &config.staging_dir(),
        sub_folder,
        &first.original_name,
    )
    .await?;
    let destination = dir.join(&first.original_name);

    let sources: Vec<PathBuf> = accepted.iter().map(|p| p.temp_path.clone()).collect();

    let _guard = locks.lock(&destination).await;
    let written = merge_chunks(&sources, &destination, config.upload.merge_strategy).await?;

    Ok((destination, written))
}
