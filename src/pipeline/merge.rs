// sequential chunk concatenation

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MergeStrategy;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no chunks to merge")]
    EmptyInput,
    #[error("failed to open destination {}: {source}", .path.display())]
    OpenDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read chunk {}: {source}", .path.display())]
    ReadChunk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write destination {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove consumed chunk {}: {source}", .path.display())]
    RemoveChunk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move merged file into place at {}: {source}", .path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// append every chunk in `sources`, in order, onto `destination`.
///
/// Chunk `i` is fully written and deleted before chunk `i + 1` is opened.
/// An existing destination is extended, never truncated. With
/// [`MergeStrategy::Atomic`] the result is assembled next to the destination
/// and renamed over it only after the last chunk, so a failure leaves the
/// destination untouched; [`MergeStrategy::InPlace`] leaves whatever was
/// appended before the failure.
///
/// Returns the number of chunk bytes appended.
pub async fn merge_chunks(
    sources: &[PathBuf],
    destination: &Path,
    strategy: MergeStrategy,
) -> Result<u64, MergeError> {
    if sources.is_empty() {
        return Err(MergeError::EmptyInput);
    }

    debug!(
        "merging {} chunk(s) into {} ({:?})",
        sources.len(),
        destination.display(),
        strategy
    );

    match strategy {
        MergeStrategy::InPlace => {
            let mut writer = open_for_append(destination).await?;
            append_all(sources, &mut writer, destination).await
        }
        MergeStrategy::Atomic => {
            let temp_path = temp_path_for_target(destination);
            let result = merge_via_temp(sources, destination, &temp_path).await;
            if result.is_err() {
                let _ = fs::remove_file(&temp_path).await;
            }
            result
        }
    }
}

async fn merge_via_temp(
    sources: &[PathBuf],
    destination: &Path,
    temp_path: &Path,
) -> Result<u64, MergeError> {
    // seed with the current destination so re-uploads still append
    match fs::copy(destination, temp_path).await {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(MergeError::OpenDestination {
                path: destination.to_path_buf(),
                source,
            })
        }
    }

    let mut writer = open_for_append(temp_path).await?;
    let written = append_all(sources, &mut writer, temp_path).await?;

    writer
        .sync_all()
        .await
        .map_err(|source| MergeError::Write {
            path: temp_path.to_path_buf(),
            source,
        })?;
    drop(writer);

    fs::rename(temp_path, destination)
        .await
        .map_err(|source| MergeError::Commit {
            path: destination.to_path_buf(),
            source,
        })?;

    Ok(written)
}

async fn open_for_append(path: &Path) -> Result<File, MergeError> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .map_err(|source| MergeError::OpenDestination {
            path: path.to_path_buf(),
            source,
        })
}

async fn append_all(
    sources: &[PathBuf],
    writer: &mut File,
    writer_path: &Path,
) -> Result<u64, MergeError> {
    let mut total = 0u64;

    for source_path in sources {
        let copied = append_chunk(source_path, writer, writer_path).await?;

        fs::remove_file(source_path)
            .await
            .map_err(|source| MergeError::RemoveChunk {
                path: source_path.clone(),
                source,
            })?;

        debug!("appended {} bytes from {}", copied, source_path.display());
        total += copied;
    }

    writer.flush().await.map_err(|source| MergeError::Write {
        path: writer_path.to_path_buf(),
        source,
    })?;

    Ok(total)
}

async fn append_chunk(
    source_path: &Path,
    writer: &mut File,
    writer_path: &Path,
) -> Result<u64, MergeError> {
    let read_error = |source| MergeError::ReadChunk {
        path: source_path.to_path_buf(),
        source,
    };
    let write_error = |source| MergeError::Write {
        path: writer_path.to_path_buf(),
        source,
    };

    let mut reader = File::open(source_path).await.map_err(read_error)?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = reader.read(&mut buffer).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await.map_err(write_error)?;
        copied += n as u64;
    }

    writer.flush().await.map_err(write_error)?;
    Ok(copied)
}

fn temp_path_for_target(target_path: &Path) -> PathBuf {
    let mut file_name = OsString::from(".");
    match target_path.file_name() {
        Some(name) => file_name.push(name),
        None => {
            warn!("merge target has no file name: {}", target_path.display());
            file_name.push("merge");
        }
    }
    file_name.push(format!(".{}.merging", Uuid::new_v4().simple()));
    target_path.with_file_name(file_name)
}
