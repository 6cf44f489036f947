// destination directory resolution by file extension

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::utils::paths::{join_path_jailed, PathTraversalError};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv"];

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid sub folder: {0}")]
    InvalidSubFolder(#[source] PathTraversalError),
    #[error("upload base directory is missing or unreadable: {}", .0.display())]
    MissingBase(PathBuf),
    #[error("failed to inspect {}: {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// media class that decides which classification folder a file lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    /// classify by extension, case-insensitively
    pub fn from_file_name(file_name: &str) -> Self {
        let Some(ext) = Path::new(file_name).extension().and_then(|ext| ext.to_str()) else {
            return MediaKind::Other;
        };
        let ext = ext.to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn folder(self) -> Option<&'static str> {
        match self {
            MediaKind::Image => Some("image"),
            MediaKind::Video => Some("video"),
            MediaKind::Other => None,
        }
    }
}

/// compute `<base>/<sub_folder>[/image|/video]` without touching the filesystem
/// beyond the jail check
pub fn destination_dir(
    base_dir: &Path,
    sub_folder: &str,
    file_name: &str,
) -> Result<PathBuf, PathTraversalError> {
    let dir = join_path_jailed(base_dir, sub_folder)?;

    Ok(match MediaKind::from_file_name(file_name).folder() {
        Some(folder) => dir.join(folder),
        None => dir,
    })
}

/// resolve the destination directory for `file_name` and make sure it exists.
/// nothing may resolve into `staging_dir`, which the server purges on its own.
pub async fn resolve(
    base_dir: &Path,
    staging_dir: &Path,
    sub_folder: &str,
    file_name: &str,
) -> Result<PathBuf, ResolveError> {
    let dir = destination_dir(base_dir, sub_folder, file_name).map_err(|err| match err {
        PathTraversalError::InvalidBasePath => ResolveError::MissingBase(base_dir.to_path_buf()),
        PathTraversalError::Unresolvable { path, source } => ResolveError::Inspect { path, source },
        other => ResolveError::InvalidSubFolder(other),
    })?;

    match fs::canonicalize(staging_dir).await {
        Ok(staging) if dir.starts_with(&staging) => {
            return Err(ResolveError::InvalidSubFolder(PathTraversalError::Reserved(
                sub_folder.to_string(),
            )));
        }
        Ok(_) => {}
        // nothing staged yet, so nothing to collide with
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ResolveError::Inspect {
                path: staging_dir.to_path_buf(),
                source,
            });
        }
    }

    fs::create_dir_all(&dir)
        .await
        .map_err(|source| ResolveError::CreateDir {
            path: dir.clone(),
            source,
        })?;

    debug!("resolved destination dir {} for {}", dir.display(), file_name);
    Ok(dir)
}
