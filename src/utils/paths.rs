// path operations and security functions

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathTraversalError {
    #[error("invalid base path")]
    InvalidBasePath,

    #[error("absolute path not allowed: {0}")]
    AbsolutePath(String),

    #[error("path escapes base directory: {0}")]
    EscapesBase(String),

    #[error("path outside jail: base={base:?}, target={target:?}")]
    OutsideJail { base: PathBuf, target: PathBuf },

    #[error("windows prefix not allowed")]
    WindowsPrefix,

    #[error("path is reserved for internal use: {0}")]
    Reserved(String),

    #[error("cannot resolve {}: {source}", .path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// join a caller-supplied relative fragment onto `base_dir`, refusing anything
/// that would land outside it (`..` escapes, absolute paths, symlinks pointing out)
pub fn join_path_jailed(base_dir: &Path, fragment: &str) -> Result<PathBuf, PathTraversalError> {
    let relative = normalize_fragment(fragment)?;

    let canonical_base = base_dir
        .canonicalize()
        .map_err(|_| PathTraversalError::InvalidBasePath)?;

    let joined = canonical_base.join(relative);

    // the target may not exist yet; resolve symlinks on whatever prefix does
    let resolved = canonicalize_existing_prefix(&joined).map_err(|source| {
        PathTraversalError::Unresolvable {
            path: joined.clone(),
            source,
        }
    })?;

    if !resolved.starts_with(&canonical_base) {
        return Err(PathTraversalError::OutsideJail {
            base: canonical_base,
            target: resolved,
        });
    }

    Ok(resolved)
}

/// lexically normalize a fragment into a relative path with no `..` or root
fn normalize_fragment(fragment: &str) -> Result<PathBuf, PathTraversalError> {
    let mut normalized = PathBuf::new();

    for component in Path::new(fragment).components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(PathTraversalError::EscapesBase(fragment.to_string()));
                }
            }
            Component::RootDir => {
                return Err(PathTraversalError::AbsolutePath(fragment.to_string()));
            }
            Component::Prefix(_) => return Err(PathTraversalError::WindowsPrefix),
        }
    }

    Ok(normalized)
}

fn canonicalize_existing_prefix(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for name in missing.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(err),
                }
            }
            Err(err) => return Err(err),
        }
    }
}
