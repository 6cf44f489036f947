// name-based duplicate detection within one request

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use super::UploadedPart;

/// result of scanning one batch
#[derive(Debug, Default)]
pub struct Partition {
    /// first occurrence of every name, in arrival order
    pub accepted: Vec<UploadedPart>,
    /// each repeated name once, in order of first repetition
    pub duplicates: Vec<String>,
}

impl Partition {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// split parts into first-seen uniques and repeated names.
/// staged bytes of every repeated part are deleted right away.
pub async fn partition(parts: Vec<UploadedPart>) -> Partition {
    let mut seen = HashSet::new();
    let mut result = Partition::default();

    for part in parts {
        if seen.contains(&part.original_name) {
            debug!(
                "duplicate part {} staged at {}",
                part.original_name,
                part.temp_path.display()
            );
            discard(&part.temp_path).await;
            if !result.duplicates.contains(&part.original_name) {
                result.duplicates.push(part.original_name);
            }
        } else {
            seen.insert(part.original_name.clone());
            result.accepted.push(part);
        }
    }

    result
}

/// remove staged parts that will never be merged
pub async fn discard_all(parts: &[UploadedPart]) {
    for part in parts {
        discard(&part.temp_path).await;
    }
}

pub(crate) async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove staged part {}: {}", path.display(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staged(dir: &Path, file: &str, name: &str, content: &str) -> UploadedPart {
        let temp_path = dir.join(file);
        std::fs::write(&temp_path, content).unwrap();
        UploadedPart {
            original_name: name.to_string(),
            temp_path,
            size: content.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_repeated_name_is_reported_once_and_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path_a = temp_dir.path().join("a.part");
        let path_b = temp_dir.path().join("b.part");
        let path_c = temp_dir.path().join("c.part");

        let parts = vec![
            staged(temp_dir.path(), "a.part", "x.txt", "one"),
            staged(temp_dir.path(), "b.part", "x.txt", "two"),
            staged(temp_dir.path(), "c.part", "x.txt", "three"),
        ];

        let result = partition(parts).await;

        assert_eq!(result.duplicates, vec!["x.txt".to_string()]);
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.accepted[0].temp_path, path_a);
        assert!(path_a.exists());
        assert!(!path_b.exists());
        assert!(!path_c.exists());
    }

    #[tokio::test]
    async fn test_unique_names_keep_arrival_order() {
        let temp_dir = TempDir::new().unwrap();
        let parts = vec![
            staged(temp_dir.path(), "1.part", "c.bin", "C"),
            staged(temp_dir.path(), "2.part", "a.bin", "A"),
            staged(temp_dir.path(), "3.part", "b.bin", "B"),
        ];

        let result = partition(parts).await;

        assert!(!result.has_duplicates());
        let names: Vec<_> = result
            .accepted
            .iter()
            .map(|p| p.original_name.as_str())
            .collect();
        assert_eq!(names, ["c.bin", "a.bin", "b.bin"]);
    }

    #[tokio::test]
    async fn test_names_compare_exactly() {
        let temp_dir = TempDir::new().unwrap();
        let parts = vec![
            staged(temp_dir.path(), "1.part", "Photo.png", "1"),
            staged(temp_dir.path(), "2.part", "photo.png", "2"),
        ];

        let result = partition(parts).await;
        assert!(!result.has_duplicates());
        assert_eq!(result.accepted.len(), 2);
    }

    #[tokio::test]
    async fn test_discard_all_tolerates_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let present = staged(temp_dir.path(), "1.part", "a", "data");
        let missing = UploadedPart {
            original_name: "b".to_string(),
            temp_path: temp_dir.path().join("gone.part"),
            size: 0,
        };

        discard_all(&[present.clone(), missing]).await;
        assert!(!present.temp_path.exists());
    }
}
