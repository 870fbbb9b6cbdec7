/// Recursive discovery of candidate image files
use std::path::Path;
use walkdir::WalkDir;

use super::extension_of;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ScannedFile;

/// Walk `root` and return every file whose extension is in `extensions`
///
/// Results are sorted by path so repeated scans of an unchanged folder
/// yield the same order. Unreadable entries are skipped with a warning.
pub fn scan_images(
    root: &Path,
    extensions: &[String],
    follow_links: bool,
) -> GatewayResult<Vec<ScannedFile>> {
    if !root.exists() {
        return Err(GatewayError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(GatewayError::NotADirectory(root.to_path_buf()));
    }

    tracing::info!("🔍 Scanning folder: {}", root.display());

    let mut images = Vec::new();

    // Walk the directory tree recursively
    for entry in WalkDir::new(root).follow_links(follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
                continue;
            }
        };

        // Only process files (not directories)
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let supported = extension_of(path)
            .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)));
        if !supported {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Failed to read metadata for {}: {}", path.display(), e);
                continue;
            }
        };

        images.push(ScannedFile {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            file_size: metadata.len(),
        });
    }

    images.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!("Found {} images in {}", images.len(), root.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::default_extensions;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.JPG"), b"b").unwrap();
        fs::write(dir.path().join("a.png"), b"aa").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        fs::write(dir.path().join("nested").join("c.nef"), b"ccc").unwrap();

        let found = scan_images(dir.path(), &default_extensions(), true).unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.filename.as_str()).collect();

        assert_eq!(names, vec!["a.png", "b.JPG", "c.nef"]);
        assert_eq!(found[0].file_size, 2);
        assert_eq!(found[2].file_size, 3);
    }

    #[test]
    fn test_scan_rejects_missing_and_file_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.jpg");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            scan_images(&dir.path().join("missing"), &default_extensions(), true),
            Err(GatewayError::PathNotFound(_))
        ));
        assert!(matches!(
            scan_images(&file, &default_extensions(), true),
            Err(GatewayError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_empty_folder_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_images(dir.path(), &default_extensions(), true)
            .unwrap()
            .is_empty());
    }
}
