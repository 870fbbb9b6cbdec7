/// Batch export of catalog photos
///
/// Each photo is exported independently; a failure is recorded and the
/// batch moves on.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result, ValidationError};
use crate::gateway::{BackendGateway, ExportRequest};
use crate::state::data::{EntityKind, Photo, PhotoId};
use crate::state::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Keep the source file's extension
    #[default]
    Original,
    Jpeg,
    Png,
    WebP,
}

impl ExportFormat {
    fn extension(self) -> Option<&'static str> {
        match self {
            ExportFormat::Original => None,
            ExportFormat::Jpeg => Some("jpg"),
            ExportFormat::Png => Some("png"),
            ExportFormat::WebP => Some("webp"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub preserve_exif: bool,
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported_count: usize,
    /// Source paths (or ids, for photos not in the store) that failed
    pub failed_paths: Vec<String>,
}

fn destination_for(photo: &Photo, dir: &Path, format: ExportFormat) -> PathBuf {
    let name = Path::new(&photo.filename);
    match format.extension() {
        Some(ext) => dir.join(name.with_extension(ext)),
        None => dir.join(name),
    }
}

/// Suffix the file stem (`name_1.jpg`, `name_2.jpg`, ...) until the path is
/// not yet used by this batch, then claim it
fn claim_destination(path: PathBuf, taken: &mut HashSet<PathBuf>) -> PathBuf {
    if taken.insert(path.clone()) {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = path.with_file_name(name);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

pub async fn export_photos(
    gateway: &dyn BackendGateway,
    store: &EntityStore,
    photo_ids: &[PhotoId],
    destination: &Path,
    options: &ExportOptions,
) -> Result<ExportReport> {
    if !destination.is_dir() {
        return Err(ValidationError::InvalidDestination(destination.to_path_buf()).into());
    }

    let mut report = ExportReport::default();
    let mut taken = HashSet::new();

    for &id in photo_ids {
        let Some(photo) = store.photo(id) else {
            tracing::warn!("{}", CatalogError::not_found(EntityKind::Photo, id));
            report.failed_paths.push(id.to_string());
            continue;
        };

        let request = ExportRequest {
            source: PathBuf::from(&photo.path),
            destination: claim_destination(
                destination_for(&photo, destination, options.format),
                &mut taken,
            ),
            width: options.width,
            height: options.height,
            preserve_exif: options.preserve_exif,
        };

        match gateway.export_image(&request).await {
            Ok(()) => report.exported_count += 1,
            Err(err) => {
                tracing::warn!("Failed to export {}: {}", photo.path, err);
                report.failed_paths.push(photo.path);
            }
        }
    }

    tracing::info!(
        "💾 Exported {} of {} photos to {}",
        report.exported_count,
        photo_ids.len(),
        destination.display()
    );
    Ok(report)
}
