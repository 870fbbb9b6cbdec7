/// Import pipeline
///
/// Discovers the image files of a folder and runs each one through
/// EXIF -> dimensions -> thumbnail -> persist. Items are processed strictly
/// one after another; a failing stage drops that item only. The photos that
/// made it are appended to the store in one batch at the end.
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GatewayResult, Result, ValidationError};
use crate::gateway::{BackendGateway, NewPhotoRecord, ScannedFile};
use crate::state::data::{Photo, PhotoId};
use crate::state::metadata::TagList;
use crate::state::store::EntityStore;

/// The user-facing "pick a folder" step
pub trait FolderSelector {
    /// `None` when the user picked nothing
    fn select_folder(&self) -> Option<PathBuf>;
}

/// Selector that always answers with the same folder (or nothing)
#[derive(Debug, Clone, Default)]
pub struct FixedFolder(pub Option<PathBuf>);

impl FixedFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl FolderSelector for FixedFolder {
    fn select_folder(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// Reported once per item, before its first stage runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
    /// 1-based position in discovery order
    pub current: usize,
    pub total: usize,
    pub current_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Exif,
    Dimensions,
    Thumbnail,
    Persist,
    /// Adding the persisted photo to the store
    Register,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Exif => f.write_str("exif"),
            ImportStage::Dimensions => f.write_str("dimensions"),
            ImportStage::Thumbnail => f.write_str("thumbnail"),
            ImportStage::Persist => f.write_str("persist"),
            ImportStage::Register => f.write_str("register"),
        }
    }
}

/// An item dropped from the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub path: PathBuf,
    pub filename: String,
    pub stage: ImportStage,
    pub reason: String,
}

/// Outcome of one pipeline run
///
/// A run that imported fewer items than it discovered is still a success;
/// `is_partial` tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub imported: Vec<PhotoId>,
    pub failed: Vec<FailedItem>,
}

impl ImportReport {
    pub fn count(&self) -> usize {
        self.imported.len()
    }

    pub fn success(&self) -> bool {
        true
    }

    pub fn is_partial(&self) -> bool {
        self.count() < self.total
    }
}

pub struct ImportPipeline {
    gateway: Arc<dyn BackendGateway>,
    store: Arc<EntityStore>,
}

/// Attach the stage a gateway failure happened in
trait StageExt<T> {
    fn stage(self, stage: ImportStage) -> std::result::Result<T, (ImportStage, String)>;
}

impl<T> StageExt<T> for GatewayResult<T> {
    fn stage(self, stage: ImportStage) -> std::result::Result<T, (ImportStage, String)> {
        self.map_err(|err| (stage, err.to_string()))
    }
}

impl ImportPipeline {
    pub fn new(gateway: Arc<dyn BackendGateway>, store: Arc<EntityStore>) -> Self {
        Self { gateway, store }
    }

    /// Ask the selector for a folder and import it
    pub async fn load_folder<S, P>(&self, selector: &S, on_progress: P) -> Result<ImportReport>
    where
        S: FolderSelector + ?Sized,
        P: FnMut(&ImportProgress),
    {
        self.gateway.initialize().await?;

        let folder = selector
            .select_folder()
            .ok_or(ValidationError::NoSelection)?;

        self.run(&folder, on_progress).await
    }

    /// Import a folder that was already chosen
    pub async fn import_path<P>(&self, folder: &Path, on_progress: P) -> Result<ImportReport>
    where
        P: FnMut(&ImportProgress),
    {
        self.gateway.initialize().await?;
        self.run(folder, on_progress).await
    }

    async fn run<P>(&self, folder: &Path, mut on_progress: P) -> Result<ImportReport>
    where
        P: FnMut(&ImportProgress),
    {
        tracing::info!("📁 Scanning folder: {}", folder.display());
        let files = self.gateway.scan_directory(folder).await?;
        let total = files.len();

        let mut report = ImportReport {
            total,
            ..ImportReport::default()
        };
        if total == 0 {
            tracing::info!("No images found in {}", folder.display());
            return Ok(report);
        }

        tracing::info!("📸 Found {} images", total);

        let mut photos = Vec::with_capacity(total);
        for (index, file) in files.into_iter().enumerate() {
            on_progress(&ImportProgress {
                current: index + 1,
                total,
                current_file: file.filename.clone(),
            });

            match self.process(&file).await {
                Ok(photo) => photos.push(photo),
                Err((stage, reason)) => {
                    tracing::warn!(
                        "⚠️  Failed to import {} at {} stage: {}",
                        file.filename,
                        stage,
                        reason
                    );
                    report.failed.push(FailedItem {
                        path: file.path,
                        filename: file.filename,
                        stage,
                        reason,
                    });
                }
            }
        }

        let photos = self.admit(photos, &mut report);
        report.imported = photos.iter().map(|photo| photo.id).collect();
        self.store.photos().insert_many(photos)?;

        tracing::info!(
            "✅ Imported {} of {} images ({} failed)",
            report.count(),
            total,
            report.failed.len()
        );
        Ok(report)
    }

    /// Drop photos whose id is already in the store or earlier in the batch,
    /// so the bulk insert cannot be refused as a whole
    fn admit(&self, photos: Vec<Photo>, report: &mut ImportReport) -> Vec<Photo> {
        let mut seen = HashSet::new();
        let mut admitted = Vec::with_capacity(photos.len());

        for photo in photos {
            if self.store.photos().contains(photo.id) || !seen.insert(photo.id) {
                tracing::warn!(
                    "⚠️  Not adding {}: id {} is already in the catalog cache",
                    photo.filename,
                    photo.id
                );
                report.failed.push(FailedItem {
                    path: PathBuf::from(&photo.path),
                    filename: photo.filename,
                    stage: ImportStage::Register,
                    reason: format!("duplicate photo id {}", photo.id),
                });
                continue;
            }
            admitted.push(photo);
        }

        admitted
    }

    /// Run one file through every stage; nothing is persisted unless all
    /// earlier stages succeeded
    async fn process(&self, file: &ScannedFile) -> std::result::Result<Photo, (ImportStage, String)> {
        let exif = self
            .gateway
            .extract_exif(&file.path)
            .await
            .stage(ImportStage::Exif)?;

        let dimensions = self
            .gateway
            .probe_dimensions(&file.path)
            .await
            .stage(ImportStage::Dimensions)?;

        let thumbnail = self
            .gateway
            .derive_thumbnail(&file.path)
            .await
            .stage(ImportStage::Thumbnail)?;

        let record = NewPhotoRecord {
            path: file.path.to_string_lossy().to_string(),
            filename: file.filename.clone(),
            file_size: file.file_size,
            width: dimensions.width,
            height: dimensions.height,
            exif,
            added_at: Utc::now(),
            rating: None,
            favorite: false,
            tags: TagList::new(),
            description: None,
            thumbnail_path: Some(thumbnail.path),
        };

        let id = self
            .gateway
            .insert_photo(&record)
            .await
            .stage(ImportStage::Persist)?;

        Ok(Photo::from(record.with_id(id)))
    }

    /// Replace the store's photos with everything the backend holds
    pub async fn reload_photos(&self) -> Result<usize> {
        let records = self.gateway.fetch_photos().await?;
        let photos: Vec<Photo> = records.into_iter().map(Photo::from).collect();
        let count = photos.len();

        self.store.photos().replace_all(photos)?;
        tracing::info!("Loaded {} photos from catalog", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::gateway::mock::{MockGateway, Op};
    use crate::state::data::ExifData;
    use chrono::NaiveDate;

    fn pipeline(gateway: &Arc<MockGateway>) -> (Arc<EntityStore>, ImportPipeline) {
        let store = Arc::new(EntityStore::default());
        let pipeline = ImportPipeline::new(gateway.clone(), store.clone());
        (store, pipeline)
    }

    fn filenames(store: &EntityStore) -> Vec<String> {
        store
            .photos()
            .snapshot()
            .into_iter()
            .map(|p| p.filename)
            .collect()
    }

    #[tokio::test]
    async fn test_item_failure_is_isolated() {
        let gateway = Arc::new(MockGateway::new().with_files(&["one.jpg", "two.jpg", "three.jpg"]));
        gateway.fail_for(Op::Exif, "two.jpg");
        let (store, pipeline) = pipeline(&gateway);

        let mut progress = Vec::new();
        let report = pipeline
            .load_folder(&FixedFolder::new("/import"), |p| progress.push(p.clone()))
            .await
            .unwrap();

        assert!(report.success());
        assert_eq!(report.count(), 2);
        assert!(report.is_partial());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "two.jpg");
        assert_eq!(report.failed[0].stage, ImportStage::Exif);

        assert_eq!(filenames(&store), vec!["one.jpg", "three.jpg"]);

        let seen: Vec<(usize, usize, &str)> = progress
            .iter()
            .map(|p| (p.current, p.total, p.current_file.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![(1, 3, "one.jpg"), (2, 3, "two.jpg"), (3, 3, "three.jpg")]
        );

        // The failed item never reached later stages
        assert_eq!(gateway.calls(Op::Dimensions), 2);
        assert_eq!(gateway.calls(Op::InsertPhoto), 2);
    }

    #[tokio::test]
    async fn test_failure_at_any_stage_drops_item() {
        let gateway = Arc::new(MockGateway::new().with_files(&[
            "a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg",
        ]));
        gateway.fail_for(Op::Dimensions, "b.jpg");
        gateway.fail_for(Op::Thumbnail, "c.jpg");
        gateway.fail_for(Op::InsertPhoto, "e.jpg");
        let (store, pipeline) = pipeline(&gateway);

        let mut calls = 0;
        let report = pipeline
            .load_folder(&FixedFolder::new("/import"), |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(calls, 5);
        assert_eq!(report.count(), 2);
        assert_eq!(filenames(&store), vec!["a.jpg", "d.jpg"]);
        let stages: Vec<ImportStage> = report.failed.iter().map(|f| f.stage).collect();
        assert_eq!(
            stages,
            vec![ImportStage::Dimensions, ImportStage::Thumbnail, ImportStage::Persist]
        );
        assert_eq!(gateway.persisted_photos().len(), 2);
    }

    #[tokio::test]
    async fn test_id_already_in_store_is_reported_not_fatal() {
        let gateway = Arc::new(MockGateway::new().with_files(&["a.jpg", "b.jpg", "c.jpg"]));
        let (store, pipeline) = pipeline(&gateway);

        // The mock assigns ids 1, 2, 3; id 2 is taken already
        let mut existing = Photo::from(
            NewPhotoRecord {
                path: "/elsewhere/old.jpg".into(),
                filename: "old.jpg".into(),
                file_size: 1,
                width: 1,
                height: 1,
                exif: ExifData::default(),
                added_at: Utc::now(),
                rating: None,
                favorite: false,
                tags: TagList::new(),
                description: None,
                thumbnail_path: None,
            }
            .with_id(PhotoId(2)),
        );
        existing.metadata.favorite = true;
        store.photos().insert_many(vec![existing.clone()]).unwrap();

        let report = pipeline
            .import_path(Path::new("/import"), |_| {})
            .await
            .unwrap();

        assert!(report.success());
        assert_eq!(report.total, 3);
        assert_eq!(report.imported, vec![PhotoId(1), PhotoId(3)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "b.jpg");
        assert_eq!(report.failed[0].stage, ImportStage::Register);

        assert_eq!(filenames(&store), vec!["old.jpg", "a.jpg", "c.jpg"]);
        assert_eq!(store.photo(PhotoId(2)).unwrap(), existing);
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let gateway = Arc::new(MockGateway::new());
        let (store, pipeline) = pipeline(&gateway);
        let mut events = store.subscribe();

        let mut calls = 0;
        let report = pipeline
            .load_folder(&FixedFolder::new("/import"), |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(report.count(), 0);
        assert!(report.success());
        assert!(!report.is_partial());
        assert_eq!(calls, 0);
        assert!(store.photos().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_selection_is_distinct_from_empty() {
        let gateway = Arc::new(MockGateway::new().with_files(&["a.jpg"]));
        let (store, pipeline) = pipeline(&gateway);

        let err = pipeline
            .load_folder(&FixedFolder::none(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::NoSelection)
        ));
        assert_eq!(gateway.calls(Op::Scan), 0);
        assert!(store.photos().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failures_abort_run() {
        let gateway = Arc::new(MockGateway::new().with_files(&["a.jpg"]));
        let (store, pipeline) = pipeline(&gateway);

        gateway.fail(Op::Initialize);
        assert!(pipeline
            .load_folder(&FixedFolder::new("/import"), |_| {})
            .await
            .unwrap_err()
            .is_backend());

        gateway.heal();
        gateway.fail(Op::Scan);
        assert!(pipeline
            .import_path(Path::new("/import"), |_| {})
            .await
            .unwrap_err()
            .is_backend());
        assert!(store.photos().is_empty());
    }

    #[tokio::test]
    async fn test_imported_photo_fields() {
        let gateway = Arc::new(MockGateway::new().with_files(&["DSC_0001.NEF"]));
        let capture = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(19, 30, 0)
            .unwrap();
        gateway.set_exif(
            "DSC_0001.NEF",
            ExifData {
                capture_date: Some(capture),
                camera_model: Some("NIKON Z 6".into()),
                iso: Some(400),
                ..ExifData::default()
            },
        );
        let (store, pipeline) = pipeline(&gateway);

        let report = pipeline
            .import_path(Path::new("/import"), |_| {})
            .await
            .unwrap();

        let photo = store.photo(report.imported[0]).unwrap();
        assert_eq!(photo.filename, "DSC_0001.NEF");
        assert_eq!(photo.path, "/import/DSC_0001.NEF");
        assert_eq!((photo.width, photo.height), (6000, 4000));
        assert_eq!(photo.thumbnail.as_deref(), Some("/cache/DSC_0001.NEF.jpg"));
        assert_eq!(photo.capture_date(), Some(capture));
        assert!(photo.metadata.is_untouched());
    }

    #[tokio::test]
    async fn test_reload_replaces_store() {
        let gateway = Arc::new(MockGateway::new().with_files(&["a.jpg", "b.jpg"]));
        let (store, pipeline) = pipeline(&gateway);
        pipeline
            .import_path(Path::new("/import"), |_| {})
            .await
            .unwrap();

        store.photos().clear();
        assert_eq!(pipeline.reload_photos().await.unwrap(), 2);
        assert_eq!(filenames(&store), vec!["a.jpg", "b.jpg"]);

        gateway.fail(Op::FetchPhotos);
        assert!(pipeline.reload_photos().await.is_err());
        assert_eq!(store.photos().len(), 2);
    }
}
