/// Local backend gateway
///
/// Persists to the SQLite catalog and performs media work on the local
/// filesystem. `rusqlite::Connection` is not `Sync`, so the one connection
/// sits behind a mutex and every call runs on tokio's blocking pool.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{
    BackendGateway, CollectionRecord, Dimensions, ExportRequest, NewPhotoRecord, PhotoRecord,
    ScannedFile, Thumbnail,
};
use crate::config::CatalogConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::media;
use crate::state::data::{CollectionId, ExifData, PhotoId};
use crate::state::library::Library;
use crate::state::metadata::PhotoPatch;

pub struct LocalGateway {
    library: Arc<Mutex<Option<Library>>>,
    config: Arc<CatalogConfig>,
}

/// Run blocking work off the async executor
async fn blocking<T, F>(work: F) -> GatewayResult<T>
where
    F: FnOnce() -> GatewayResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

impl LocalGateway {
    /// Create a gateway; the catalog is opened by `initialize`
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            library: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
        }
    }

    /// Create a gateway around an already opened catalog
    pub fn with_library(library: Library, config: CatalogConfig) -> Self {
        Self {
            library: Arc::new(Mutex::new(Some(library))),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Run a closure against the open catalog
    async fn on_library<T, F>(&self, work: F) -> GatewayResult<T>
    where
        F: FnOnce(&Library) -> GatewayResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let library = Arc::clone(&self.library);
        blocking(move || {
            let guard = library.lock().unwrap_or_else(PoisonError::into_inner);
            let library = guard
                .as_ref()
                .ok_or_else(|| GatewayError::Rejected("database not initialized".into()))?;
            work(library)
        })
        .await
    }

    /// Pretty JSON dump of the catalog
    pub async fn export_backup(&self) -> GatewayResult<String> {
        self.on_library(|library| library.export_json()).await
    }
}

#[async_trait]
impl BackendGateway for LocalGateway {
    async fn initialize(&self) -> GatewayResult<()> {
        let library = Arc::clone(&self.library);
        let db_path = self.config.database_path.clone();

        blocking(move || {
            let mut guard = library.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_none() {
                *guard = Some(Library::open(&db_path)?);
            }
            Ok(())
        })
        .await
    }

    async fn insert_photo(&self, record: &NewPhotoRecord) -> GatewayResult<PhotoId> {
        let record = record.clone();
        self.on_library(move |library| library.insert_photo(&record)).await
    }

    async fn fetch_photos(&self) -> GatewayResult<Vec<PhotoRecord>> {
        self.on_library(|library| library.get_all_photos()).await
    }

    async fn update_metadata(&self, id: PhotoId, patch: &PhotoPatch) -> GatewayResult<()> {
        let patch = patch.clone();
        self.on_library(move |library| library.update_metadata(id, &patch))
            .await
    }

    async fn create_collection(&self, name: &str) -> GatewayResult<CollectionRecord> {
        let name = name.to_string();
        self.on_library(move |library| library.create_collection(&name))
            .await
    }

    async fn list_collections(&self) -> GatewayResult<Vec<CollectionRecord>> {
        self.on_library(|library| library.get_all_collections()).await
    }

    async fn delete_collection(&self, id: CollectionId) -> GatewayResult<()> {
        self.on_library(move |library| library.delete_collection(id))
            .await
    }

    async fn add_to_collection(&self, collection: CollectionId, photo: PhotoId) -> GatewayResult<()> {
        self.on_library(move |library| library.add_photo_to_collection(photo, collection))
            .await
    }

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        photo: PhotoId,
    ) -> GatewayResult<()> {
        self.on_library(move |library| library.remove_photo_from_collection(photo, collection))
            .await
    }

    async fn photos_in_collection(&self, collection: CollectionId) -> GatewayResult<Vec<PhotoRecord>> {
        self.on_library(move |library| library.get_photos_in_collection(collection))
            .await
    }

    async fn scan_directory(&self, path: &Path) -> GatewayResult<Vec<ScannedFile>> {
        let root = path.to_path_buf();
        let config = Arc::clone(&self.config);
        blocking(move || media::scan::scan_images(&root, &config.extensions, config.follow_links))
            .await
    }

    async fn extract_exif(&self, path: &Path) -> GatewayResult<ExifData> {
        let path = path.to_path_buf();
        blocking(move || media::exif::extract_exif(&path)).await
    }

    async fn probe_dimensions(&self, path: &Path) -> GatewayResult<Dimensions> {
        let path = path.to_path_buf();
        blocking(move || media::probe::probe_dimensions(&path)).await
    }

    async fn derive_thumbnail(&self, path: &Path) -> GatewayResult<Thumbnail> {
        let path = path.to_path_buf();
        let config = Arc::clone(&self.config);
        blocking(move || {
            media::thumbnail::generate_thumbnail(&path, &config.thumbnail_dir, config.thumbnail_size)
        })
        .await
    }

    async fn export_image(&self, request: &ExportRequest) -> GatewayResult<()> {
        let request = request.clone();
        blocking(move || media::export::export_image(&request)).await
    }

    async fn cache_size(&self) -> GatewayResult<u64> {
        let dir: PathBuf = self.config.thumbnail_dir.clone();
        blocking(move || media::thumbnail::cache_size(&dir)).await
    }

    async fn clear_cache(&self) -> GatewayResult<usize> {
        let dir: PathBuf = self.config.thumbnail_dir.clone();
        blocking(move || media::thumbnail::clear_cache(&dir)).await
    }
}

impl std::fmt::Debug for LocalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGateway")
            .field("database_path", &self.config.database_path)
            .field("thumbnail_dir", &self.config.thumbnail_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{FixedFolder, ImportPipeline};
    use crate::state::store::EntityStore;
    use std::fs;

    fn config_in(dir: &Path) -> CatalogConfig {
        CatalogConfig {
            database_path: dir.join("catalog").join("photos.db"),
            thumbnail_dir: dir.join("thumbs"),
            ..CatalogConfig::default()
        }
    }

    #[tokio::test]
    async fn test_calls_before_initialize_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = LocalGateway::new(config_in(dir.path()));

        assert!(matches!(
            gateway.fetch_photos().await,
            Err(GatewayError::Rejected(_))
        ));

        gateway.initialize().await.unwrap();
        gateway.initialize().await.unwrap();
        assert!(gateway.fetch_photos().await.unwrap().is_empty());
        assert!(dir.path().join("catalog").join("photos.db").exists());
    }

    #[tokio::test]
    async fn test_import_folder_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("shoot");
        fs::create_dir(&folder).unwrap();
        image::RgbImage::new(300, 200).save(folder.join("a.png")).unwrap();
        fs::write(folder.join("b.jpg"), b"corrupt").unwrap();
        image::RgbImage::new(50, 100).save(folder.join("c.png")).unwrap();

        let gateway = Arc::new(LocalGateway::new(config_in(dir.path())));
        let store = Arc::new(EntityStore::default());
        let pipeline = ImportPipeline::new(gateway.clone(), store.clone());

        let mut seen = Vec::new();
        let report = pipeline
            .load_folder(&FixedFolder::new(folder.clone()), |progress| {
                seen.push((progress.current, progress.current_file.clone()))
            })
            .await
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.count(), 2);
        assert!(report.is_partial());
        assert_eq!(report.failed[0].filename, "b.jpg");
        assert_eq!(
            seen,
            vec![(1, "a.png".to_string()), (2, "b.jpg".to_string()), (3, "c.png".to_string())]
        );

        let photos = store.photos().snapshot();
        let names: Vec<&str> = photos.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!((photos[0].width, photos[0].height), (300, 200));
        assert!(photos[0].thumbnail.is_some());

        // The catalog holds exactly what the store holds
        assert_eq!(gateway.fetch_photos().await.unwrap().len(), 2);
        assert!(gateway.cache_size().await.unwrap() > 0);

        let backup = gateway.export_backup().await.unwrap();
        assert!(backup.contains("a.png"));
    }

    #[tokio::test]
    async fn test_gateway_around_open_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();
        let gateway = LocalGateway::with_library(library, config_in(dir.path()));

        let created = gateway.create_collection("Trips").await.unwrap();
        let listed = gateway.list_collections().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!((listed[0].id, listed[0].name.as_str()), (created.id, "Trips"));

        gateway.delete_collection(created.id).await.unwrap();
        assert!(gateway.list_collections().await.unwrap().is_empty());
        assert!(matches!(
            gateway.delete_collection(created.id).await,
            Err(GatewayError::Rejected(_))
        ));
    }
}
