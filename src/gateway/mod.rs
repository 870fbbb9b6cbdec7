/// Backend gateway
///
/// The asynchronous command surface the catalog talks to for persistence and
/// media processing. Every call may fail with a `GatewayError`; callers treat
/// each `.await` here as the only place they can be suspended.
///
/// Architecture:
/// - `local.rs` - SQLite catalog + filesystem media services
/// - `mock.rs`  - scriptable in-memory gateway for tests
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GatewayResult;
use crate::state::data::{CollectionId, ExifData, PhotoId};
use crate::state::metadata::{PhotoPatch, TagList};

pub mod local;
#[cfg(test)]
pub mod mock;

pub use local::LocalGateway;

/// A photo row as persisted by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub path: String,
    pub filename: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub exif: ExifData,
    pub added_at: DateTime<Utc>,
    pub rating: Option<u8>,
    pub favorite: bool,
    pub tags: TagList,
    pub description: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// A photo row before the backend has assigned it an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPhotoRecord {
    pub path: String,
    pub filename: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub exif: ExifData,
    pub added_at: DateTime<Utc>,
    pub rating: Option<u8>,
    pub favorite: bool,
    pub tags: TagList,
    pub description: Option<String>,
    pub thumbnail_path: Option<String>,
}

impl NewPhotoRecord {
    pub fn with_id(self, id: PhotoId) -> PhotoRecord {
        PhotoRecord {
            id,
            path: self.path,
            filename: self.filename,
            file_size: self.file_size,
            width: self.width,
            height: self.height,
            exif: self.exif,
            added_at: self.added_at,
            rating: self.rating,
            favorite: self.favorite,
            tags: self.tags,
            description: self.description,
            thumbnail_path: self.thumbnail_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A candidate file found by a directory scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub filename: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Resize/export of one image to a destination file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub preserve_exif: bool,
}

#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Prepare the persistent store. Safe to call more than once.
    async fn initialize(&self) -> GatewayResult<()>;

    /// Persist a photo and return the id the backend assigned
    async fn insert_photo(&self, record: &NewPhotoRecord) -> GatewayResult<PhotoId>;

    async fn fetch_photos(&self) -> GatewayResult<Vec<PhotoRecord>>;

    /// Persist the metadata fields a patch carries
    async fn update_metadata(&self, id: PhotoId, patch: &PhotoPatch) -> GatewayResult<()>;

    async fn create_collection(&self, name: &str) -> GatewayResult<CollectionRecord>;

    async fn list_collections(&self) -> GatewayResult<Vec<CollectionRecord>>;

    async fn delete_collection(&self, id: CollectionId) -> GatewayResult<()>;

    async fn add_to_collection(&self, collection: CollectionId, photo: PhotoId) -> GatewayResult<()>;

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        photo: PhotoId,
    ) -> GatewayResult<()>;

    async fn photos_in_collection(&self, collection: CollectionId) -> GatewayResult<Vec<PhotoRecord>>;

    /// Find candidate image files below `path`
    async fn scan_directory(&self, path: &Path) -> GatewayResult<Vec<ScannedFile>>;

    async fn extract_exif(&self, path: &Path) -> GatewayResult<ExifData>;

    async fn probe_dimensions(&self, path: &Path) -> GatewayResult<Dimensions>;

    async fn derive_thumbnail(&self, path: &Path) -> GatewayResult<Thumbnail>;

    async fn export_image(&self, request: &ExportRequest) -> GatewayResult<()>;

    /// Bytes used by derived assets (thumbnails)
    async fn cache_size(&self) -> GatewayResult<u64>;

    /// Delete derived assets, returning how many files were removed
    async fn clear_cache(&self) -> GatewayResult<usize>;
}
