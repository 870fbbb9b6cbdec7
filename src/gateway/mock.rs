/// In-memory gateway for tests
///
/// Behaves like a tiny backend and lets a test make any operation fail,
/// either always or only for one file name.
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{
    BackendGateway, CollectionRecord, Dimensions, ExportRequest, NewPhotoRecord, PhotoRecord,
    ScannedFile, Thumbnail,
};
use crate::error::{GatewayError, GatewayResult};
use crate::state::data::{CollectionId, ExifData, PhotoId};
use crate::state::metadata::PhotoPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Initialize,
    InsertPhoto,
    FetchPhotos,
    UpdateMetadata,
    CreateCollection,
    ListCollections,
    DeleteCollection,
    AddToCollection,
    RemoveFromCollection,
    PhotosInCollection,
    Scan,
    Exif,
    Dimensions,
    Thumbnail,
    Export,
}

#[derive(Default)]
struct MockState {
    next_id: i64,
    photos: Vec<PhotoRecord>,
    collections: Vec<CollectionRecord>,
    members: Vec<(CollectionId, PhotoId)>,
    files: Vec<ScannedFile>,
    exif: HashMap<String, ExifData>,
    failing: HashSet<(Op, Option<String>)>,
    calls: HashMap<Op, usize>,
    exported: Vec<PathBuf>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files the next scan will "discover", in this order
    pub fn with_files(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.files = names
                .iter()
                .map(|name| ScannedFile {
                    path: PathBuf::from("/import").join(name),
                    filename: name.to_string(),
                    file_size: 2048,
                })
                .collect();
        }
        self
    }

    pub fn set_exif(&self, filename: &str, exif: ExifData) {
        self.state.lock().unwrap().exif.insert(filename.to_string(), exif);
    }

    /// Make every call of `op` fail
    pub fn fail(&self, op: Op) {
        self.state.lock().unwrap().failing.insert((op, None));
    }

    /// Make `op` fail only for the file with this name
    pub fn fail_for(&self, op: Op, filename: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert((op, Some(filename.to_string())));
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn persisted_photos(&self) -> Vec<PhotoRecord> {
        self.state.lock().unwrap().photos.clone()
    }

    pub fn members(&self, collection: CollectionId) -> Vec<PhotoId> {
        self.state
            .lock()
            .unwrap()
            .members
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn exported(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().exported.clone()
    }

    pub fn seed_collection(&self, name: &str, members: &[PhotoId]) -> CollectionId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = CollectionId(state.next_id);
        state.collections.push(CollectionRecord {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
        });
        for photo in members {
            state.members.push((id, *photo));
        }
        id
    }

    fn enter(&self, op: Op, target: Option<&str>) -> GatewayResult<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;

        let fails = state.failing.contains(&(op, None))
            || target.is_some_and(|t| state.failing.contains(&(op, Some(t.to_string()))));
        if fails {
            return Err(GatewayError::Rejected(format!("{:?} failed", op)));
        }
        Ok(state)
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn initialize(&self) -> GatewayResult<()> {
        drop(self.enter(Op::Initialize, None)?);
        Ok(())
    }

    async fn insert_photo(&self, record: &NewPhotoRecord) -> GatewayResult<PhotoId> {
        let mut state = self.enter(Op::InsertPhoto, Some(&record.filename))?;
        state.next_id += 1;
        let id = PhotoId(state.next_id);
        state.photos.push(record.clone().with_id(id));
        Ok(id)
    }

    async fn fetch_photos(&self) -> GatewayResult<Vec<PhotoRecord>> {
        let state = self.enter(Op::FetchPhotos, None)?;
        Ok(state.photos.clone())
    }

    async fn update_metadata(&self, id: PhotoId, patch: &PhotoPatch) -> GatewayResult<()> {
        let mut state = self.enter(Op::UpdateMetadata, None)?;
        if let Some(record) = state.photos.iter_mut().find(|p| p.id == id) {
            if let Some(tags) = &patch.tags {
                record.tags = tags.clone();
            }
            if let Some(rating) = patch.rating {
                record.rating = rating;
            }
            if let Some(description) = &patch.description {
                record.description = description.clone();
            }
            if let Some(favorite) = patch.favorite {
                record.favorite = favorite;
            }
        }
        Ok(())
    }

    async fn create_collection(&self, name: &str) -> GatewayResult<CollectionRecord> {
        let mut state = self.enter(Op::CreateCollection, None)?;
        state.next_id += 1;
        let record = CollectionRecord {
            id: CollectionId(state.next_id),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.collections.push(record.clone());
        Ok(record)
    }

    async fn list_collections(&self) -> GatewayResult<Vec<CollectionRecord>> {
        let state = self.enter(Op::ListCollections, None)?;
        Ok(state.collections.clone())
    }

    async fn delete_collection(&self, id: CollectionId) -> GatewayResult<()> {
        let mut state = self.enter(Op::DeleteCollection, None)?;
        state.collections.retain(|c| c.id != id);
        state.members.retain(|(c, _)| *c != id);
        Ok(())
    }

    async fn add_to_collection(&self, collection: CollectionId, photo: PhotoId) -> GatewayResult<()> {
        let mut state = self.enter(Op::AddToCollection, None)?;
        if !state.members.contains(&(collection, photo)) {
            state.members.push((collection, photo));
        }
        Ok(())
    }

    async fn remove_from_collection(
        &self,
        collection: CollectionId,
        photo: PhotoId,
    ) -> GatewayResult<()> {
        let mut state = self.enter(Op::RemoveFromCollection, None)?;
        state.members.retain(|pair| *pair != (collection, photo));
        Ok(())
    }

    async fn photos_in_collection(&self, collection: CollectionId) -> GatewayResult<Vec<PhotoRecord>> {
        let state = self.enter(Op::PhotosInCollection, None)?;
        let ids: Vec<PhotoId> = state
            .members
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, p)| *p)
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| state.photos.iter().find(|p| p.id == *id).cloned())
            .collect())
    }

    async fn scan_directory(&self, _path: &Path) -> GatewayResult<Vec<ScannedFile>> {
        let state = self.enter(Op::Scan, None)?;
        Ok(state.files.clone())
    }

    async fn extract_exif(&self, path: &Path) -> GatewayResult<ExifData> {
        let name = file_name(path);
        let state = self.enter(Op::Exif, Some(&name))?;
        Ok(state.exif.get(&name).cloned().unwrap_or_default())
    }

    async fn probe_dimensions(&self, path: &Path) -> GatewayResult<Dimensions> {
        drop(self.enter(Op::Dimensions, Some(&file_name(path)))?);
        Ok(Dimensions {
            width: 6000,
            height: 4000,
        })
    }

    async fn derive_thumbnail(&self, path: &Path) -> GatewayResult<Thumbnail> {
        let name = file_name(path);
        drop(self.enter(Op::Thumbnail, Some(&name))?);
        Ok(Thumbnail {
            path: format!("/cache/{}.jpg", name),
            width: 256,
            height: 171,
        })
    }

    async fn export_image(&self, request: &ExportRequest) -> GatewayResult<()> {
        let mut state = self.enter(Op::Export, Some(&file_name(&request.source)))?;
        state.exported.push(request.destination.clone());
        Ok(())
    }

    async fn cache_size(&self) -> GatewayResult<u64> {
        Ok(0)
    }

    async fn clear_cache(&self) -> GatewayResult<usize> {
        Ok(0)
    }
}
