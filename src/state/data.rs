/// Shared data structures for the catalog state
///
/// These structs represent the data model that flows between
/// the backend gateway, the entity store and the projection engine.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use super::metadata::{PhotoMetadata, PhotoPatch};
use crate::gateway::{CollectionRecord, PhotoRecord};

/// Unique catalog ID of a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

/// Unique catalog ID of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub i64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Photo,
    Collection,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Photo => f.write_str("photo"),
            EntityKind::Collection => f.write_str("collection"),
        }
    }
}

/// Typed reference to any entity, used in store change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Photo(PhotoId),
    Collection(CollectionId),
}

/// How presentation code lays the library out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    #[default]
    Grid,
    Detail,
}

/// A record the entity store can hold
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync;
    type Patch;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    /// Merge a partial update into this record
    fn apply(&mut self, patch: &Self::Patch);

    fn entity_ref(id: Self::Id) -> EntityRef;
}

/// EXIF block extracted at import time. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifData {
    pub capture_date: Option<NaiveDateTime>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    /// F-number
    pub aperture: Option<f64>,
    /// Exposure time as displayed, e.g. "1/250"
    pub shutter_speed: Option<String>,
    /// Millimetres
    pub focal_length: Option<f64>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Represents a single photo in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    /// Full path to the source file
    pub path: String,
    /// Filename only (e.g., "DSC_0001.jpg")
    pub filename: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    /// Path to the cached thumbnail (None if not generated)
    pub thumbnail: Option<String>,
    pub exif: Option<ExifData>,
    pub metadata: PhotoMetadata,
    /// Set once, when the photo entered the catalog
    pub added_at: DateTime<Utc>,
}

impl Photo {
    pub fn capture_date(&self) -> Option<NaiveDateTime> {
        self.exif.as_ref().and_then(|exif| exif.capture_date)
    }
}

impl From<PhotoRecord> for Photo {
    fn from(record: PhotoRecord) -> Self {
        let exif = (!record.exif.is_empty()).then_some(record.exif);
        Photo {
            id: record.id,
            path: record.path,
            filename: record.filename,
            file_size: record.file_size,
            width: record.width,
            height: record.height,
            thumbnail: record.thumbnail_path,
            exif,
            metadata: PhotoMetadata {
                tags: record.tags,
                rating: record.rating,
                description: record.description,
                favorite: record.favorite,
            },
            added_at: record.added_at,
        }
    }
}

impl Entity for Photo {
    type Id = PhotoId;
    type Patch = PhotoPatch;

    const KIND: EntityKind = EntityKind::Photo;

    fn id(&self) -> PhotoId {
        self.id
    }

    fn apply(&mut self, patch: &PhotoPatch) {
        self.metadata.apply(patch);
    }

    fn entity_ref(id: PhotoId) -> EntityRef {
        EntityRef::Photo(id)
    }
}

/// A named, ordered set of photo ids
///
/// Members are soft references: an id may point at a photo that is not
/// (or no longer) in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub photo_ids: Vec<PhotoId>,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn from_record(record: CollectionRecord, photo_ids: Vec<PhotoId>) -> Self {
        let mut collection = Collection {
            id: record.id,
            name: record.name,
            photo_ids: Vec::with_capacity(photo_ids.len()),
            created_at: record.created_at,
        };
        for id in photo_ids {
            collection.add_member(id);
        }
        collection
    }

    pub fn contains(&self, photo_id: PhotoId) -> bool {
        self.photo_ids.contains(&photo_id)
    }

    /// Returns false if the photo was already a member
    pub fn add_member(&mut self, photo_id: PhotoId) -> bool {
        if self.contains(photo_id) {
            return false;
        }
        self.photo_ids.push(photo_id);
        true
    }

    pub fn remove_member(&mut self, photo_id: PhotoId) -> bool {
        let before = self.photo_ids.len();
        self.photo_ids.retain(|id| *id != photo_id);
        self.photo_ids.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionPatch {
    pub name: Option<String>,
    pub photo_ids: Option<Vec<PhotoId>>,
}

impl CollectionPatch {
    pub fn members(photo_ids: Vec<PhotoId>) -> Self {
        Self {
            photo_ids: Some(photo_ids),
            ..Self::default()
        }
    }
}

impl Entity for Collection {
    type Id = CollectionId;
    type Patch = CollectionPatch;

    const KIND: EntityKind = EntityKind::Collection;

    fn id(&self) -> CollectionId {
        self.id
    }

    fn apply(&mut self, patch: &CollectionPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(photo_ids) = &patch.photo_ids {
            self.photo_ids = photo_ids.clone();
        }
    }

    fn entity_ref(id: CollectionId) -> EntityRef {
        EntityRef::Collection(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::metadata::TagList;

    #[test]
    fn test_membership_has_set_semantics() {
        let mut collection = Collection {
            id: CollectionId(1),
            name: "Trips".into(),
            photo_ids: vec![],
            created_at: Utc::now(),
        };

        assert!(collection.add_member(PhotoId(3)));
        assert!(!collection.add_member(PhotoId(3)));
        assert!(collection.add_member(PhotoId(1)));
        assert_eq!(collection.photo_ids, vec![PhotoId(3), PhotoId(1)]);

        assert!(collection.remove_member(PhotoId(3)));
        assert!(!collection.remove_member(PhotoId(3)));
        assert_eq!(collection.photo_ids, vec![PhotoId(1)]);
    }

    #[test]
    fn test_record_without_exif_has_no_exif_block() {
        let record = PhotoRecord {
            id: PhotoId(9),
            path: "/p/a.jpg".into(),
            filename: "a.jpg".into(),
            file_size: 10,
            width: 4,
            height: 3,
            exif: ExifData::default(),
            added_at: Utc::now(),
            rating: Some(2),
            favorite: true,
            tags: TagList::from_iter(["x"]),
            description: None,
            thumbnail_path: None,
        };

        let photo = Photo::from(record);
        assert_eq!(photo.exif, None);
        assert_eq!(photo.metadata.rating, Some(2));
        assert!(photo.metadata.favorite);
        assert!(photo.metadata.tags.contains("x"));
    }
}
