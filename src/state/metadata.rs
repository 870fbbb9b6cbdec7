/// User-editable photo metadata
///
/// The metadata block is the only part of a photo that changes after import.
/// Tags are held as a `TagList`, which is the one typed schema for tags:
/// it is encoded to JSON text by the catalog database and decoded when a row
/// is read, and nowhere else.
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Highest rating a photo can carry
pub const MAX_RATING: u8 = 5;

/// Ordered, deduplicated list of tags
///
/// Tags are trimmed; blank tags are dropped and only the first occurrence of
/// a repeated tag is kept.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Append a tag unless it is blank or already present.
    /// Returns true if the list changed.
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Convert to JSON string for database storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Parse from JSON string (from database)
    ///
    /// The decoded list is normalised again so a hand-edited row cannot
    /// smuggle duplicates into the cache.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<String> = serde_json::from_str(json)?;
        Ok(raw.into_iter().collect())
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = TagList::new();
        for tag in iter {
            list.insert(tag.as_ref());
        }
        list
    }
}

/// Mutable metadata block of a photo
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoMetadata {
    pub tags: TagList,
    /// 0-5, `None` when the photo was never rated
    pub rating: Option<u8>,
    pub description: Option<String>,
    pub favorite: bool,
}

impl PhotoMetadata {
    /// Check if this represents an untouched photo (all values at default)
    pub fn is_untouched(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the fields a patch carries
    pub fn apply(&mut self, patch: &PhotoPatch) {
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
    }
}

/// Replacement values for individual metadata fields
///
/// `Some(value)` overwrites the field; `None` leaves it alone. For the
/// optional fields the inner `Option` is the value written, so a patch can
/// restore an undefined rating or description.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoPatch {
    pub tags: Option<TagList>,
    pub rating: Option<Option<u8>>,
    pub description: Option<Option<String>>,
    pub favorite: Option<bool>,
}

impl PhotoPatch {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none()
            && self.rating.is_none()
            && self.description.is_none()
            && self.favorite.is_none()
    }

    /// Capture the current values of exactly the fields this patch touches
    pub fn snapshot_of(&self, current: &PhotoMetadata) -> PhotoPatch {
        PhotoPatch {
            tags: self.tags.as_ref().map(|_| current.tags.clone()),
            rating: self.rating.map(|_| current.rating),
            description: self
                .description
                .as_ref()
                .map(|_| current.description.clone()),
            favorite: self.favorite.map(|_| current.favorite),
        }
    }
}

/// Metadata edit requested by a caller
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub tags: Option<Vec<String>>,
    pub rating: Option<u8>,
    pub description: Option<String>,
    pub favorite: Option<bool>,
}

impl MetadataUpdate {
    pub fn rating(rating: u8) -> Self {
        Self {
            rating: Some(rating),
            ..Self::default()
        }
    }

    pub fn tags<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn favorite(favorite: bool) -> Self {
        Self {
            favorite: Some(favorite),
            ..Self::default()
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Validate and normalise into a patch
    pub fn into_patch(self) -> Result<PhotoPatch, ValidationError> {
        if let Some(rating) = self.rating {
            if rating > MAX_RATING {
                return Err(ValidationError::RatingOutOfRange(rating));
            }
        }

        Ok(PhotoPatch {
            tags: self.tags.map(|tags| tags.into_iter().collect()),
            rating: self.rating.map(Some),
            description: self.description.map(Some),
            favorite: self.favorite,
        })
    }
}
