/// Filter and sort over photo snapshots
///
/// Pure functions: nothing here touches the store. Callers pass a
/// `snapshot()` and get a new vector back.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::state::data::Photo;

/// Inclusive capture-date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Photo must carry every one of these
    pub tags: Vec<String>,
    pub min_rating: Option<u8>,
    pub date_range: Option<DateRange>,
    /// Case-insensitive match against filename or description
    pub keyword: Option<String>,
}

impl FilterCriteria {
    pub fn is_active(&self) -> bool {
        !self.tags.is_empty()
            || self.min_rating.is_some()
            || self.date_range.is_some()
            || self.keyword().is_some()
    }

    /// Lowercased, trimmed keyword; `None` if blank
    fn keyword(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
    }

    fn matches(&self, photo: &Photo, keyword: Option<&str>) -> bool {
        if !self.tags.iter().all(|tag| photo.metadata.tags.contains(tag)) {
            return false;
        }

        if let Some(min) = self.min_rating {
            match photo.metadata.rating {
                Some(rating) if rating >= min => {}
                _ => return false,
            }
        }

        if let Some(range) = &self.date_range {
            match photo.capture_date() {
                Some(date) if range.contains(date) => {}
                _ => return false,
            }
        }

        match keyword {
            Some(keyword) => matches_text(photo, keyword),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    CaptureDate,
    Filename,
    Rating,
    #[default]
    AddedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Newest additions first by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortCriteria {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortCriteria {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }
}

fn matches_text(photo: &Photo, keyword: &str) -> bool {
    photo.filename.to_lowercase().contains(keyword)
        || photo
            .metadata
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(keyword))
}

/// Photos passing every active test, in input order
pub fn filter(photos: &[Photo], criteria: &FilterCriteria) -> Vec<Photo> {
    let keyword = criteria.keyword();
    photos
        .iter()
        .filter(|photo| criteria.matches(photo, keyword.as_deref()))
        .cloned()
        .collect()
}

fn compare(a: &Photo, b: &Photo, key: SortKey) -> Ordering {
    match key {
        // Missing capture dates sort earliest
        SortKey::CaptureDate => a.capture_date().cmp(&b.capture_date()),
        SortKey::Filename => a.filename.cmp(&b.filename),
        SortKey::Rating => a
            .metadata
            .rating
            .unwrap_or(0)
            .cmp(&b.metadata.rating.unwrap_or(0)),
        SortKey::AddedDate => a.added_at.cmp(&b.added_at),
    }
}

/// Stable sort; equal keys keep their input order in both directions
pub fn sort(photos: &[Photo], key: SortKey, order: SortOrder) -> Vec<Photo> {
    let mut sorted = photos.to_vec();
    sorted.sort_by(|a, b| match order {
        SortOrder::Ascending => compare(a, b, key),
        SortOrder::Descending => compare(a, b, key).reverse(),
    });
    sorted
}

pub fn project(photos: &[Photo], criteria: &FilterCriteria, sorting: SortCriteria) -> Vec<Photo> {
    sort(&filter(photos, criteria), sorting.key, sorting.order)
}

/// Every tag in use, sorted and deduplicated
pub fn all_tags(photos: &[Photo]) -> Vec<String> {
    photos
        .iter()
        .flat_map(|photo| photo.metadata.tags.iter())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn favorites(photos: &[Photo]) -> Vec<Photo> {
    photos
        .iter()
        .filter(|photo| photo.metadata.favorite)
        .cloned()
        .collect()
}

/// Keyword search over filename, description and tags
pub fn search(photos: &[Photo], keyword: &str) -> Vec<Photo> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return photos.to_vec();
    }

    photos
        .iter()
        .filter(|photo| {
            matches_text(photo, &keyword)
                || photo
                    .metadata
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&keyword))
        })
        .cloned()
        .collect()
}

/// Photos rated within `min..=max` (no upper bound when `max` is `None`).
/// Unrated photos count as 0.
pub fn by_rating(photos: &[Photo], min: u8, max: Option<u8>) -> Vec<Photo> {
    photos
        .iter()
        .filter(|photo| {
            let rating = photo.metadata.rating.unwrap_or(0);
            rating >= min && max.map_or(true, |max| rating <= max)
        })
        .cloned()
        .collect()
}
