/// Catalog configuration
///
/// Everything has a default, so a missing config file (or a partial one) is
/// fine. Database and cache locations follow the platform conventions:
/// - Linux: ~/.local/share/photo-catalog/photos.db, ~/.cache/photo-catalog/thumbnails
/// - macOS: ~/Library/Application Support/photo-catalog/photos.db, ~/Library/Caches/...
/// - Windows: %APPDATA%\photo-catalog\photos.db, %LOCALAPPDATA%\...
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::media::{default_extensions, thumbnail};
use crate::state::store::DEFAULT_EVENT_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid config {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite catalog file
    pub database_path: PathBuf,
    /// Where generated thumbnails are cached
    pub thumbnail_dir: PathBuf,
    /// Thumbnails fit in a square of this many pixels
    pub thumbnail_size: u32,
    /// File extensions picked up by a folder scan (case-insensitive)
    pub extensions: Vec<String>,
    pub follow_links: bool,
    /// Capacity of the store's change-notification channel
    pub event_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            thumbnail_dir: thumbnail::default_cache_dir(),
            thumbnail_size: thumbnail::THUMBNAIL_SIZE,
            extensions: default_extensions(),
            follow_links: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Get the path where the database should be stored
fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir);

    path.push("photo-catalog");
    path.push("photos.db");
    path
}

impl CatalogConfig {
    /// Load from a TOML file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: CatalogConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Invalid("thumbnail_size must be positive".into()));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid("extensions must not be empty".into()));
        }
        Ok(())
    }
}
