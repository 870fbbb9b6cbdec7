/// Local media services
///
/// This module handles the filesystem side of the local gateway:
/// - Finding candidate images below a folder (scan.rs)
/// - Reading EXIF blocks (exif.rs)
/// - Probing pixel dimensions, RAW files included (probe.rs)
/// - Generating and caching thumbnails (thumbnail.rs)
/// - Resizing/exporting images (export.rs)
///
/// Everything here is blocking; the gateway runs it on the blocking pool.
use std::path::Path;

pub mod exif;
pub mod export;
pub mod probe;
pub mod scan;
pub mod thumbnail;

/// Decodable image formats picked up by a scan
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];

/// Supported RAW file extensions (common formats)
pub const RAW_EXTENSIONS: &[&str] = &[
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2",
    "pef", "srw", "erf", "kdc", "dcr", "mos", "raw", "rwl",
];

/// Lower-cased extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_raw(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

/// Extension list used when the configuration does not name one
pub fn default_extensions() -> Vec<String> {
    IMAGE_EXTENSIONS
        .iter()
        .chain(RAW_EXTENSIONS)
        .map(|ext| ext.to_string())
        .collect()
}
