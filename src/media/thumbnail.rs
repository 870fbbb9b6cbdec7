use image::{imageops::FilterType, DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::is_raw;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Thumbnail;

/// Default bound of generated thumbnails (square)
pub const THUMBNAIL_SIZE: u32 = 256;

/// Get the default thumbnail cache directory
/// Returns ~/.cache/photo-catalog/thumbnails on Linux
pub fn default_cache_dir() -> PathBuf {
    let mut path = dirs_next::cache_dir()
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(std::env::temp_dir);

    path.push("photo-catalog");
    path.push("thumbnails");
    path
}

/// Cache file for a source image: SHA-256 of its path, so the name is stable
/// across runs and independent of catalog ids.
pub fn thumbnail_path(source: &Path, cache_dir: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    cache_dir.join(format!("{:x}.jpg", hasher.finalize()))
}

/// Generate (or reuse) the thumbnail for an image
pub fn generate_thumbnail(source: &Path, cache_dir: &Path, size: u32) -> GatewayResult<Thumbnail> {
    fs::create_dir_all(cache_dir)?;

    let target = thumbnail_path(source, cache_dir);

    // Check if thumbnail already exists
    if target.exists() {
        let (width, height) = image::image_dimensions(&target)?;
        tracing::debug!("Using cached thumbnail: {}", target.display());
        return Ok(Thumbnail {
            path: target.to_string_lossy().to_string(),
            width,
            height,
        });
    }

    let img = load_source(source)?;
    let thumbnail = img.resize(size, size, FilterType::Lanczos3);

    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(thumbnail.to_rgb8()).save_with_format(&target, ImageFormat::Jpeg)?;

    tracing::debug!("📸 Generated thumbnail: {}", target.display());

    Ok(Thumbnail {
        path: target.to_string_lossy().to_string(),
        width: thumbnail.width(),
        height: thumbnail.height(),
    })
}

/// Decode the source directly, or for RAW files through their embedded JPEG
fn load_source(source: &Path) -> GatewayResult<DynamicImage> {
    match image::open(source) {
        Ok(img) => Ok(img),
        Err(err) if is_raw(source) => {
            let jpeg = extract_embedded_jpeg(source)?.ok_or_else(|| {
                GatewayError::Decode(format!(
                    "No embedded JPEG found in {} ({})",
                    source.display(),
                    err
                ))
            })?;
            Ok(image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Look for a preview JPEG inside a RAW file
///
/// Reads progressively larger prefixes of the file (256KB, 512KB, 5MB)
/// before falling back to the whole file.
fn extract_embedded_jpeg(raw_path: &Path) -> GatewayResult<Option<Vec<u8>>> {
    const TIERS: &[(usize, usize)] = &[
        (256 * 1024, 50_000),
        (512 * 1024, 30_000),
        (5 * 1024 * 1024, 10_000),
    ];

    for &(max_bytes, min_size) in TIERS {
        let data = read_prefix(raw_path, max_bytes)?;
        if let Some(jpeg) = extract_jpeg_from_data(&data, min_size) {
            if image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).is_ok() {
                return Ok(Some(jpeg));
            }
        }
    }

    // Whole file, any size: try the largest decodable JPEG first
    let data = fs::read(raw_path)?;
    let mut candidates = all_jpegs(&data);
    candidates.sort_by_key(|jpeg| std::cmp::Reverse(jpeg.len()));

    Ok(candidates
        .into_iter()
        .find(|jpeg| image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).is_ok()))
}

fn read_prefix(path: &Path, max_bytes: usize) -> GatewayResult<Vec<u8>> {
    let file = fs::File::open(path)?;
    let mut data = Vec::with_capacity(max_bytes);
    file.take(max_bytes as u64).read_to_end(&mut data)?;
    Ok(data)
}

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// Return the first JPEG in `data` that is larger than `min_size`
fn extract_jpeg_from_data(data: &[u8], min_size: usize) -> Option<Vec<u8>> {
    // Find JPEG start positions - stop after finding a few
    let starts: Vec<usize> = data
        .windows(2)
        .enumerate()
        .filter(|(_, window)| *window == JPEG_START)
        .map(|(i, _)| i)
        .take(6)
        .collect();

    starts.into_iter().find_map(|start| {
        let end_offset = data[start..].windows(2).position(|w| w == JPEG_END)?;
        let end = start + end_offset + 1;
        (end - start + 1 > min_size).then(|| data[start..=end].to_vec())
    })
}

fn all_jpegs(data: &[u8]) -> Vec<Vec<u8>> {
    data.windows(2)
        .enumerate()
        .filter(|(_, window)| *window == JPEG_START)
        .filter_map(|(start, _)| {
            let end_offset = data[start..].windows(2).position(|w| w == JPEG_END)?;
            Some(data[start..=start + end_offset + 1].to_vec())
        })
        .collect()
}

/// Total bytes of cached thumbnails
pub fn cache_size(cache_dir: &Path) -> GatewayResult<u64> {
    if !cache_dir.exists() {
        return Ok(0);
    }

    let mut total_size = 0u64;
    for entry in fs::read_dir(cache_dir)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            total_size += metadata.len();
        }
    }

    Ok(total_size)
}

/// Delete cached thumbnails, returning how many files were removed
pub fn clear_cache(cache_dir: &Path) -> GatewayResult<usize> {
    if !cache_dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in fs::read_dir(cache_dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            count += 1;
        }
    }

    tracing::info!("🗑️  Cleared {} cached thumbnails", count);
    Ok(count)
}
