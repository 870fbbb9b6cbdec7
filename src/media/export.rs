/// Resize/export of a single image
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::path::Path;

use super::extension_of;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ExportRequest;

/// Write `request.source` to `request.destination`, resized as asked
///
/// With both dimensions the image is resized exactly; with one the other is
/// derived from the aspect ratio; with none the pixels are re-encoded as is.
pub fn export_image(request: &ExportRequest) -> GatewayResult<()> {
    tracing::debug!(
        "Exporting image: {} -> {}",
        request.source.display(),
        request.destination.display()
    );

    // Determine format from destination path before decoding anything
    let format = format_for(&request.destination)?;

    let img = image::open(&request.source)?;
    let resized = resize(img, request.width, request.height);

    let output = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };
    output.save_with_format(&request.destination, format)?;

    if request.preserve_exif {
        tracing::warn!(
            "EXIF preservation requested for {} but the encoder drops metadata",
            request.destination.display()
        );
    }

    Ok(())
}

fn resize(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    match (width, height) {
        (Some(w), Some(h)) => img.resize_exact(w, h, FilterType::Lanczos3),
        (Some(w), None) => {
            let h = (w as f64 * img.height() as f64 / img.width().max(1) as f64).round() as u32;
            img.resize_exact(w, h.max(1), FilterType::Lanczos3)
        }
        (None, Some(h)) => {
            let w = (h as f64 * img.width() as f64 / img.height().max(1) as f64).round() as u32;
            img.resize_exact(w.max(1), h, FilterType::Lanczos3)
        }
        (None, None) => img,
    }
}

pub fn format_for(path: &Path) -> GatewayResult<ImageFormat> {
    let ext = extension_of(path)
        .ok_or_else(|| GatewayError::Unsupported(format!("no file extension: {}", path.display())))?;

    match ext.as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "webp" => Ok(ImageFormat::WebP),
        _ => Err(GatewayError::Unsupported(format!("image format: {}", ext))),
    }
}
