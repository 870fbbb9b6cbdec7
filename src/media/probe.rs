/// Pixel dimension probing
///
/// Regular images are measured from their header by the `image` crate.
/// RAW files that `image` cannot read fall back to rawloader, which decodes
/// the sensor data (slow, but always reports the real sensor size).
use std::path::Path;

use super::is_raw;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Dimensions;

pub fn probe_dimensions(path: &Path) -> GatewayResult<Dimensions> {
    // Verify file exists
    if !path.exists() {
        return Err(GatewayError::PathNotFound(path.to_path_buf()));
    }

    match image::image_dimensions(path) {
        Ok((width, height)) => Ok(Dimensions { width, height }),
        Err(err) if is_raw(path) => {
            tracing::debug!(
                "image crate could not read {} ({}), decoding RAW data",
                path.display(),
                err
            );
            probe_raw(path)
        }
        Err(err) => Err(err.into()),
    }
}

/// Decode the RAW file and report the sensor dimensions
fn probe_raw(path: &Path) -> GatewayResult<Dimensions> {
    let decoder = rawloader::RawLoader::new();

    let raw_image = decoder
        .decode_file(path)
        .map_err(|e| GatewayError::Decode(format!("Failed to decode RAW: {:?}", e)))?;

    tracing::debug!(
        "📷 Probed RAW data: {}x{} ({})",
        raw_image.width,
        raw_image.height,
        path.display()
    );

    Ok(Dimensions {
        width: raw_image.width as u32,
        height: raw_image.height as u32,
    })
}
