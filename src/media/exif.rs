/// EXIF extraction
///
/// Reads the primary IFD of a file with kamadak-exif. A file that simply
/// carries no EXIF block yields an empty `ExifData`; only I/O problems are
/// errors.
use ::exif::{DateTime as ExifDateTime, Field, In, Reader, Tag, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::GatewayResult;
use crate::state::data::ExifData;

pub fn extract_exif(path: &Path) -> GatewayResult<ExifData> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(::exif::Error::Io(e)) => return Err(e.into()),
        Err(e) => {
            tracing::debug!("No EXIF data found in {}: {}", path.display(), e);
            return Ok(ExifData::default());
        }
    };

    let field = |tag: Tag| exif.get_field(tag, In::PRIMARY);

    let capture_date = field(Tag::DateTimeOriginal)
        .and_then(date_time)
        .or_else(|| field(Tag::DateTime).and_then(date_time));

    Ok(ExifData {
        capture_date,
        camera_model: field(Tag::Model).and_then(ascii),
        lens_model: field(Tag::LensModel).and_then(ascii),
        iso: field(Tag::PhotographicSensitivity).and_then(|f| f.value.get_uint(0)),
        aperture: field(Tag::FNumber).and_then(rational),
        shutter_speed: field(Tag::ExposureTime).map(|f| f.display_value().to_string()),
        focal_length: field(Tag::FocalLength).and_then(rational),
    })
}

fn ascii(field: &Field) -> Option<String> {
    match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches(char::from(0)).trim().to_string())
            .filter(|text| !text.is_empty()),
        _ => None,
    }
}

fn rational(field: &Field) -> Option<f64> {
    match &field.value {
        Value::Rational(values) => values
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| r.to_f64()),
        _ => None,
    }
}

fn date_time(field: &Field) -> Option<NaiveDateTime> {
    let Value::Ascii(values) = &field.value else {
        return None;
    };
    let parsed = ExifDateTime::from_ascii(values.first()?).ok()?;

    NaiveDate::from_ymd_opt(parsed.year.into(), parsed.month.into(), parsed.day.into())?
        .and_hms_opt(parsed.hour.into(), parsed.minute.into(), parsed.second.into())
}
