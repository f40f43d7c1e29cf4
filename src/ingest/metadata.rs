//! EXIF metadata extraction.
//!
//! kamadak-exif reads every TIFF-based container (JPEG, TIFF, and the
//! TIFF-derived raw formats); rawler's metadata path is the fallback
//! for raw files kamadak cannot parse. Extraction never hard-fails:
//! malformed fields become None plus a warning, a missing or garbage
//! file yields an anonymous record.

use std::path::Path;

/// Everything EXIF can contribute to a photo record, plus the warnings
/// accumulated while reading it.
#[derive(Debug, Default, Clone)]
pub struct PhotoMetadata {
    pub capture_time: Option<chrono::NaiveDateTime>,
    /// true when no UTC offset was present and the timestamp is
    /// camera-local
    pub time_is_naive_local: bool,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub orientation: Option<u16>,
    pub iso: Option<u32>,
    pub aperture: Option<f64>,
    pub shutter: Option<String>,
    pub focal_mm: Option<f64>,
    pub focal_35mm: Option<f64>,
    pub flash_fired: Option<bool>,
    pub white_balance: Option<String>,
    pub color_space: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub warnings: Vec<String>,
}

/// Extract metadata from any supported container. Never panics.
pub fn extract_metadata(path: &Path) -> PhotoMetadata {
    match std::panic::catch_unwind(|| extract_inner(path)) {
        Ok(meta) => meta,
        Err(_) => {
            tracing::warn!("panic in extract_metadata for {:?}", path);
            PhotoMetadata::default()
        }
    }
}

fn extract_inner(path: &Path) -> PhotoMetadata {
    let mut meta = PhotoMetadata::default();

    let parsed = std::fs::File::open(path)
        .map_err(|e| e.to_string())
        .and_then(|file| {
            let mut reader = std::io::BufReader::new(file);
            exif::Reader::new()
                .read_from_container(&mut reader)
                .map_err(|e| e.to_string())
        });

    match parsed {
        Ok(exif) => fill_from_exif(&mut meta, &exif),
        Err(e) => {
            tracing::debug!("no EXIF in {:?}: {}", path, e);
            if crate::decode::sniff_format(path) == Some(crate::decode::FileKind::Raw) {
                fill_from_rawler(&mut meta, path);
            }
        }
    }

    meta
}

fn fill_from_exif(meta: &mut PhotoMetadata, exif: &exif::Exif) {
    let (time, naive) = read_capture_time(meta, exif);
    meta.capture_time = time;
    meta.time_is_naive_local = naive;

    meta.camera_make = read_ascii(exif, exif::Tag::Make);
    meta.camera_model = read_ascii(exif, exif::Tag::Model);
    meta.lens_make = read_ascii(exif, exif::Tag::LensMake);
    meta.lens_model = read_ascii(exif, exif::Tag::LensModel);
    meta.orientation = read_short(exif, exif::Tag::Orientation).filter(|o| (1..=8).contains(o));

    meta.iso = read_short(exif, exif::Tag::PhotographicSensitivity).map(|v| v as u32);
    meta.aperture = read_rational(exif, exif::Tag::FNumber);
    meta.shutter = read_shutter(exif);
    meta.focal_mm = read_rational(exif, exif::Tag::FocalLength);
    meta.focal_35mm = read_short(exif, exif::Tag::FocalLengthIn35mmFilm)
        .filter(|&v| v > 0)
        .map(|v| v as f64);

    // Flash tag bit 0 is "flash fired".
    meta.flash_fired = read_short(exif, exif::Tag::Flash).map(|v| v & 1 == 1);

    meta.white_balance = read_short(exif, exif::Tag::WhiteBalance).map(|v| match v {
        0 => "auto".to_string(),
        1 => "manual".to_string(),
        other => other.to_string(),
    });
    meta.color_space = read_short(exif, exif::Tag::ColorSpace).map(|v| match v {
        1 => "srgb".to_string(),
        65535 => "uncalibrated".to_string(),
        other => other.to_string(),
    });

    read_gps(meta, exif);
}

// ── field readers ─────────────────────────────────────────────────────────

fn read_capture_time(
    meta: &mut PhotoMetadata,
    exif: &exif::Exif,
) -> (Option<chrono::NaiveDateTime>, bool) {
    let Some(raw) = read_ascii_raw(exif, exif::Tag::DateTimeOriginal) else {
        return (None, false);
    };
    let Some(local) = parse_exif_datetime(&raw) else {
        meta.warnings
            .push(format!("malformed DateTimeOriginal: {:?}", raw));
        return (None, false);
    };

    // OffsetTimeOriginal like "+02:00": convert camera-local to UTC.
    if let Some(offset_str) = read_ascii_raw(exif, exif::Tag::OffsetTimeOriginal) {
        if let Some(offset_minutes) = parse_utc_offset(&offset_str) {
            let utc = local - chrono::Duration::minutes(offset_minutes);
            return (Some(utc), false);
        }
        meta.warnings
            .push(format!("malformed OffsetTimeOriginal: {:?}", offset_str));
    }
    // No offset available: keep camera-local time, tagged as naive.
    (Some(local), true)
}

/// EXIF datetime format: "YYYY:MM:DD HH:MM:SS"
pub fn parse_exif_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    let s = s.trim();
    if s.len() < 19 {
        return None;
    }
    let date = s[..10].replace(':', "-");
    let normalized = format!("{} {}", date, &s[11..19]);
    chrono::NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()
}

/// "+HH:MM" / "-HH:MM" to signed minutes.
pub fn parse_utc_offset(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1i64, &s[1..]),
        b'-' => (-1i64, &s[1..]),
        _ => return None,
    };
    let (h, m) = rest.split_once(':')?;
    let hours: i64 = h.parse().ok()?;
    let minutes: i64 = m.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

fn read_ascii_raw(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => vecs
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn read_ascii(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    read_ascii_raw(exif, tag)
        .map(|s| s.trim().trim_matches('\0').to_string())
        .filter(|s| !s.is_empty())
}

fn read_short(exif: &exif::Exif, tag: exif::Tag) -> Option<u16> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(v) => v.first().copied(),
        exif::Value::Long(v) => v.first().map(|&l| l as u16),
        _ => None,
    }
}

fn read_rational(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        _ => None,
    }
}

/// ExposureTime preserved as a display string: "1/250" for fractions,
/// decimal seconds otherwise.
fn read_shutter(exif: &exif::Exif) -> Option<String> {
    let field = exif.get_field(exif::Tag::ExposureTime, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| {
            if r.num < r.denom && r.num > 0 {
                format!("1/{}", (r.denom as f64 / r.num as f64).round() as u32)
            } else {
                let secs = r.to_f64();
                if secs.fract() == 0.0 {
                    format!("{}", secs as u64)
                } else {
                    format!("{:.1}", secs)
                }
            }
        }),
        _ => None,
    }
}

fn read_gps(meta: &mut PhotoMetadata, exif: &exif::Exif) {
    let lat = read_dms(exif, exif::Tag::GPSLatitude);
    let lat_ref = read_ascii(exif, exif::Tag::GPSLatitudeRef);
    let lon = read_dms(exif, exif::Tag::GPSLongitude);
    let lon_ref = read_ascii(exif, exif::Tag::GPSLongitudeRef);

    meta.latitude = match (lat, lat_ref.as_deref()) {
        (Some(v), Some("S")) => Some(-v),
        (Some(v), Some("N")) | (Some(v), None) => Some(v),
        (Some(_), Some(other)) => {
            meta.warnings
                .push(format!("unexpected GPSLatitudeRef: {:?}", other));
            None
        }
        (None, _) => None,
    };
    meta.longitude = match (lon, lon_ref.as_deref()) {
        (Some(v), Some("W")) => Some(-v),
        (Some(v), Some("E")) | (Some(v), None) => Some(v),
        (Some(_), Some(other)) => {
            meta.warnings
                .push(format!("unexpected GPSLongitudeRef: {:?}", other));
            None
        }
        (None, _) => None,
    };

    // Altitude ref 1 means below sea level.
    let altitude = {
        let field = exif.get_field(exif::Tag::GPSAltitude, exif::In::PRIMARY);
        field.and_then(|f| match &f.value {
            exif::Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
            _ => None,
        })
    };
    let below = exif
        .get_field(exif::Tag::GPSAltitudeRef, exif::In::PRIMARY)
        .map(|f| matches!(&f.value, exif::Value::Byte(v) if v.first() == Some(&1)))
        .unwrap_or(false);
    meta.altitude = altitude.map(|a| if below { -a } else { a });
}

/// GPS coordinate as (degrees, minutes, seconds) rationals to decimal
/// degrees. Returns None (degrading to "no GPS") on malformed values.
fn read_dms(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) if v.len() == 3 => {
            if v.iter().any(|r| r.denom == 0) {
                return None;
            }
            let dd = v[0].to_f64() + v[1].to_f64() / 60.0 + v[2].to_f64() / 3600.0;
            (dd.is_finite() && dd <= 180.0).then_some(dd)
        }
        _ => None,
    }
}

// ── rawler fallback ───────────────────────────────────────────────────────

/// Raw containers kamadak cannot parse (CR3 and friends) still carry
/// the core fields through rawler's metadata path.
fn fill_from_rawler(meta: &mut PhotoMetadata, path: &Path) {
    let Ok(rawfile) = rawler::rawsource::RawSource::new(path) else {
        return;
    };
    let Ok(decoder) = rawler::get_decoder(&rawfile) else {
        return;
    };
    let params = rawler::decoders::RawDecodeParams { image_index: 0 };
    let Ok(raw_meta) = decoder.raw_metadata(&rawfile, &params) else {
        return;
    };

    meta.capture_time = raw_meta
        .exif
        .date_time_original
        .as_deref()
        .and_then(parse_exif_datetime);
    meta.time_is_naive_local = meta.capture_time.is_some();

    let make = raw_meta.make.trim().to_string();
    let model = raw_meta.model.trim().to_string();
    meta.camera_make = (!make.is_empty()).then_some(make);
    meta.camera_model = (!model.is_empty()).then_some(model);
    meta.lens_model = raw_meta
        .exif
        .lens_model
        .as_deref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    meta.orientation = raw_meta.exif.orientation.filter(|o| (1..=8).contains(o));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let meta = extract_metadata(Path::new("/nonexistent/photo.jpg"));
        assert!(meta.capture_time.is_none());
        assert!(meta.camera_make.is_none());
        assert!(meta.latitude.is_none());
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corrupt.jpg");
        std::fs::write(&path, b"garbage, not a jpeg").unwrap();
        let meta = extract_metadata(&path);
        assert!(meta.capture_time.is_none());
    }

    #[test]
    fn test_parse_exif_datetime_valid() {
        let dt = parse_exif_datetime("2024:10:15 14:22:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-10-15 14:22:00");
    }

    #[test]
    fn test_parse_exif_datetime_invalid() {
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("").is_none());
        assert!(parse_exif_datetime("2024:13:45 99:99:99").is_none());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+02:00"), Some(120));
        assert_eq!(parse_utc_offset("-05:30"), Some(-330));
        assert_eq!(parse_utc_offset("02:00"), None);
        assert_eq!(parse_utc_offset("+99:00"), None);
    }

    #[test]
    fn test_synthetic_jpeg_has_no_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plain.jpg");
        image::DynamicImage::new_rgb8(32, 32).save(&path).unwrap();
        let meta = extract_metadata(&path);
        assert!(meta.capture_time.is_none());
        assert!(meta.camera_model.is_none());
        assert!(meta.orientation.is_none());
    }
}
