//! Test fixtures: synthetic JPEGs with hand-built EXIF APP1 segments.
//!
//! The TIFF block is assembled byte by byte so tests control exactly
//! which tags are present. Layout: IFD0 (Make, Model, Orientation,
//! ExifIFD pointer, GPS pointer) and an ExifIFD (DateTimeOriginal,
//! exposure tags), with out-of-line values in a trailing value area.

use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Declarative description of the EXIF content for one fixture.
#[derive(Debug, Default, Clone)]
pub struct ExifSpec {
    /// "YYYY:MM:DD HH:MM:SS"
    pub datetime: Option<String>,
    /// "+HH:MM" / "-HH:MM"
    pub offset_time: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens_model: Option<String>,
    pub orientation: Option<u16>,
    pub iso: Option<u16>,
    /// f-number as a rational, e.g. (28, 10) for f/2.8
    pub fnumber: Option<(u32, u32)>,
    /// exposure time as a rational, e.g. (1, 250)
    pub exposure: Option<(u32, u32)>,
    /// focal length as a rational, e.g. (50, 1)
    pub focal: Option<(u32, u32)>,
    pub focal_35mm: Option<u16>,
    pub flash: Option<u16>,
    /// decimal degrees; sign selects the hemisphere reference
    pub gps: Option<(f64, f64)>,
}

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

struct Entry {
    tag: u16,
    typ: u16,
    count: u32,
    payload: Vec<u8>,
}

fn ascii_entry(tag: u16, s: &str) -> Entry {
    let mut payload = s.as_bytes().to_vec();
    payload.push(0);
    Entry {
        tag,
        typ: TYPE_ASCII,
        count: payload.len() as u32,
        payload,
    }
}

fn short_entry(tag: u16, v: u16) -> Entry {
    Entry {
        tag,
        typ: TYPE_SHORT,
        count: 1,
        payload: v.to_le_bytes().to_vec(),
    }
}

fn long_entry(tag: u16, v: u32) -> Entry {
    Entry {
        tag,
        typ: TYPE_LONG,
        count: 1,
        payload: v.to_le_bytes().to_vec(),
    }
}

fn rational_entry(tag: u16, num: u32, den: u32) -> Entry {
    let mut payload = num.to_le_bytes().to_vec();
    payload.extend_from_slice(&den.to_le_bytes());
    Entry {
        tag,
        typ: TYPE_RATIONAL,
        count: 1,
        payload,
    }
}

/// Degrees/minutes/seconds triple for a GPS coordinate.
fn dms_entry(tag: u16, decimal_degrees: f64) -> Entry {
    let abs = decimal_degrees.abs();
    let degrees = abs.trunc() as u32;
    let minutes = (abs * 60.0).trunc() as u32 % 60;
    let seconds_x100 = ((abs * 3600.0 - (degrees * 3600 + minutes * 60) as f64) * 100.0)
        .round()
        .max(0.0) as u32;
    let mut payload = Vec::with_capacity(24);
    for (num, den) in [(degrees, 1u32), (minutes, 1), (seconds_x100, 100)] {
        payload.extend_from_slice(&num.to_le_bytes());
        payload.extend_from_slice(&den.to_le_bytes());
    }
    Entry {
        tag,
        typ: TYPE_RATIONAL,
        count: 3,
        payload,
    }
}

/// Serialise one IFD. Out-of-line values are appended to `value_area`,
/// whose first byte sits at `value_area_offset`.
fn write_ifd(
    entries: &mut [Entry],
    value_area_offset: u32,
    value_area: &mut Vec<u8>,
) -> Vec<u8> {
    entries.sort_by_key(|e| e.tag);
    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for e in entries.iter() {
        out.extend_from_slice(&e.tag.to_le_bytes());
        out.extend_from_slice(&e.typ.to_le_bytes());
        out.extend_from_slice(&e.count.to_le_bytes());
        if e.payload.len() <= 4 {
            let mut inline = e.payload.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            let offset = value_area_offset + value_area.len() as u32;
            out.extend_from_slice(&offset.to_le_bytes());
            value_area.extend_from_slice(&e.payload);
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // next-IFD pointer
    debug_assert_eq!(out.len(), 2 + 12 * entries.len() + 4);
    out
}

/// Build the TIFF payload of an APP1 segment for `spec`.
fn build_tiff(spec: &ExifSpec) -> Vec<u8> {
    let mut ifd0: Vec<Entry> = Vec::new();
    if let Some(s) = &spec.make {
        ifd0.push(ascii_entry(0x010F, s));
    }
    if let Some(s) = &spec.model {
        ifd0.push(ascii_entry(0x0110, s));
    }
    if let Some(o) = spec.orientation {
        ifd0.push(short_entry(0x0112, o));
    }

    let mut exif_ifd: Vec<Entry> = Vec::new();
    if let Some((n, d)) = spec.exposure {
        exif_ifd.push(rational_entry(0x829A, n, d));
    }
    if let Some((n, d)) = spec.fnumber {
        exif_ifd.push(rational_entry(0x829D, n, d));
    }
    if let Some(v) = spec.iso {
        exif_ifd.push(short_entry(0x8827, v));
    }
    if let Some(s) = &spec.datetime {
        exif_ifd.push(ascii_entry(0x9003, s));
    }
    if let Some(s) = &spec.offset_time {
        exif_ifd.push(ascii_entry(0x9011, s));
    }
    if let Some(v) = spec.flash {
        exif_ifd.push(short_entry(0x9209, v));
    }
    if let Some((n, d)) = spec.focal {
        exif_ifd.push(rational_entry(0x920A, n, d));
    }
    if let Some(v) = spec.focal_35mm {
        exif_ifd.push(short_entry(0xA405, v));
    }
    if let Some(s) = &spec.lens_model {
        exif_ifd.push(ascii_entry(0xA434, s));
    }

    let mut gps_ifd: Vec<Entry> = Vec::new();
    if let Some((lat, lon)) = spec.gps {
        gps_ifd.push(ascii_entry(0x0001, if lat < 0.0 { "S" } else { "N" }));
        gps_ifd.push(dms_entry(0x0002, lat));
        gps_ifd.push(ascii_entry(0x0003, if lon < 0.0 { "W" } else { "E" }));
        gps_ifd.push(dms_entry(0x0004, lon));
    }

    let has_exif_ifd = !exif_ifd.is_empty();
    let has_gps_ifd = !gps_ifd.is_empty();
    let ifd0_count = ifd0.len() + usize::from(has_exif_ifd) + usize::from(has_gps_ifd);
    let ifd0_size = 2 + 12 * ifd0_count + 4;
    let exif_ifd_offset = 8 + ifd0_size as u32;
    let exif_ifd_size = if has_exif_ifd {
        2 + 12 * exif_ifd.len() + 4
    } else {
        0
    };
    let gps_ifd_offset = exif_ifd_offset + exif_ifd_size as u32;
    let gps_ifd_size = if has_gps_ifd {
        2 + 12 * gps_ifd.len() + 4
    } else {
        0
    };
    let value_area_offset = gps_ifd_offset + gps_ifd_size as u32;

    if has_exif_ifd {
        ifd0.push(long_entry(0x8769, exif_ifd_offset));
    }
    if has_gps_ifd {
        ifd0.push(long_entry(0x8825, gps_ifd_offset));
    }

    let mut value_area = Vec::new();
    let ifd0_bytes = write_ifd(&mut ifd0, value_area_offset, &mut value_area);
    let exif_bytes = if has_exif_ifd {
        write_ifd(&mut exif_ifd, value_area_offset, &mut value_area)
    } else {
        Vec::new()
    };
    let gps_bytes = if has_gps_ifd {
        write_ifd(&mut gps_ifd, value_area_offset, &mut value_area)
    } else {
        Vec::new()
    };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&[0x2A, 0x00]);
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&ifd0_bytes);
    tiff.extend_from_slice(&exif_bytes);
    tiff.extend_from_slice(&gps_bytes);
    debug_assert_eq!(tiff.len() as u32, value_area_offset);
    tiff.extend_from_slice(&value_area);
    tiff
}

/// A decodable JPEG with the given pixel size, pixel seed, and EXIF.
pub fn jpeg_with_exif(width: u32, height: u32, seed: u8, spec: &ExifSpec) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x / 4) as u8).wrapping_add(seed),
            ((y / 4) as u8).wrapping_mul(seed | 1),
            seed,
        ])
    }));
    let mut plain = Vec::new();
    img.write_to(&mut Cursor::new(&mut plain), image::ImageFormat::Jpeg)
        .unwrap();

    // Splice the APP1 segment directly after the SOI marker.
    let mut app1_data = b"Exif\x00\x00".to_vec();
    app1_data.extend_from_slice(&build_tiff(spec));
    let app1_len = (app1_data.len() + 2) as u16;

    let mut out = Vec::with_capacity(plain.len() + app1_data.len() + 4);
    out.extend_from_slice(&plain[..2]); // SOI
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&app1_len.to_be_bytes());
    out.extend_from_slice(&app1_data);
    out.extend_from_slice(&plain[2..]);
    out
}

pub fn write_jpeg_with_exif(path: &Path, width: u32, height: u32, seed: u8, spec: &ExifSpec) {
    std::fs::write(path, jpeg_with_exif(width, height, seed, spec)).unwrap();
}

/// The canonical Canon EOS R5 frame used as a fixture across the suite.
pub fn canon_r5_spec() -> ExifSpec {
    ExifSpec {
        datetime: Some("2024:10:15 14:22:00".into()),
        make: Some("Canon".into()),
        model: Some("EOS R5".into()),
        iso: Some(400),
        fnumber: Some((28, 10)),
        focal: Some((50, 1)),
        ..Default::default()
    }
}
