//! EXIF metadata extraction
//!
//! The exif kind is a local parse rather than a fan-out: the uploaded image
//! never leaves the process. This walks JPEG segments to the APP1 EXIF blob,
//! reads the TIFF IFDs for the handful of tags the contract needs (camera,
//! software, capture time, GPS), and converts GPS rational triplets to
//! decimal degrees.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ValidationError;

// IFD0 tags
const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;
const TAG_SOFTWARE: u16 = 0x0131;
const TAG_DATETIME: u16 = 0x0132;
const TAG_GPS_IFD: u16 = 0x8825;

// GPS IFD tags
const TAG_GPS_LAT_REF: u16 = 0x0001;
const TAG_GPS_LAT: u16 = 0x0002;
const TAG_GPS_LON_REF: u16 = 0x0003;
const TAG_GPS_LON: u16 = 0x0004;

/// Everything extracted from one uploaded image
#[derive(Debug, Clone, Serialize)]
pub struct ExifSummary {
    pub filename: String,
    pub file_info: FileInfo,
    pub exif_found: bool,
    pub metadata: BTreeMap<String, String>,
    pub camera_info: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsInfo>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub format: String,
    /// "WxH"
    pub size: String,
    pub width: u32,
    pub height: u32,
    pub file_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpsInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub coordinates: String,
    pub google_maps_url: String,
}

/// Extract metadata from an uploaded image
pub fn extract(filename: &str, data: &[u8]) -> Result<ExifSummary, ValidationError> {
    let unreadable = |reason: &str| ValidationError::UnreadableImage {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    if data.len() < 12 {
        return Err(unreadable("file too small to be an image"));
    }

    let (format, dimensions, tiff) = if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        let (dims, tiff) = scan_jpeg(data);
        ("JPEG", dims, tiff)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        ("PNG", png_dimensions(data), None)
    } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        ("TIFF", None, Some(data.to_vec()))
    } else {
        return Err(unreadable("unrecognized image format"));
    };

    let (width, height) = dimensions.unwrap_or((0, 0));
    let mut summary = ExifSummary {
        filename: filename.to_string(),
        file_info: FileInfo {
            format: format.to_string(),
            size: format!("{width}x{height}"),
            width,
            height,
            file_size_bytes: data.len(),
        },
        exif_found: false,
        metadata: BTreeMap::new(),
        camera_info: BTreeMap::new(),
        gps: None,
        warnings: Vec::new(),
    };

    if let Some(tiff) = tiff {
        if let Some(parsed) = parse_tiff(&tiff) {
            summary.exif_found = !parsed.tags.is_empty() || parsed.gps.is_some();
            for (name, value) in &parsed.tags {
                summary.metadata.insert(name.to_string(), value.clone());
                if matches!(*name, "Make" | "Model") {
                    summary.camera_info.insert(name.to_string(), value.clone());
                }
            }
            summary.gps = parsed.gps;
        }
    }

    if summary.gps.is_some() {
        summary
            .warnings
            .push("GPS coordinates found - exact location is exposed".to_string());
    }
    if summary.metadata.contains_key("Make") || summary.metadata.contains_key("Model") {
        summary
            .warnings
            .push("Camera/device information is present".to_string());
    }
    if summary.metadata.contains_key("DateTime") {
        summary
            .warnings
            .push("Original capture date/time is recorded".to_string());
    }
    if summary.metadata.contains_key("Software") {
        summary
            .warnings
            .push("Software information is present".to_string());
    }
    if !summary.exif_found {
        summary
            .warnings
            .push("No EXIF data found - image is clean".to_string());
    }

    Ok(summary)
}

/// Walk JPEG segments collecting dimensions (SOF) and the EXIF TIFF blob
/// (APP1)
fn scan_jpeg(data: &[u8]) -> (Option<(u32, u32)>, Option<Vec<u8>>) {
    let mut dimensions = None;
    let mut tiff = None;

    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        match marker {
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            // EOI / start of entropy-coded data: nothing else to scan.
            0xD9 | 0xDA => break,
            _ => {}
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 || i + 2 + length > data.len() {
            break;
        }
        let payload = &data[i + 4..i + 2 + length];

        if marker == 0xE1 && payload.starts_with(b"Exif\0\0") {
            tiff = Some(payload[6..].to_vec());
        }

        // Baseline/progressive frame headers carry the pixel dimensions.
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof && payload.len() >= 5 {
            let height = u16::from_be_bytes([payload[1], payload[2]]) as u32;
            let width = u16::from_be_bytes([payload[3], payload[4]]) as u32;
            dimensions = Some((width, height));
        }

        i += 2 + length;
    }

    (dimensions, tiff)
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // 8-byte signature, 4-byte length, "IHDR", then width/height.
    if data.len() < 24 || &data[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some((width, height))
}

struct ParsedTiff {
    tags: Vec<(&'static str, String)>,
    gps: Option<GpsInfo>,
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn parse_tiff(tiff: &[u8]) -> Option<ParsedTiff> {
    let endian = match tiff.get(..2)? {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return None,
    };
    if read_u16(tiff, 2, endian)? != 42 {
        return None;
    }

    let ifd0 = read_u32(tiff, 4, endian)? as usize;
    let mut tags = Vec::new();
    let mut gps_offset = None;

    for entry in ifd_entries(tiff, ifd0, endian)? {
        match entry.tag {
            TAG_MAKE => push_ascii(&mut tags, "Make", tiff, &entry, endian),
            TAG_MODEL => push_ascii(&mut tags, "Model", tiff, &entry, endian),
            TAG_SOFTWARE => push_ascii(&mut tags, "Software", tiff, &entry, endian),
            TAG_DATETIME => push_ascii(&mut tags, "DateTime", tiff, &entry, endian),
            TAG_GPS_IFD => gps_offset = Some(entry.value_u32 as usize),
            _ => {}
        }
    }

    let gps = gps_offset.and_then(|offset| parse_gps_ifd(tiff, offset, endian));

    Some(ParsedTiff { tags, gps })
}

fn parse_gps_ifd(tiff: &[u8], offset: usize, endian: Endian) -> Option<GpsInfo> {
    let mut lat_ref = None;
    let mut lon_ref = None;
    let mut lat = None;
    let mut lon = None;

    for entry in ifd_entries(tiff, offset, endian)? {
        match entry.tag {
            TAG_GPS_LAT_REF => lat_ref = read_ascii(tiff, &entry, endian),
            TAG_GPS_LON_REF => lon_ref = read_ascii(tiff, &entry, endian),
            TAG_GPS_LAT => lat = read_rational_triplet(tiff, &entry, endian),
            TAG_GPS_LON => lon = read_rational_triplet(tiff, &entry, endian),
            _ => {}
        }
    }

    let mut latitude = to_degrees(lat?);
    if lat_ref.as_deref() != Some("N") {
        latitude = -latitude;
    }
    let mut longitude = to_degrees(lon?);
    if lon_ref.as_deref() != Some("E") {
        longitude = -longitude;
    }

    Some(GpsInfo {
        latitude,
        longitude,
        coordinates: format!("{latitude:.6}, {longitude:.6}"),
        google_maps_url: format!("https://www.google.com/maps?q={latitude:.6},{longitude:.6}"),
    })
}

fn to_degrees((d, m, s): (f64, f64, f64)) -> f64 {
    d + m / 60.0 + s / 3600.0
}

struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Raw value bytes (inline when they fit in 4 bytes)
    value_offset: usize,
    value_u32: u32,
}

fn ifd_entries(tiff: &[u8], offset: usize, endian: Endian) -> Option<Vec<IfdEntry>> {
    let count = read_u16(tiff, offset, endian)? as usize;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = offset + 2 + i * 12;
        entries.push(IfdEntry {
            tag: read_u16(tiff, base, endian)?,
            field_type: read_u16(tiff, base + 2, endian)?,
            count: read_u32(tiff, base + 4, endian)?,
            value_offset: base + 8,
            value_u32: read_u32(tiff, base + 8, endian)?,
        });
    }
    Some(entries)
}

fn push_ascii(
    tags: &mut Vec<(&'static str, String)>,
    name: &'static str,
    tiff: &[u8],
    entry: &IfdEntry,
    endian: Endian,
) {
    if let Some(value) = read_ascii(tiff, entry, endian) {
        tags.push((name, value));
    }
}

/// ASCII tag value; inline when it fits in the 4 value bytes, otherwise at
/// the recorded offset
fn read_ascii(tiff: &[u8], entry: &IfdEntry, _endian: Endian) -> Option<String> {
    if entry.field_type != 2 {
        return None;
    }
    let count = entry.count as usize;
    let start = if count <= 4 {
        entry.value_offset
    } else {
        entry.value_u32 as usize
    };
    let raw = tiff.get(start..start + count)?;
    let text: String = raw
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Degrees/minutes/seconds, each an unsigned rational at the entry's offset
fn read_rational_triplet(tiff: &[u8], entry: &IfdEntry, endian: Endian) -> Option<(f64, f64, f64)> {
    if entry.field_type != 5 || entry.count < 3 {
        return None;
    }
    let base = entry.value_u32 as usize;
    let mut parts = [0.0f64; 3];
    for (i, part) in parts.iter_mut().enumerate() {
        let numerator = read_u32(tiff, base + i * 8, endian)? as f64;
        let denominator = read_u32(tiff, base + i * 8 + 4, endian)? as f64;
        if denominator == 0.0 {
            return None;
        }
        *part = numerator / denominator;
    }
    Some((parts[0], parts[1], parts[2]))
}

fn read_u16(data: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(bytes),
        Endian::Big => u16::from_be_bytes(bytes),
    })
}

fn read_u32(data: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(bytes),
        Endian::Big => u32::from_be_bytes(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u16_le(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_u32_le(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Little-endian TIFF with Make + GPS IFD (40°26'46"N, 79°58'56"E)
    fn synthetic_tiff() -> Vec<u8> {
        // Layout: header 0..8, IFD0 8..38, GPS IFD 38..92, "Canon\0" 92..98,
        // latitude rationals 98..122, longitude rationals 122..146.
        let mut t = Vec::new();
        t.extend_from_slice(b"II");
        push_u16_le(&mut t, 42);
        push_u32_le(&mut t, 8);

        // IFD0: Make (ASCII, at offset 92) + GPS pointer (LONG, 38).
        push_u16_le(&mut t, 2);
        push_u16_le(&mut t, TAG_MAKE);
        push_u16_le(&mut t, 2);
        push_u32_le(&mut t, 6);
        push_u32_le(&mut t, 92);
        push_u16_le(&mut t, TAG_GPS_IFD);
        push_u16_le(&mut t, 4);
        push_u32_le(&mut t, 1);
        push_u32_le(&mut t, 38);
        push_u32_le(&mut t, 0);

        // GPS IFD: refs inline, rationals at 98 and 122.
        push_u16_le(&mut t, 4);
        push_u16_le(&mut t, TAG_GPS_LAT_REF);
        push_u16_le(&mut t, 2);
        push_u32_le(&mut t, 2);
        t.extend_from_slice(b"N\0\0\0");
        push_u16_le(&mut t, TAG_GPS_LAT);
        push_u16_le(&mut t, 5);
        push_u32_le(&mut t, 3);
        push_u32_le(&mut t, 98);
        push_u16_le(&mut t, TAG_GPS_LON_REF);
        push_u16_le(&mut t, 2);
        push_u32_le(&mut t, 2);
        t.extend_from_slice(b"E\0\0\0");
        push_u16_le(&mut t, TAG_GPS_LON);
        push_u16_le(&mut t, 5);
        push_u32_le(&mut t, 3);
        push_u32_le(&mut t, 122);
        push_u32_le(&mut t, 0);

        t.extend_from_slice(b"Canon\0");
        for (num, den) in [(40u32, 1u32), (26, 1), (46, 1)] {
            push_u32_le(&mut t, num);
            push_u32_le(&mut t, den);
        }
        for (num, den) in [(79u32, 1u32), (58, 1), (56, 1)] {
            push_u32_le(&mut t, num);
            push_u32_le(&mut t, den);
        }
        t
    }

    fn synthetic_jpeg() -> Vec<u8> {
        let tiff = synthetic_tiff();
        let mut jpeg = vec![0xFF, 0xD8];

        // APP1 with the EXIF blob.
        jpeg.extend_from_slice(&[0xFF, 0xE1]);
        let app1_len = (2 + 6 + tiff.len()) as u16;
        jpeg.extend_from_slice(&app1_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);

        // SOF0, 640x480, 3 components.
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        jpeg.extend_from_slice(&480u16.to_be_bytes());
        jpeg.extend_from_slice(&640u16.to_be_bytes());
        jpeg.extend_from_slice(&[0x03, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);

        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_jpeg_with_gps() {
        let summary = extract("photo.jpg", &synthetic_jpeg()).unwrap();

        assert_eq!(summary.file_info.format, "JPEG");
        assert_eq!(summary.file_info.width, 640);
        assert_eq!(summary.file_info.height, 480);
        assert!(summary.exif_found);
        assert_eq!(summary.camera_info.get("Make").map(String::as_str), Some("Canon"));

        let gps = summary.gps.expect("gps should be present");
        assert!((gps.latitude - 40.446111).abs() < 1e-4);
        assert!((gps.longitude - 79.982222).abs() < 1e-4);
        assert!(gps.google_maps_url.starts_with("https://www.google.com/maps?q="));
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.contains("GPS coordinates found")));
    }

    #[test]
    fn test_png_has_no_exif() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&13u32.to_be_bytes());
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&800u32.to_be_bytes());
        png.extend_from_slice(&600u32.to_be_bytes());
        png.extend_from_slice(&[8, 6, 0, 0, 0]);

        let summary = extract("clean.png", &png).unwrap();
        assert_eq!(summary.file_info.format, "PNG");
        assert_eq!(summary.file_info.size, "800x600");
        assert!(!summary.exif_found);
        assert!(summary.gps.is_none());
        assert!(summary.warnings.iter().any(|w| w.contains("image is clean")));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = extract("not-an-image.txt", b"hello world, definitely text");
        assert!(result.is_err());
    }
}
