//! EXIF timestamp extraction
//!
//! The capture collaborator hands over the photo's raw EXIF payload; the
//! datetime tags are decoded from it here. Capture devices stamp photos with
//! `DateTimeOriginal`; gallery imports and older firmware may only carry
//! `DateTimeDigitized` or `DateTime`. Tags are consulted in that preference
//! order and any decode or parse failure degrades to an upload-time-only
//! record rather than an error.

use ::exif::{In, Reader, Tag, Value};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canonical EXIF datetime format (`YYYY:MM:DD HH:MM:SS`).
const EXIF_COLON_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// Dash variant emitted by some vendors (`YYYY-MM-DD HH:MM:SS`).
const EXIF_DASH_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Pre-normalised ISO-8601 without zone (`YYYY-MM-DDTHH:MM:SS`).
const EXIF_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The datetime tags of interest, decoded from the raw EXIF payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifFields {
    pub date_time_original: Option<String>,
    pub date_time_digitized: Option<String>,
    pub date_time: Option<String>,
}

impl ExifFields {
    /// Build a tag set carrying only `DateTimeOriginal`.
    pub fn with_original(value: impl Into<String>) -> Self {
        Self {
            date_time_original: Some(value.into()),
            ..Self::default()
        }
    }

    /// The first populated tag in preference order.
    fn preferred_tag(&self) -> Option<&str> {
        self.date_time_original
            .as_deref()
            .or(self.date_time_digitized.as_deref())
            .or(self.date_time.as_deref())
    }
}

/// Outcome of timestamp extraction for one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifTimestamp {
    /// Parsed capture instant, when a datetime tag was present and valid.
    pub capture_date: Option<NaiveDateTime>,
    /// True iff `capture_date` came from a successfully parsed tag.
    pub is_exif_available: bool,
    /// Wall-clock time at which the system first observed the file.
    /// Always populated, EXIF or not.
    pub upload_date: DateTime<Utc>,
}

/// Decode the datetime tags from a raw EXIF payload (the TIFF-structured
/// block the capture collaborator hands over).
///
/// `None` when the payload is not decodable EXIF. Decode failure is never
/// fatal for the photo; the envelope simply records no EXIF evidence.
pub fn decode_exif_fields(raw: &[u8]) -> Option<ExifFields> {
    let decoded = match Reader::new().read_raw(raw.to_vec()) {
        Ok(decoded) => decoded,
        Err(error) => {
            debug!(%error, "undecodable EXIF payload");
            return None;
        }
    };

    Some(ExifFields {
        date_time_original: tag_string(&decoded, Tag::DateTimeOriginal),
        date_time_digitized: tag_string(&decoded, Tag::DateTimeDigitized),
        date_time: tag_string(&decoded, Tag::DateTime),
    })
}

fn tag_string(decoded: &::exif::Exif, tag: Tag) -> Option<String> {
    let field = decoded.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(groups) => groups
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
        other => Some(other.display_as(tag).to_string()),
    }
}

/// Parse a single EXIF datetime string.
///
/// Total over all inputs: accepts the colon-separated canonical format, the
/// dash variant, and pre-normalised ISO-8601; everything else is `None`.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in [EXIF_COLON_FORMAT, EXIF_DASH_FORMAT, EXIF_ISO_FORMAT] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    None
}

/// Extract the capture timestamp for a photo from its decoded EXIF tags.
///
/// Missing tags and parse failures are non-fatal: the result records that no
/// EXIF evidence was available and carries only the upload instant.
pub fn extract_timestamp(fields: Option<&ExifFields>) -> ExifTimestamp {
    let upload_date = Utc::now();

    let capture_date = fields
        .and_then(ExifFields::preferred_tag)
        .and_then(parse_exif_datetime);

    if capture_date.is_none() {
        debug!("no usable EXIF datetime tag; falling back to upload date");
    }

    ExifTimestamp {
        is_exif_available: capture_date.is_some(),
        capture_date,
        upload_date,
    }
}

/// Minimal little-endian TIFF EXIF payload carrying only `DateTimeOriginal`.
#[cfg(test)]
pub(crate) fn raw_payload_with_original(datetime: &str) -> Vec<u8> {
    let mut ascii = datetime.as_bytes().to_vec();
    ascii.push(0);
    let count = ascii.len() as u32;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(b"II\x2a\x00");
    buf.extend_from_slice(&8u32.to_le_bytes()); // IFD0 offset

    // IFD0: one entry pointing at the Exif sub-IFD (offset 26).
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&0x8769u16.to_le_bytes()); // ExifIFDPointer
    buf.extend_from_slice(&4u16.to_le_bytes()); // LONG
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&26u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    // Exif sub-IFD: one ASCII DateTimeOriginal entry, value at offset 44.
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&0x9003u16.to_le_bytes()); // DateTimeOriginal
    buf.extend_from_slice(&2u16.to_le_bytes()); // ASCII
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&44u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    buf.extend_from_slice(&ascii);
    buf
}
