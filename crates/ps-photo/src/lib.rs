//! Photo Integrity Primitives
//!
//! This crate turns raw camera captures into [`VerifiedPhotoData`] envelopes:
//! a content hash binding the record to the exact bytes photographed, a
//! capture timestamp recovered from EXIF where possible, and a GPS
//! attestation against the geocoded property. The envelope is the unit of
//! evidence the inspection store and report compiler build on.

pub mod exif;
pub mod geo;
pub mod hash;

pub use exif::{
    decode_exif_fields, extract_timestamp, parse_exif_datetime, ExifFields, ExifTimestamp,
};
pub use geo::{attest_location, haversine_distance_metres, GpsReading, LOCATION_THRESHOLD_METRES};
pub use hash::{hash_bytes, hash_file};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("unreadable photo {uri}: {source}")]
    Unreadable {
        uri: String,
        source: std::io::Error,
    },
}

pub type PhotoResult<T> = Result<T, PhotoError>;

/// How a photo entered the system. Authoritative for the verification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    CameraCapture,
    GalleryImport,
    Unknown,
}

/// Framing hint chosen at capture time. Recorded but never validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionGuide {
    RoomOverview,
    Wall,
    Corner,
    Floor,
    Ceiling,
    Fixture,
    None,
}

/// Confidence level of a photo's evidentiary value.
///
/// Ordered so that a stronger tier compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationTier {
    Unverified,
    Verified,
    VerifiedGps,
}

impl VerificationTier {
    /// Plain-ASCII badge text; the PDF renderer cannot be trusted with emoji.
    pub fn label(&self) -> &'static str {
        match self {
            VerificationTier::VerifiedGps => "VERIFIED + GPS",
            VerificationTier::Verified => "VERIFIED",
            VerificationTier::Unverified => "UNVERIFIED",
        }
    }
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The integrity envelope of one photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPhotoData {
    /// Externally-owned blob the envelope describes. Never dereferenced for
    /// lifetime management, only for hashing and rendering.
    pub photo_uri: String,
    /// EXIF capture instant, when one was recoverable.
    pub capture_date: Option<NaiveDateTime>,
    pub is_exif_available: bool,
    /// Wall-clock time the system first observed the file.
    pub upload_date: DateTime<Utc>,
    pub verification_method: VerificationMethod,
    /// SHA-256 hex digest of the photo's full byte stream.
    pub photo_hash: String,
    pub gps: Option<GpsReading>,
    /// True iff GPS was present, the property was geocoded, and the capture
    /// point lies within the attestation threshold.
    pub location_verified: bool,
    pub composition_guide: Option<CompositionGuide>,
}

impl VerifiedPhotoData {
    /// Derive the verification tier from the envelope.
    pub fn tier(&self) -> VerificationTier {
        let from_camera = self.verification_method == VerificationMethod::CameraCapture;
        if from_camera && self.location_verified {
            VerificationTier::VerifiedGps
        } else if from_camera || self.is_exif_available {
            VerificationTier::Verified
        } else {
            VerificationTier::Unverified
        }
    }
}

/// Composes hashing, EXIF extraction, and GPS attestation into envelopes.
#[derive(Debug, Default)]
pub struct PhotoVerifier;

impl PhotoVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Build the integrity envelope for one capture.
    ///
    /// `exif_bytes` is the raw EXIF payload from the capture collaborator,
    /// when one was present. EXIF and GPS degradation are non-fatal and only
    /// lower the tier. A hash failure rejects the photo outright: an unhashed
    /// photo cannot enter the evidence chain.
    pub async fn create_verified(
        &self,
        photo_uri: &str,
        method: VerificationMethod,
        exif_bytes: Option<&[u8]>,
        gps: Option<GpsReading>,
        property_coords: Option<(f64, f64)>,
        composition_guide: Option<CompositionGuide>,
    ) -> PhotoResult<VerifiedPhotoData> {
        let photo_hash = hash_file(local_path(photo_uri)).await?;

        let fields = exif_bytes.and_then(decode_exif_fields);
        let timestamp = extract_timestamp(fields.as_ref());
        let location_verified = attest_location(gps.as_ref(), property_coords);

        debug!(
            uri = photo_uri,
            exif = timestamp.is_exif_available,
            location_verified,
            "verified photo envelope created"
        );

        Ok(VerifiedPhotoData {
            photo_uri: photo_uri.to_string(),
            capture_date: timestamp.capture_date,
            is_exif_available: timestamp.is_exif_available,
            upload_date: timestamp.upload_date,
            verification_method: method,
            photo_hash,
            gps,
            location_verified,
            composition_guide,
        })
    }
}

/// Map a photo URI to a local filesystem path.
///
/// Capture collaborators hand over either bare paths or `file://` URIs.
pub fn local_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("file://").unwrap_or(uri))
}
