//! Phase A/B: materialisation and tier selection
//!
//! Walks the inspection tree into a flat, render-ready model: rooms in
//! first-seen order, checkpoints in insertion order, photos and signature
//! rasters transcoded to base64 data URIs. An unreadable file degrades to a
//! placeholder, never a failure. Tier and timestamp selection happen here so
//! HTML composition stays a pure function of this model.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use ps_core::model::{
    Checkpoint, Condition, Inspection, InspectionStatus, InspectionType, Property, TeamBranding,
};
use ps_photo::VerificationTier;
use std::path::Path;
use tracing::warn;

/// Default brand when no white-label branding is supplied.
pub const DEFAULT_BRAND_NAME: &str = "PropertySnap";

/// Render-ready form of one inspection.
#[derive(Debug, Clone)]
pub struct ReportModel {
    pub property: Property,
    pub inspection_id: String,
    pub inspection_type: InspectionType,
    pub status: InspectionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub brand_name: String,
    /// Custom logo as a data URI, when branding supplied one and it was
    /// readable.
    pub brand_logo: Option<String>,
    /// Property profile photo as a data URI. Never an inspection photo.
    pub cover_photo: Option<String>,
    pub rooms: Vec<RoomSection>,
    pub landlord_signature: Option<SignaturePanel>,
    pub tenant_signature: Option<SignaturePanel>,
}

#[derive(Debug, Clone)]
pub struct RoomSection {
    pub name: String,
    /// False when every checkpoint in the room lacks both photo and
    /// condition; the room is reported "(Not Inspected)".
    pub inspected: bool,
    pub checkpoints: Vec<CheckpointCard>,
}

#[derive(Debug, Clone)]
pub struct CheckpointCard {
    pub title: String,
    /// First populated slot as a data URI; `None` renders the "No photo
    /// provided" placeholder.
    pub photo: Option<String>,
    pub tier: VerificationTier,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    /// Best available timestamp for the watermark.
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct SignaturePanel {
    /// Raster as a data URI; `None` when the file was unreadable.
    pub image: Option<String>,
    pub printed_name: String,
    pub signed_at: DateTime<Utc>,
}

/// Phase A + B: build the render model for one inspection.
pub async fn materialise_inspection(
    property: &Property,
    inspection: &Inspection,
    branding: Option<&TeamBranding>,
) -> ReportModel {
    let cover_photo = match &property.photo_uri {
        Some(uri) => encode_data_uri(uri).await,
        None => None,
    };

    let (brand_name, brand_logo) = match branding {
        Some(brand) => {
            let logo = match &brand.logo_uri {
                Some(uri) => encode_data_uri(uri).await,
                None => None,
            };
            (brand.company_name.clone(), logo)
        }
        None => (DEFAULT_BRAND_NAME.to_string(), None),
    };

    let mut rooms: Vec<RoomSection> = Vec::new();
    for room_name in inspection.room_names() {
        let checkpoints = inspection.checkpoints_in_room(room_name);
        let inspected = checkpoints.iter().any(|c| c.is_inspected());

        let mut cards = Vec::with_capacity(checkpoints.len());
        for checkpoint in checkpoints {
            cards.push(materialise_checkpoint(checkpoint).await);
        }

        rooms.push(RoomSection {
            name: room_name.to_string(),
            inspected,
            checkpoints: cards,
        });
    }

    let landlord_signature = match &inspection.landlord_signature {
        Some(block) => Some(materialise_signature(block).await),
        None => None,
    };
    let tenant_signature = match &inspection.tenant_signature {
        Some(block) => Some(materialise_signature(block).await),
        None => None,
    };

    ReportModel {
        property: property.clone(),
        inspection_id: inspection.id.clone(),
        inspection_type: inspection.inspection_type,
        status: inspection.status,
        created_at: inspection.created_at,
        completed_at: inspection.completed_at,
        brand_name,
        brand_logo,
        cover_photo,
        rooms,
        landlord_signature,
        tenant_signature,
    }
}

async fn materialise_checkpoint(checkpoint: &Checkpoint) -> CheckpointCard {
    let photo = match checkpoint.primary_photo() {
        Some(photo) => encode_data_uri(&photo.photo_uri).await,
        None => None,
    };

    CheckpointCard {
        title: checkpoint.title.clone(),
        photo,
        tier: checkpoint.tier(),
        condition: checkpoint.primary_condition(),
        notes: checkpoint.notes.clone(),
        timestamp: best_timestamp(checkpoint),
    }
}

async fn materialise_signature(block: &ps_core::model::SignatureBlock) -> SignaturePanel {
    SignaturePanel {
        image: encode_data_uri(&block.image_uri).await,
        printed_name: block.printed_name.clone(),
        signed_at: block.signed_at,
    }
}

/// Best timestamp for the watermark: the EXIF capture date of the strongest
/// envelope when verified, else its upload date, else the checkpoint's
/// legacy timestamp.
fn best_timestamp(checkpoint: &Checkpoint) -> Option<NaiveDateTime> {
    if let Some(photo) = checkpoint.strongest_photo() {
        if photo.is_exif_available {
            if let Some(capture) = photo.capture_date {
                return Some(capture);
            }
        }
        return Some(photo.upload_date.with_timezone(&Local).naive_local());
    }
    checkpoint
        .timestamp
        .map(|legacy| legacy.with_timezone(&Local).naive_local())
}

/// Read a file and transcode to a base64 data URI tagged by extension.
/// Unreadable files become `None`; the report renders a placeholder.
pub async fn encode_data_uri(uri: &str) -> Option<String> {
    let path = ps_photo::local_path(uri);
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(format!("data:{};base64,{}", mime_for(path), BASE64.encode(bytes))),
        Err(error) => {
            warn!(uri, %error, "file unreadable; rendering placeholder");
            None
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ps_core::model::{new_id, PropertyType, SignatureBlock};
    use ps_photo::{VerificationMethod, VerifiedPhotoData};
    use std::io::Write;

    fn property() -> Property {
        Property {
            id: new_id(),
            address: "12 High St".to_string(),
            property_type: PropertyType::Apartment,
            bedrooms: 2,
            bathrooms: 1,
            photo_uri: None,
            latitude: None,
            longitude: None,
            tenant: None,
            inspections: Vec::new(),
            team_member_ids: None,
        }
    }

    fn inspection(checkpoints: Vec<Checkpoint>) -> Inspection {
        Inspection {
            id: new_id(),
            property_id: new_id(),
            inspection_type: InspectionType::MoveIn,
            status: InspectionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            due_date: None,
            checkpoints,
            landlord_signature: None,
            tenant_signature: None,
            inspector: None,
        }
    }

    fn photo_at(uri: &str, method: VerificationMethod) -> VerifiedPhotoData {
        VerifiedPhotoData {
            photo_uri: uri.to_string(),
            capture_date: None,
            is_exif_available: false,
            upload_date: Utc::now(),
            verification_method: method,
            photo_hash: "ab".repeat(32),
            gps: None,
            location_verified: false,
            composition_guide: None,
        }
    }

    #[tokio::test]
    async fn test_rooms_keep_first_seen_order() {
        let model = materialise_inspection(
            &property(),
            &inspection(vec![
                Checkpoint::new("Zulu Room", "General"),
                Checkpoint::new("Alpha Room", "General"),
                Checkpoint::new("Zulu Room", "Window"),
            ]),
            None,
        )
        .await;

        let names: Vec<&str> = model.rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zulu Room", "Alpha Room"]);
        assert_eq!(model.rooms[0].checkpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_uninspected_room_flagged() {
        let mut rated = Checkpoint::new("Kitchen", "Bench");
        rated.landlord_condition = Some(Condition::Pass);

        let model = materialise_inspection(
            &property(),
            &inspection(vec![
                Checkpoint::new("Bedroom 1", "General"),
                Checkpoint::new("Bedroom 1", "Wardrobe"),
                rated,
            ]),
            None,
        )
        .await;

        assert!(!model.rooms[0].inspected);
        assert!(model.rooms[1].inspected);
        assert!(model.rooms[0].checkpoints.iter().all(|c| c.photo.is_none()));
    }

    #[tokio::test]
    async fn test_unreadable_photo_becomes_placeholder() {
        let mut checkpoint = Checkpoint::new("Kitchen", "General");
        checkpoint.landlord_photo = Some(photo_at(
            "/nonexistent/gone.jpg",
            VerificationMethod::CameraCapture,
        ));

        let model =
            materialise_inspection(&property(), &inspection(vec![checkpoint]), None).await;
        let card = &model.rooms[0].checkpoints[0];
        assert!(card.photo.is_none());
        // Verification data survives even when the blob is gone.
        assert_eq!(card.tier, VerificationTier::Verified);
    }

    #[tokio::test]
    async fn test_data_uri_mime_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("shot.PNG");
        let jpg = dir.path().join("shot.jpg");
        std::fs::write(&png, b"png bytes").unwrap();
        std::fs::write(&jpg, b"jpg bytes").unwrap();

        let png_uri = encode_data_uri(png.to_str().unwrap()).await.unwrap();
        let jpg_uri = encode_data_uri(jpg.to_str().unwrap()).await.unwrap();
        assert!(png_uri.starts_with("data:image/png;base64,"));
        assert!(jpg_uri.starts_with("data:image/jpeg;base64,"));
        assert!(png_uri.ends_with(&BASE64.encode(b"png bytes")));
    }

    #[tokio::test]
    async fn test_timestamp_prefers_exif_capture() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("p.jpg");
        let mut f = std::fs::File::create(&file).unwrap();
        f.write_all(b"bytes").unwrap();

        let capture = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap();

        let mut verified = photo_at(file.to_str().unwrap(), VerificationMethod::CameraCapture);
        verified.capture_date = Some(capture);
        verified.is_exif_available = true;

        let mut checkpoint = Checkpoint::new("Kitchen", "General");
        checkpoint.landlord_photo = Some(verified);

        let model =
            materialise_inspection(&property(), &inspection(vec![checkpoint]), None).await;
        assert_eq!(model.rooms[0].checkpoints[0].timestamp, Some(capture));
    }

    #[tokio::test]
    async fn test_timestamp_falls_back_to_upload_then_legacy() {
        // No EXIF: the upload date wins.
        let mut with_photo = Checkpoint::new("Kitchen", "General");
        let upload = Utc::now() - Duration::days(3);
        let mut envelope = photo_at("/nonexistent.jpg", VerificationMethod::GalleryImport);
        envelope.upload_date = upload;
        with_photo.landlord_photo = Some(envelope);

        // No photo at all: the legacy checkpoint timestamp wins.
        let mut legacy_only = Checkpoint::new("Kitchen", "Sink");
        let legacy = Utc::now() - Duration::days(30);
        legacy_only.timestamp = Some(legacy);

        let model = materialise_inspection(
            &property(),
            &inspection(vec![with_photo, legacy_only]),
            None,
        )
        .await;

        let cards = &model.rooms[0].checkpoints;
        assert_eq!(
            cards[0].timestamp,
            Some(upload.with_timezone(&Local).naive_local())
        );
        assert_eq!(
            cards[1].timestamp,
            Some(legacy.with_timezone(&Local).naive_local())
        );
    }

    #[tokio::test]
    async fn test_branding_defaults() {
        let model =
            materialise_inspection(&property(), &inspection(vec![]), None).await;
        assert_eq!(model.brand_name, DEFAULT_BRAND_NAME);
        assert!(model.brand_logo.is_none());

        let branding = TeamBranding {
            company_name: "Acme Lettings".to_string(),
            logo_uri: None,
        };
        let model =
            materialise_inspection(&property(), &inspection(vec![]), Some(&branding)).await;
        assert_eq!(model.brand_name, "Acme Lettings");
    }

    #[tokio::test]
    async fn test_signatures_materialised() {
        let dir = tempfile::tempdir().unwrap();
        let sig = dir.path().join("sig.png");
        std::fs::write(&sig, b"sig raster").unwrap();

        let mut insp = inspection(vec![]);
        insp.landlord_signature = Some(SignatureBlock {
            image_uri: sig.to_str().unwrap().to_string(),
            printed_name: "A. Landlord".to_string(),
            signed_at: Utc::now(),
        });

        let model = materialise_inspection(&property(), &insp, None).await;
        let panel = model.landlord_signature.unwrap();
        assert!(panel.image.unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(panel.printed_name, "A. Landlord");
        assert!(model.tenant_signature.is_none());
    }
}
