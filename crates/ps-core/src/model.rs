//! Inspection data model
//!
//! The ownership tree is strict: a Property exclusively owns its Inspections,
//! an Inspection its Checkpoints, and a Checkpoint its verified photo slots.
//! Photo URIs reference externally-owned blobs; the model records only their
//! identity and content hash.

use chrono::{DateTime, Utc};
use ps_photo::{VerificationTier, VerifiedPhotoData};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// New opaque identifier. UUIDv7 is time-prefixed, so insertion order is
/// recoverable from the identifier alone.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Physical unit under inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    /// Free-text address, also the basis for report filenames.
    pub address: String,
    pub property_type: PropertyType,
    pub bedrooms: u32,
    /// Always at least one.
    pub bathrooms: u32,
    /// Cover image for reports. Distinct from any inspection photo.
    #[serde(default)]
    pub photo_uri: Option<String>,
    /// Geocoded coordinates; absence disables GPS verification.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub tenant: Option<TenantContact>,
    #[serde(default)]
    pub inspections: Vec<Inspection>,
    /// Team members explicitly granted access, when the team scopes this
    /// property. Informational; the resolver works from member access modes.
    #[serde(default)]
    pub team_member_ids: Option<Vec<String>>,
}

impl Property {
    /// Geocoded coordinates as a pair, when both are present.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    Apartment,
    House,
    Townhouse,
    Studio,
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyType::Apartment => write!(f, "Apartment"),
            PropertyType::House => write!(f, "House"),
            PropertyType::Townhouse => write!(f, "Townhouse"),
            PropertyType::Studio => write!(f, "Studio"),
        }
    }
}

/// Tenant assigned to a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A single evidence-gathering event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub id: String,
    pub property_id: String,
    pub inspection_type: InspectionType,
    pub status: InspectionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Insertion order is preserved; reports group rooms by first-seen order.
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub landlord_signature: Option<SignatureBlock>,
    #[serde(default)]
    pub tenant_signature: Option<SignatureBlock>,
    #[serde(default)]
    pub inspector: Option<String>,
}

impl Inspection {
    /// Room names in first-insertion order, deduplicated.
    pub fn room_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for checkpoint in &self.checkpoints {
            if !names.contains(&checkpoint.room_name.as_str()) {
                names.push(&checkpoint.room_name);
            }
        }
        names
    }

    /// Checkpoints belonging to one room, in insertion order.
    pub fn checkpoints_in_room(&self, room_name: &str) -> Vec<&Checkpoint> {
        self.checkpoints
            .iter()
            .filter(|c| c.room_name == room_name)
            .collect()
    }

    pub fn signature_for(&self, party: SignatureParty) -> Option<&SignatureBlock> {
        match party {
            SignatureParty::Landlord => self.landlord_signature.as_ref(),
            SignatureParty::Tenant => self.tenant_signature.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InspectionType {
    MoveIn,
    MoveOut,
    Routine,
}

impl std::fmt::Display for InspectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectionType::MoveIn => write!(f, "Move-In"),
            InspectionType::MoveOut => write!(f, "Move-Out"),
            InspectionType::Routine => write!(f, "Routine"),
        }
    }
}

/// Lifecycle status. Transitions are monotone: pending to completed to
/// archived, never backward. The derived ordering encodes exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InspectionStatus {
    Pending,
    Completed,
    Archived,
}

impl std::fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectionStatus::Pending => write!(f, "Pending"),
            InspectionStatus::Completed => write!(f, "Completed"),
            InspectionStatus::Archived => write!(f, "Archived"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureParty {
    Landlord,
    Tenant,
}

impl std::fmt::Display for SignatureParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureParty::Landlord => write!(f, "Landlord"),
            SignatureParty::Tenant => write!(f, "Tenant"),
        }
    }
}

/// Raster signature supplied by a collaborator. Not a digital signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureBlock {
    pub image_uri: String,
    pub printed_name: String,
    pub signed_at: DateTime<Utc>,
}

/// One photographed observation inside a room.
///
/// Carries up to three photo slots (landlord, tenant, move-out), each with
/// its own integrity envelope, plus parallel condition ratings. A checkpoint
/// with no photo and no condition in any slot is "not inspected".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    /// Free-text grouping key for rooms.
    pub room_name: String,
    pub title: String,
    #[serde(default)]
    pub landlord_photo: Option<VerifiedPhotoData>,
    #[serde(default)]
    pub tenant_photo: Option<VerifiedPhotoData>,
    #[serde(default)]
    pub move_out_photo: Option<VerifiedPhotoData>,
    #[serde(default)]
    pub landlord_condition: Option<Condition>,
    #[serde(default)]
    pub tenant_condition: Option<Condition>,
    #[serde(default)]
    pub move_out_condition: Option<Condition>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Legacy upload timestamp, kept for records predating the verified
    /// photo envelope.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(room_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            room_name: room_name.into(),
            title: title.into(),
            landlord_photo: None,
            tenant_photo: None,
            move_out_photo: None,
            landlord_condition: None,
            tenant_condition: None,
            move_out_condition: None,
            notes: None,
            timestamp: None,
        }
    }

    /// True when any slot carries a photo or a condition.
    pub fn is_inspected(&self) -> bool {
        self.primary_photo().is_some() || self.primary_condition().is_some()
    }

    /// First populated photo slot in landlord -> tenant -> move-out order.
    pub fn primary_photo(&self) -> Option<&VerifiedPhotoData> {
        self.landlord_photo
            .as_ref()
            .or(self.tenant_photo.as_ref())
            .or(self.move_out_photo.as_ref())
    }

    /// First populated condition slot, mirroring the photo preference.
    pub fn primary_condition(&self) -> Option<Condition> {
        self.landlord_condition
            .or(self.tenant_condition)
            .or(self.move_out_condition)
    }

    /// The envelope with the highest verification tier across all slots.
    /// Slot order breaks ties.
    pub fn strongest_photo(&self) -> Option<&VerifiedPhotoData> {
        [
            self.landlord_photo.as_ref(),
            self.tenant_photo.as_ref(),
            self.move_out_photo.as_ref(),
        ]
        .into_iter()
        .flatten()
        .max_by_key(|p| p.tier())
    }

    /// Tier reported for the whole checkpoint.
    pub fn tier(&self) -> VerificationTier {
        self.strongest_photo()
            .map(|p| p.tier())
            .unwrap_or(VerificationTier::Unverified)
    }
}

/// Condition rating on the three-value scale.
///
/// Legacy records used a five-value scale; those values are normalised on
/// read: excellent/good -> pass, fair -> pass-attention, poor/damaged -> fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Pass,
    PassAttention,
    Fail,
}

impl Condition {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pass" | "excellent" | "good" => Some(Condition::Pass),
            "pass-attention" | "fair" => Some(Condition::PassAttention),
            "fail" | "poor" | "damaged" => Some(Condition::Fail),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Condition::Pass => "Pass",
            Condition::PassAttention => "Pass - Attention",
            Condition::Fail => "Fail",
        }
    }

    /// ASCII glyph for report rendering.
    pub fn glyph(&self) -> &'static str {
        match self {
            Condition::Pass => "[ok]",
            Condition::PassAttention => "[!]",
            Condition::Fail => "[x]",
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Condition::parse(&raw).ok_or_else(|| {
            serde::de::Error::unknown_variant(&raw, &["pass", "pass-attention", "fail"])
        })
    }
}

/// Grouping of actors sharing a property portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    /// The owning admin's user id.
    pub owner_id: String,
    #[serde(default)]
    pub branding: Option<TeamBranding>,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Member record for a user, matched by email.
    pub fn member_for(&self, email: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.email == email)
    }
}

/// White-label brand applied to report covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBranding {
    pub company_name: String,
    #[serde(default)]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub access: AccessMode,
    #[serde(default)]
    pub assigned_property_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberRole {
    Admin,
    Manager,
    Inspector,
    Viewer,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Admin => write!(f, "Admin"),
            MemberRole::Manager => write!(f, "Manager"),
            MemberRole::Inspector => write!(f, "Inspector"),
            MemberRole::Viewer => write!(f, "Viewer"),
        }
    }
}

/// Per-member property visibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    All,
    Specific,
}

/// Device-local user identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Role when the user owns the device outright (no team); team members
    /// carry their role on the member record instead.
    #[serde(default)]
    pub role: Option<MemberRole>,
}

/// The persisted state tree (`@propertysnap_state`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub is_onboarded: bool,
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub team: Option<Team>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_photo::{VerificationMethod, VerifiedPhotoData};

    fn photo(method: VerificationMethod, location_verified: bool) -> VerifiedPhotoData {
        VerifiedPhotoData {
            photo_uri: "p.jpg".to_string(),
            capture_date: None,
            is_exif_available: false,
            upload_date: Utc::now(),
            verification_method: method,
            photo_hash: "00".repeat(32),
            gps: None,
            location_verified,
            composition_guide: None,
        }
    }

    #[test]
    fn test_status_ordering_is_monotone() {
        assert!(InspectionStatus::Pending < InspectionStatus::Completed);
        assert!(InspectionStatus::Completed < InspectionStatus::Archived);
    }

    #[test]
    fn test_condition_legacy_normalisation() {
        assert_eq!(Condition::parse("excellent"), Some(Condition::Pass));
        assert_eq!(Condition::parse("good"), Some(Condition::Pass));
        assert_eq!(Condition::parse("fair"), Some(Condition::PassAttention));
        assert_eq!(Condition::parse("poor"), Some(Condition::Fail));
        assert_eq!(Condition::parse("damaged"), Some(Condition::Fail));
        assert_eq!(Condition::parse("pristine"), None);
    }

    #[test]
    fn test_condition_legacy_values_deserialise() {
        let parsed: Condition = serde_json::from_str("\"damaged\"").unwrap();
        assert_eq!(parsed, Condition::Fail);

        let parsed: Condition = serde_json::from_str("\"pass-attention\"").unwrap();
        assert_eq!(parsed, Condition::PassAttention);

        assert!(serde_json::from_str::<Condition>("\"shiny\"").is_err());
    }

    #[test]
    fn test_condition_serialises_to_new_scale_only() {
        assert_eq!(serde_json::to_string(&Condition::Pass).unwrap(), "\"pass\"");
        assert_eq!(
            serde_json::to_string(&Condition::PassAttention).unwrap(),
            "\"pass-attention\""
        );
    }

    #[test]
    fn test_checkpoint_not_inspected() {
        let checkpoint = Checkpoint::new("Kitchen", "General");
        assert!(!checkpoint.is_inspected());

        let mut with_condition = Checkpoint::new("Kitchen", "General");
        with_condition.tenant_condition = Some(Condition::Pass);
        assert!(with_condition.is_inspected());
    }

    #[test]
    fn test_photo_slot_preference() {
        let mut checkpoint = Checkpoint::new("Kitchen", "General");
        checkpoint.tenant_photo = Some(photo(VerificationMethod::GalleryImport, false));
        checkpoint.move_out_photo = Some(photo(VerificationMethod::CameraCapture, false));

        // Rendering preference is landlord -> tenant -> move-out.
        let primary = checkpoint.primary_photo().unwrap();
        assert_eq!(primary.verification_method, VerificationMethod::GalleryImport);

        // Tier derivation takes the strongest envelope regardless of slot.
        let strongest = checkpoint.strongest_photo().unwrap();
        assert_eq!(strongest.verification_method, VerificationMethod::CameraCapture);
    }

    #[test]
    fn test_room_names_first_seen_order() {
        let inspection = Inspection {
            id: new_id(),
            property_id: new_id(),
            inspection_type: InspectionType::MoveIn,
            status: InspectionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            due_date: None,
            checkpoints: vec![
                Checkpoint::new("Kitchen", "General"),
                Checkpoint::new("Bedroom 1", "General"),
                Checkpoint::new("Kitchen", "Oven"),
            ],
            landlord_signature: None,
            tenant_signature: None,
            inspector: None,
        };

        assert_eq!(inspection.room_names(), vec!["Kitchen", "Bedroom 1"]);
        assert_eq!(inspection.checkpoints_in_room("Kitchen").len(), 2);
    }

    #[test]
    fn test_ids_are_monotone() {
        let a = new_id();
        let b = new_id();
        assert!(a < b, "UUIDv7 ids must preserve insertion order");
    }

    #[test]
    fn test_app_state_persisted_layout() {
        let state = AppState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("isOnboarded").is_some());
        assert!(json.get("isAuthenticated").is_some());
        assert!(json.get("properties").is_some());
    }
}
