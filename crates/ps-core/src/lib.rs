//! PropertySnap Core Engine
//!
//! Single-owner state tree for tenancy inspections: the data model and its
//! lifecycle state machine, the access resolver, the notification scheduler,
//! and the debounced persistence layer. The UI shell drives the store and
//! drains its change events; every rejection is a value, never a panic.

pub mod access;
pub mod geocode;
pub mod model;
pub mod notify;
pub mod persist;
pub mod store;

pub use access::{accessible_properties, effective_role, Capability};
pub use geocode::{GeocodedPoint, Geocoder};
pub use model::{
    AppState, Checkpoint, Condition, Inspection, InspectionStatus, InspectionType, MemberRole,
    Property, PropertyType, SignatureBlock, SignatureParty, Team, TeamBranding, TeamMember, User,
};
pub use notify::{NotificationPreferences, NotificationScheduler, NotificationSink, ReminderLead};
pub use persist::{KeyValueStore, MemoryStore, Persister};
pub use store::{Store, StoreEvent};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("property not found: {0}")]
    PropertyNotFound(String),

    #[error("inspection not found: {0}")]
    InspectionNotFound(String),

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("inspection {0} is no longer pending")]
    InspectionNotPending(String),

    #[error("inspection {0} has not been completed")]
    InspectionNotCompleted(String),

    #[error("inspection {0} is archived")]
    InspectionArchived(String),

    #[error("the {0} has already signed")]
    AlreadySigned(model::SignatureParty),

    #[error("a printed name is required to sign")]
    MissingPrintedName,

    #[error("due date must not precede the inspection's creation")]
    DueDateBeforeCreation,

    #[error("a property needs at least one bathroom")]
    InvalidBathroomCount,

    #[error("{role} may not {action}")]
    AccessDenied {
        role: model::MemberRole,
        action: access::Capability,
    },

    #[error("photo error: {0}")]
    Photo(#[from] ps_photo::PhotoError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("notification sink error: {0}")]
    Notification(String),

    #[error("geocoding error: {0}")]
    Geocoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
