//! Inspection store
//!
//! One reducer owns the Property -> Inspection -> Checkpoint forest. All
//! mutations land here, preconditions are enforced at the boundary, and
//! change events accumulate for the host to drain: persistence and
//! notification scheduling are causally ordered after the reducer step that
//! produced them, but never run inside it.

use crate::access::{accessible_properties, effective_role, Capability};
use crate::model::{
    new_id, AppState, Checkpoint, Inspection, InspectionStatus, InspectionType, Property,
    PropertyType, SignatureBlock, SignatureParty, TenantContact, User,
};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use ps_photo::VerifiedPhotoData;
use tracing::info;

/// Rooms seeded into every new inspection.
pub const DEFAULT_ROOMS: [&str; 7] = [
    "Living Room",
    "Kitchen",
    "Bathroom",
    "Bedroom 1",
    "Bedroom 2",
    "Laundry",
    "Outdoor Areas",
];

/// Title of the checkpoint seeded into each default room.
pub const DEFAULT_CHECKPOINT_TITLE: &str = "General";

/// Scalar attributes for creating or updating a property.
#[derive(Debug, Clone)]
pub struct PropertyDetails {
    pub address: String,
    pub property_type: PropertyType,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub photo_uri: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub tenant: Option<TenantContact>,
}

/// Change notifications drained by the host after each reducer step.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    PropertyAdded {
        property_id: String,
    },
    PropertyUpdated {
        property_id: String,
    },
    /// Cascade delete; carries the inspection ids removed with the property
    /// so their scheduled notifications can be cancelled.
    PropertyDeleted {
        property_id: String,
        inspection_ids: Vec<String>,
    },
    InspectionCreated {
        inspection_id: String,
        property_id: String,
        due_date: Option<DateTime<Utc>>,
    },
    CheckpointUpdated {
        inspection_id: String,
        checkpoint_id: String,
    },
    RoomAdded {
        inspection_id: String,
        room_name: String,
    },
    RoomRenamed {
        inspection_id: String,
        old_name: String,
        new_name: String,
    },
    RoomDeleted {
        inspection_id: String,
        room_name: String,
    },
    InspectionSigned {
        inspection_id: String,
        party: SignatureParty,
    },
    InspectionCompleted {
        inspection_id: String,
    },
    InspectionArchived {
        inspection_id: String,
    },
    InspectionDeleted {
        inspection_id: String,
    },
}

/// The single owner of the state tree.
#[derive(Debug, Default)]
pub struct Store {
    state: AppState,
    events: Vec<StoreEvent>,
}

impl Store {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    /// Read-only view of the current tree.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Immutable snapshot for persistence.
    pub fn snapshot(&self) -> AppState {
        self.state.clone()
    }

    /// Drain accumulated change events.
    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Properties the actor may see.
    pub fn accessible_properties(&self, user: &User) -> Vec<&Property> {
        accessible_properties(user, self.state.team.as_ref(), &self.state.properties)
    }

    pub fn property(&self, property_id: &str) -> CoreResult<&Property> {
        self.state
            .properties
            .iter()
            .find(|p| p.id == property_id)
            .ok_or_else(|| CoreError::PropertyNotFound(property_id.to_string()))
    }

    pub fn inspection(&self, inspection_id: &str) -> CoreResult<&Inspection> {
        self.state
            .properties
            .iter()
            .flat_map(|p| p.inspections.iter())
            .find(|i| i.id == inspection_id)
            .ok_or_else(|| CoreError::InspectionNotFound(inspection_id.to_string()))
    }

    pub fn add_property(&mut self, actor: &User, details: PropertyDetails) -> CoreResult<Property> {
        self.authorize(actor, Capability::EditProperty)?;
        if details.bathrooms < 1 {
            return Err(CoreError::InvalidBathroomCount);
        }

        let property = Property {
            id: new_id(),
            address: details.address,
            property_type: details.property_type,
            bedrooms: details.bedrooms,
            bathrooms: details.bathrooms,
            photo_uri: details.photo_uri,
            latitude: details.latitude,
            longitude: details.longitude,
            tenant: details.tenant,
            inspections: Vec::new(),
            team_member_ids: None,
        };

        info!(property_id = %property.id, address = %property.address, "property added");
        self.state.properties.push(property.clone());
        self.events.push(StoreEvent::PropertyAdded {
            property_id: property.id.clone(),
        });
        Ok(property)
    }

    /// Update a property's scalar attributes. Inspections are untouched.
    pub fn update_property(
        &mut self,
        actor: &User,
        property_id: &str,
        details: PropertyDetails,
    ) -> CoreResult<()> {
        self.authorize_for_property(actor, Capability::EditProperty, property_id)?;
        if details.bathrooms < 1 {
            return Err(CoreError::InvalidBathroomCount);
        }

        let property = self.property_mut(property_id)?;
        property.address = details.address;
        property.property_type = details.property_type;
        property.bedrooms = details.bedrooms;
        property.bathrooms = details.bathrooms;
        property.photo_uri = details.photo_uri;
        property.latitude = details.latitude;
        property.longitude = details.longitude;
        property.tenant = details.tenant;

        self.events.push(StoreEvent::PropertyUpdated {
            property_id: property_id.to_string(),
        });
        Ok(())
    }

    /// Delete a property; its inspections cascade.
    pub fn delete_property(&mut self, actor: &User, property_id: &str) -> CoreResult<()> {
        self.authorize_for_property(actor, Capability::EditProperty, property_id)?;

        let position = self
            .state
            .properties
            .iter()
            .position(|p| p.id == property_id)
            .ok_or_else(|| CoreError::PropertyNotFound(property_id.to_string()))?;

        let removed = self.state.properties.remove(position);
        let inspection_ids = removed.inspections.iter().map(|i| i.id.clone()).collect();

        info!(property_id, "property deleted with inspections cascaded");
        self.events.push(StoreEvent::PropertyDeleted {
            property_id: property_id.to_string(),
            inspection_ids,
        });
        Ok(())
    }

    /// Create a pending inspection seeded with the default room set.
    pub fn add_inspection(
        &mut self,
        actor: &User,
        property_id: &str,
        inspection_type: InspectionType,
        due_date: Option<DateTime<Utc>>,
    ) -> CoreResult<Inspection> {
        self.authorize_for_property(actor, Capability::ConductInspection, property_id)?;

        let created_at = Utc::now();
        if let Some(due) = due_date {
            if due < created_at {
                return Err(CoreError::DueDateBeforeCreation);
            }
        }

        let checkpoints = DEFAULT_ROOMS
            .iter()
            .map(|room| Checkpoint::new(*room, DEFAULT_CHECKPOINT_TITLE))
            .collect();

        let inspection = Inspection {
            id: new_id(),
            property_id: property_id.to_string(),
            inspection_type,
            status: InspectionStatus::Pending,
            created_at,
            completed_at: None,
            due_date,
            checkpoints,
            landlord_signature: None,
            tenant_signature: None,
            inspector: Some(actor.id.clone()),
        };

        info!(
            inspection_id = %inspection.id,
            property_id,
            kind = %inspection_type,
            "inspection created"
        );

        self.events.push(StoreEvent::InspectionCreated {
            inspection_id: inspection.id.clone(),
            property_id: property_id.to_string(),
            due_date,
        });

        let property = self.property_mut(property_id)?;
        property.inspections.push(inspection.clone());
        Ok(inspection)
    }

    /// Replace a checkpoint's contents. Rejected once the owning inspection
    /// has left `pending`.
    pub fn update_checkpoint(
        &mut self,
        actor: &User,
        inspection_id: &str,
        mut checkpoint: Checkpoint,
    ) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let inspection = self.inspection_mut(inspection_id)?;
        require_pending(inspection)?;

        let existing = inspection
            .checkpoints
            .iter_mut()
            .find(|c| c.id == checkpoint.id)
            .ok_or_else(|| CoreError::CheckpointNotFound(checkpoint.id.clone()))?;

        // Clock reversal guard: re-ingesting identical bytes keeps the
        // earlier upload date.
        checkpoint.landlord_photo =
            merge_photo_slot(&existing.landlord_photo, checkpoint.landlord_photo);
        checkpoint.tenant_photo = merge_photo_slot(&existing.tenant_photo, checkpoint.tenant_photo);
        checkpoint.move_out_photo =
            merge_photo_slot(&existing.move_out_photo, checkpoint.move_out_photo);

        let checkpoint_id = checkpoint.id.clone();
        *existing = checkpoint;

        self.events.push(StoreEvent::CheckpointUpdated {
            inspection_id: inspection_id.to_string(),
            checkpoint_id,
        });
        Ok(())
    }

    /// Add a room to a pending inspection, seeded with one default
    /// checkpoint.
    pub fn add_room(
        &mut self,
        actor: &User,
        inspection_id: &str,
        room_name: &str,
    ) -> CoreResult<Checkpoint> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let inspection = self.inspection_mut(inspection_id)?;
        require_pending(inspection)?;

        let checkpoint = Checkpoint::new(room_name, DEFAULT_CHECKPOINT_TITLE);
        inspection.checkpoints.push(checkpoint.clone());

        self.events.push(StoreEvent::RoomAdded {
            inspection_id: inspection_id.to_string(),
            room_name: room_name.to_string(),
        });
        Ok(checkpoint)
    }

    /// Rename every checkpoint in a room. No-op when the new name is empty
    /// or unchanged.
    pub fn rename_room(
        &mut self,
        actor: &User,
        inspection_id: &str,
        old_name: &str,
        new_name: &str,
    ) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == old_name {
            return Ok(());
        }

        let inspection = self.inspection_mut(inspection_id)?;
        require_pending(inspection)?;

        let mut renamed = false;
        for checkpoint in &mut inspection.checkpoints {
            if checkpoint.room_name == old_name {
                checkpoint.room_name = new_name.to_string();
                renamed = true;
            }
        }

        if renamed {
            self.events.push(StoreEvent::RoomRenamed {
                inspection_id: inspection_id.to_string(),
                old_name: old_name.to_string(),
                new_name: new_name.to_string(),
            });
        }
        Ok(())
    }

    /// Remove every checkpoint in a room atomically.
    pub fn delete_room(
        &mut self,
        actor: &User,
        inspection_id: &str,
        room_name: &str,
    ) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let inspection = self.inspection_mut(inspection_id)?;
        require_pending(inspection)?;

        let before = inspection.checkpoints.len();
        inspection.checkpoints.retain(|c| c.room_name != room_name);
        if inspection.checkpoints.len() == before {
            return Err(CoreError::RoomNotFound(room_name.to_string()));
        }

        self.events.push(StoreEvent::RoomDeleted {
            inspection_id: inspection_id.to_string(),
            room_name: room_name.to_string(),
        });
        Ok(())
    }

    /// Record a signature. The first signature transitions the inspection to
    /// `completed`; from then on structure and content are frozen and only
    /// the missing party may still sign.
    pub fn sign_inspection(
        &mut self,
        actor: &User,
        inspection_id: &str,
        party: SignatureParty,
        signature_image_uri: &str,
        printed_name: &str,
    ) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let printed_name = printed_name.trim();
        if printed_name.is_empty() {
            return Err(CoreError::MissingPrintedName);
        }

        let inspection = self.inspection_mut(inspection_id)?;
        if inspection.status == InspectionStatus::Archived {
            return Err(CoreError::InspectionArchived(inspection_id.to_string()));
        }
        if inspection.signature_for(party).is_some() {
            return Err(CoreError::AlreadySigned(party));
        }

        let now = Utc::now();
        let block = SignatureBlock {
            image_uri: signature_image_uri.to_string(),
            printed_name: printed_name.to_string(),
            signed_at: now,
        };
        match party {
            SignatureParty::Landlord => inspection.landlord_signature = Some(block),
            SignatureParty::Tenant => inspection.tenant_signature = Some(block),
        }

        let was_pending = inspection.status == InspectionStatus::Pending;
        if was_pending {
            inspection.status = InspectionStatus::Completed;
            inspection.completed_at = Some(now);
            info!(inspection_id, %party, "inspection completed on first signature");
        }

        self.events.push(StoreEvent::InspectionSigned {
            inspection_id: inspection_id.to_string(),
            party,
        });

        if was_pending {
            self.events.push(StoreEvent::InspectionCompleted {
                inspection_id: inspection_id.to_string(),
            });
        }
        Ok(())
    }

    /// The only legal transition out of `completed`.
    pub fn archive_inspection(&mut self, actor: &User, inspection_id: &str) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::ConductInspection, inspection_id)?;

        let inspection = self.inspection_mut(inspection_id)?;
        if inspection.status != InspectionStatus::Completed {
            return Err(CoreError::InspectionNotCompleted(inspection_id.to_string()));
        }

        inspection.status = InspectionStatus::Archived;
        info!(inspection_id, "inspection archived");
        self.events.push(StoreEvent::InspectionArchived {
            inspection_id: inspection_id.to_string(),
        });
        Ok(())
    }

    pub fn delete_inspection(&mut self, actor: &User, inspection_id: &str) -> CoreResult<()> {
        self.authorize_for_inspection(actor, Capability::EditProperty, inspection_id)?;

        for property in &mut self.state.properties {
            if let Some(position) = property.inspections.iter().position(|i| i.id == inspection_id)
            {
                property.inspections.remove(position);
                self.events.push(StoreEvent::InspectionDeleted {
                    inspection_id: inspection_id.to_string(),
                });
                return Ok(());
            }
        }
        Err(CoreError::InspectionNotFound(inspection_id.to_string()))
    }

    fn authorize(&self, actor: &User, capability: Capability) -> CoreResult<()> {
        let role = effective_role(actor, self.state.team.as_ref());
        if role.allows(capability) {
            Ok(())
        } else {
            Err(CoreError::AccessDenied {
                role,
                action: capability,
            })
        }
    }

    /// Capability check plus visibility of the target property.
    fn authorize_for_property(
        &self,
        actor: &User,
        capability: Capability,
        property_id: &str,
    ) -> CoreResult<()> {
        self.authorize(actor, capability)?;
        self.property(property_id)?;

        let visible = self
            .accessible_properties(actor)
            .iter()
            .any(|p| p.id == property_id);
        if visible {
            Ok(())
        } else {
            Err(CoreError::AccessDenied {
                role: effective_role(actor, self.state.team.as_ref()),
                action: capability,
            })
        }
    }

    fn authorize_for_inspection(
        &self,
        actor: &User,
        capability: Capability,
        inspection_id: &str,
    ) -> CoreResult<()> {
        let property_id = self.inspection(inspection_id)?.property_id.clone();
        self.authorize_for_property(actor, capability, &property_id)
    }

    fn property_mut(&mut self, property_id: &str) -> CoreResult<&mut Property> {
        self.state
            .properties
            .iter_mut()
            .find(|p| p.id == property_id)
            .ok_or_else(|| CoreError::PropertyNotFound(property_id.to_string()))
    }

    fn inspection_mut(&mut self, inspection_id: &str) -> CoreResult<&mut Inspection> {
        self.state
            .properties
            .iter_mut()
            .flat_map(|p| p.inspections.iter_mut())
            .find(|i| i.id == inspection_id)
            .ok_or_else(|| CoreError::InspectionNotFound(inspection_id.to_string()))
    }
}

fn require_pending(inspection: &Inspection) -> CoreResult<()> {
    if inspection.status == InspectionStatus::Pending {
        Ok(())
    } else {
        Err(CoreError::InspectionNotPending(inspection.id.clone()))
    }
}

/// Keep the earlier upload date when the same content hash is re-ingested;
/// the device clock may have moved backwards in between.
fn merge_photo_slot(
    existing: &Option<VerifiedPhotoData>,
    incoming: Option<VerifiedPhotoData>,
) -> Option<VerifiedPhotoData> {
    match (existing, incoming) {
        (Some(old), Some(mut new)) if old.photo_hash == new.photo_hash => {
            if old.upload_date < new.upload_date {
                new.upload_date = old.upload_date;
            }
            Some(new)
        }
        (_, incoming) => incoming,
    }
}
