//! Access and team resolution
//!
//! A pure layer over `(user, team, properties)`. The store consults it before
//! every read and mutation; nothing here touches state.

use crate::model::{AccessMode, MemberRole, Property, Team, User};

/// Store-boundary capabilities, one per column of the role matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageTeam,
    EditProperty,
    ConductInspection,
    ViewReports,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::ManageTeam => write!(f, "manage team members"),
            Capability::EditProperty => write!(f, "create or edit properties"),
            Capability::ConductInspection => write!(f, "conduct inspections"),
            Capability::ViewReports => write!(f, "view reports"),
        }
    }
}

impl MemberRole {
    /// The role capability matrix.
    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::ManageTeam => matches!(self, MemberRole::Admin),
            Capability::EditProperty => matches!(self, MemberRole::Admin | MemberRole::Manager),
            Capability::ConductInspection => matches!(
                self,
                MemberRole::Admin | MemberRole::Manager | MemberRole::Inspector
            ),
            Capability::ViewReports => true,
        }
    }
}

/// Role a user acts under.
///
/// An unaffiliated user owns the device outright and acts as admin. A team
/// member acts under their member record; someone with a team but no member
/// record can only view.
pub fn effective_role(user: &User, team: Option<&Team>) -> MemberRole {
    match team {
        None => user.role.unwrap_or(MemberRole::Admin),
        Some(team) => {
            if user.role == Some(MemberRole::Admin) || team.owner_id == user.id {
                MemberRole::Admin
            } else {
                team.member_for(&user.email)
                    .map(|m| m.role)
                    .unwrap_or(MemberRole::Viewer)
            }
        }
    }
}

/// Properties a user may see.
///
/// Unaffiliated users and admins see everything. Otherwise the member's
/// access mode decides: `all` sees everything, `specific` sees the assigned
/// subset, and a missing member record sees nothing.
pub fn accessible_properties<'a>(
    user: &User,
    team: Option<&Team>,
    properties: &'a [Property],
) -> Vec<&'a Property> {
    let team = match team {
        None => return properties.iter().collect(),
        Some(team) => team,
    };

    if user.role == Some(MemberRole::Admin) || team.owner_id == user.id {
        return properties.iter().collect();
    }

    let member = match team.member_for(&user.email) {
        Some(member) => member,
        None => return Vec::new(),
    };

    match member.access {
        AccessMode::All => properties.iter().collect(),
        AccessMode::Specific => properties
            .iter()
            .filter(|p| member.assigned_property_ids.contains(&p.id))
            .collect(),
    }
}
