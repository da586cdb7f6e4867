use serde::Serialize;

use super::role::Role;
use super::session::Session;

/// Something a screen or command lets the user do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    ManagePatients,
    ManageDoctors,
    ManageClinics,
    ManageSpecialties,
    ManageUsers,
    ViewAppointments,
    CreateAppointments,
    EditAppointments,
    ViewMedicalRecords,
}

impl Capability {
    /// Roles holding this capability
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|role| role.can(*self)).collect()
    }
}

/// Decision for one protected entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    /// Session status is still being restored
    Loading,
    RedirectToLogin,
    Forbidden {
        role: Option<Role>,
        required: Capability,
    },
}

/// Single authorization check applied at the routing/command layer
pub struct RouteGuard;

impl RouteGuard {
    pub fn check(session: &Session, capability: Capability) -> GuardOutcome {
        if session.loading {
            return GuardOutcome::Loading;
        }
        if !session.is_authenticated {
            return GuardOutcome::RedirectToLogin;
        }
        match session.role {
            Some(role) if role.can(capability) => GuardOutcome::Allowed,
            role => GuardOutcome::Forbidden {
                role,
                required: capability,
            },
        }
    }
}
