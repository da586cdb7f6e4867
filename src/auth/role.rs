use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::guard::Capability;
use crate::utils::ClinicError;

/// Who the logged-in user is, as far as authorization goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Receptionist,
    Patient,
    User,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Doctor,
        Role::Receptionist,
        Role::Patient,
        Role::User,
    ];

    /// Lower-case name as stored in durable storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
            Role::Patient => "patient",
            Role::User => "user",
        }
    }

    /// What this role may do
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
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
            ],
            Role::Doctor => &[
                ViewDashboard,
                ViewAppointments,
                CreateAppointments,
                EditAppointments,
                ViewMedicalRecords,
            ],
            Role::Receptionist => &[
                ViewDashboard,
                ViewAppointments,
                CreateAppointments,
                EditAppointments,
            ],
            Role::Patient => &[
                ViewDashboard,
                ViewAppointments,
                CreateAppointments,
                ViewMedicalRecords,
            ],
            Role::User => &[ViewDashboard],
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    /// Case-insensitive; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| ClinicError::InvalidRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("DOCTOR".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("receptionist".parse::<Role>().unwrap(), Role::Receptionist);
        assert!("nurse".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_storage_form() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
            assert_eq!(role.to_string(), role.to_string().to_lowercase());
        }
    }

    #[test]
    fn test_capabilities_follow_route_table() {
        assert!(Role::Admin.can(Capability::ManageUsers));
        assert!(!Role::Doctor.can(Capability::ManagePatients));
        assert!(Role::Doctor.can(Capability::ViewMedicalRecords));
        assert!(Role::Receptionist.can(Capability::EditAppointments));
        assert!(!Role::Receptionist.can(Capability::ViewMedicalRecords));
        assert!(Role::Patient.can(Capability::CreateAppointments));
        assert!(!Role::Patient.can(Capability::EditAppointments));
        assert_eq!(Role::User.capabilities(), &[Capability::ViewDashboard]);
    }
}
