// Gateway module for services - follows the Train Station Pattern
// All external access must go through this gateway

mod appointments;
mod auth;
mod clinics;
mod doctors;
mod medical_records;
mod patients;
mod resource;
mod specialties;
mod users;
mod validation;

pub use appointments::{
    format_scheduled_at, normalize_scheduled_at, AppointmentFilters, AppointmentService,
    AppointmentStatus,
};
pub use auth::{AuthService, LoginResponse};
pub use clinics::ClinicService;
pub use doctors::DoctorService;
pub use medical_records::MedicalRecordService;
pub use patients::PatientService;
pub use resource::ResourceClient;
pub use specialties::SpecialtyService;
pub use users::UserService;
pub use validation::{
    digits_only, format_cpf, format_phone, is_valid_cpf, is_valid_crm, is_valid_email,
    is_valid_phone, require_fields,
};
