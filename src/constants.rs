/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const REFRESHED_TOKEN_HEADER: &str = "x-new-token";
pub const CACHE_BUSTER_PARAM: &str = "_t";

// Timeouts
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300; // 5 minutes

// Durable storage keys
pub const TOKEN_KEY: &str = "token";
pub const ROLE_KEY: &str = "userRole";
pub const USER_ID_KEY: &str = "userId";
pub const SESSION_KEYS: &[&str] = &[TOKEN_KEY, ROLE_KEY, USER_ID_KEY];
pub const SESSION_FILE_NAME: &str = "session.json";

// Storage event fan-out
pub const STORAGE_EVENT_CAPACITY: usize = 64;

// Resource endpoints
pub const LOGIN_PATH: &str = "users/login";
pub const PATIENTS_PATH: &str = "patients";
pub const DOCTORS_PATH: &str = "doctors";
pub const CLINICS_PATH: &str = "clinics";
pub const SPECIALTIES_PATH: &str = "specialties";
pub const USERS_PATH: &str = "users";
pub const APPOINTMENTS_PATH: &str = "appointments";
pub const MEDICAL_RECORDS_PATH: &str = "prontuarios";

// Backend date format for appointments
pub const APPOINTMENT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
