use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::resource::ResourceClient;
use super::validation::{require_fields, require_id};
use crate::constants::{APPOINTMENTS_PATH, APPOINTMENT_DATE_FORMAT};
use crate::gateway::ApiGateway;
use crate::utils::{ClinicError, Result};

const REQUIRED: &[&str] = &["patient_id", "doctor_id", "clinic_id", "scheduled_at"];
const INVALID_DATE: &str = "Invalid appointment date/time";
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    #[serde(alias = "cancelled")]
    Canceled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Canceled => "Canceled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::NoShow => "No-show",
        }
    }

    /// Label for a raw backend status; unknown values are shown as-is
    pub fn label_for(status: &str) -> String {
        status
            .parse::<AppointmentStatus>()
            .map(|s| s.label().to_string())
            .unwrap_or_else(|_| status.to_string())
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "canceled" | "cancelled" => Ok(AppointmentStatus::Canceled),
            "completed" => Ok(AppointmentStatus::Completed),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(ClinicError::Validation(format!(
                "Unknown appointment status: {other}"
            ))),
        }
    }
}

/// Optional filters for [`AppointmentService::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilters {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub clinic_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AppointmentFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let status = self.status.map(|s| s.as_str().to_string());
        [
            ("patient_id", self.patient_id.clone()),
            ("doctor_id", self.doctor_id.clone()),
            ("clinic_id", self.clinic_id.clone()),
            ("status", status),
            ("start_date", self.start_date.clone()),
            ("end_date", self.end_date.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
        .collect()
    }
}

/// Parse an appointment time and render it the way the backend stores it
///
/// Offsets are converted to local time; naive inputs are taken as local.
pub fn normalize_scheduled_at(input: &str) -> Result<String> {
    let input = input.trim();
    let parsed = DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        })
        .ok_or_else(|| ClinicError::Validation(INVALID_DATE.to_string()))?;

    Ok(parsed.format(APPOINTMENT_DATE_FORMAT).to_string())
}

/// `dd/mm/yyyy HH:MM` for display
pub fn format_scheduled_at(value: Option<&str>) -> String {
    match value.filter(|v| !v.is_empty()) {
        None => "Not scheduled".to_string(),
        Some(raw) => normalize_scheduled_at(raw)
            .ok()
            .and_then(|s| NaiveDateTime::parse_from_str(&s, APPOINTMENT_DATE_FORMAT).ok())
            .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

#[derive(Clone)]
pub struct AppointmentService {
    resource: ResourceClient,
}

impl AppointmentService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, APPOINTMENTS_PATH, &[APPOINTMENTS_PATH]),
        }
    }

    pub async fn list(&self, filters: &AppointmentFilters) -> Result<Value> {
        self.resource.list_where(&filters.to_query()).await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Appointment")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, REQUIRED)?;
        let data = Self::normalize(data)?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Appointment")?;
        let data = Self::normalize(data)?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Appointment")?;
        self.resource.delete(id).await
    }

    fn normalize(mut data: Value) -> Result<Value> {
        let scheduled_at = match data.get("scheduled_at") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(normalize_scheduled_at(s)?),
            Some(_) => return Err(ClinicError::Validation(INVALID_DATE.to_string())),
        };
        if let Some(formatted) = scheduled_at {
            data["scheduled_at"] = Value::String(formatted);
        }
        if let Some(status) = data.get("status").and_then(Value::as_str) {
            status.parse::<AppointmentStatus>()?;
        }
        Ok(data)
    }
}
