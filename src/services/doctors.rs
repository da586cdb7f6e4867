use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{check_optional, is_valid_crm, is_valid_email, require_fields, require_id};
use crate::constants::DOCTORS_PATH;
use crate::gateway::ApiGateway;
use crate::utils::Result;

const REQUIRED: &[&str] = &["first_name", "last_name", "email", "specialty_id", "crm"];

#[derive(Clone)]
pub struct DoctorService {
    resource: ResourceClient,
}

impl DoctorService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, DOCTORS_PATH, &[DOCTORS_PATH]),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    pub async fn list_by_clinic(&self, clinic_id: &str) -> Result<Value> {
        require_id(clinic_id, "Clinic")?;
        self.resource
            .list_where(&[("clinic_id", clinic_id.to_string())])
            .await
    }

    pub async fn list_by_specialty(&self, specialty_id: &str) -> Result<Value> {
        require_id(specialty_id, "Specialty")?;
        self.resource
            .list_where(&[("specialty_id", specialty_id.to_string())])
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Doctor")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, REQUIRED)?;
        Self::validate(&data)?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Doctor")?;
        Self::validate(&data)?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Doctor")?;
        self.resource.delete(id).await
    }

    fn validate(data: &Value) -> Result<()> {
        check_optional(data, "email", is_valid_email, "Invalid e-mail")?;
        check_optional(
            data,
            "crm",
            is_valid_crm,
            "Invalid CRM. Expected format: CRM/UF 123456",
        )
    }
}
