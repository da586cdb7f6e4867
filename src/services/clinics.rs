use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{check_optional, is_valid_email, is_valid_phone, require_fields, require_id};
use crate::constants::CLINICS_PATH;
use crate::gateway::ApiGateway;
use crate::utils::Result;

const REQUIRED: &[&str] = &["name", "address", "phone", "email"];

#[derive(Clone)]
pub struct ClinicService {
    resource: ResourceClient,
}

impl ClinicService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, CLINICS_PATH, &[CLINICS_PATH]),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Clinic")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, REQUIRED)?;
        Self::validate(&data)?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Clinic")?;
        Self::validate(&data)?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Clinic")?;
        self.resource.delete(id).await
    }

    fn validate(data: &Value) -> Result<()> {
        check_optional(data, "email", is_valid_email, "Invalid e-mail")?;
        check_optional(
            data,
            "phone",
            is_valid_phone,
            "Invalid phone. Use the format (00) 00000-0000",
        )
    }
}
