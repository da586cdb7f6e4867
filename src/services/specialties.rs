use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{require_fields, require_id};
use crate::constants::{DOCTORS_PATH, SPECIALTIES_PATH};
use crate::gateway::ApiGateway;
use crate::utils::Result;

/// Medical specialties; doctor listings embed them, so changes drop those too
#[derive(Clone)]
pub struct SpecialtyService {
    resource: ResourceClient,
}

impl SpecialtyService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, SPECIALTIES_PATH, &[SPECIALTIES_PATH, DOCTORS_PATH]),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    /// Specialties rarely change; serve them from the response cache
    pub async fn list_cached(&self) -> Result<Value> {
        self.resource.list_cached().await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Specialty")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, &["name"])?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Specialty")?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Specialty")?;
        self.resource.delete(id).await
    }
}
