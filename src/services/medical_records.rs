use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{require_fields, require_id};
use crate::constants::MEDICAL_RECORDS_PATH;
use crate::gateway::ApiGateway;
use crate::utils::Result;

#[derive(Clone)]
pub struct MedicalRecordService {
    resource: ResourceClient,
}

impl MedicalRecordService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, MEDICAL_RECORDS_PATH, &[MEDICAL_RECORDS_PATH]),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    pub async fn list_by_patient(&self, patient_id: &str) -> Result<Value> {
        require_id(patient_id, "Patient")?;
        self.resource
            .list_where(&[("patient_id", patient_id.to_string())])
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Medical record")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, &["patient_id", "doctor_id"])?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Medical record")?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Medical record")?;
        self.resource.delete(id).await
    }
}
