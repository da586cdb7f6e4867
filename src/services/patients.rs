use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{check_optional, digits_only, is_valid_cpf, is_valid_email, require_fields, require_id};
use crate::constants::PATIENTS_PATH;
use crate::gateway::ApiGateway;
use crate::utils::Result;

const REQUIRED: &[&str] = &["first_name", "cpf", "email", "phone"];

#[derive(Clone)]
pub struct PatientService {
    resource: ResourceClient,
}

impl PatientService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(gateway, PATIENTS_PATH, &[PATIENTS_PATH]),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "Patient")?;
        self.resource.get(id).await
    }

    /// Free-text search by name, CPF or e-mail
    pub async fn search(&self, term: &str) -> Result<Value> {
        self.resource
            .get_sub("search", &[("q", term.trim().to_string())])
            .await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, REQUIRED)?;
        let data = Self::validate(data)?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "Patient")?;
        let data = Self::validate(data)?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "Patient")?;
        self.resource.delete(id).await
    }

    /// Check the fields present and store the CPF as bare digits
    fn validate(mut data: Value) -> Result<Value> {
        check_optional(&data, "cpf", is_valid_cpf, "Invalid CPF")?;
        check_optional(&data, "email", is_valid_email, "Invalid e-mail")?;

        if let Some(cpf) = data.get("cpf").and_then(Value::as_str).map(digits_only) {
            data["cpf"] = Value::String(cpf);
        }
        Ok(data)
    }
}
