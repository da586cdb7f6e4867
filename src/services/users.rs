use serde_json::Value;

use super::resource::ResourceClient;
use super::validation::{check_optional, is_valid_email, require_fields, require_id};
use crate::auth::Role;
use crate::constants::{DOCTORS_PATH, PATIENTS_PATH, USERS_PATH};
use crate::gateway::ApiGateway;
use crate::utils::Result;

/// Login accounts; doctor and patient records hang off them
#[derive(Clone)]
pub struct UserService {
    resource: ResourceClient,
}

impl UserService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self {
            resource: ResourceClient::new(
                gateway,
                USERS_PATH,
                &[USERS_PATH, DOCTORS_PATH, PATIENTS_PATH],
            ),
        }
    }

    pub async fn list(&self) -> Result<Value> {
        self.resource.list().await
    }

    pub async fn list_by_role(&self, role: Role) -> Result<Value> {
        self.resource
            .list_where(&[("role", role.as_str().to_string())])
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        require_id(id, "User")?;
        self.resource.get(id).await
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        require_fields(&data, &["email", "password", "role"])?;
        Self::validate(&data)?;
        self.resource.create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        require_id(id, "User")?;
        Self::validate(&data)?;
        self.resource.update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        require_id(id, "User")?;
        self.resource.delete(id).await
    }

    fn validate(data: &Value) -> Result<()> {
        check_optional(data, "email", is_valid_email, "Invalid e-mail")?;
        if let Some(role) = data.get("role").and_then(Value::as_str) {
            role.parse::<Role>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedTransport;
    use crate::gateway::Method;
    use crate::storage::MemoryStorage;
    use crate::utils::ClinicError;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> (UserService, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = ApiGateway::new(
            "http://clinic.test/api",
            Arc::new(MemoryStorage::new()),
            transport.clone(),
        );
        (UserService::new(gateway), transport)
    }

    #[tokio::test]
    async fn test_list_by_role_uses_lowercase_name() {
        let (users, transport) = service();
        transport.respond(Method::GET, "users", 200, json!([]));

        users.list_by_role(Role::Receptionist).await.unwrap();
        assert!(transport
            .last_request()
            .query
            .contains(&("role".to_string(), "receptionist".to_string())));
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let (users, transport) = service();
        let err = users
            .create(json!({"email": "x@clinic.com", "password": "pw", "role": "janitor"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidRole(_)));
        assert!(transport.requests().is_empty());
    }
}
