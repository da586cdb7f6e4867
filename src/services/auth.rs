use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::SessionManager;
use crate::constants::LOGIN_PATH;
use crate::gateway::{ApiGateway, RequestConfig};
use crate::utils::{ClinicError, Result};

/// Credentials issued by `users/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
    pub id: String,
}

impl LoginResponse {
    /// Accept numeric ids as well as strings
    fn from_payload(payload: &Value) -> Option<Self> {
        let text = |field: &str| match payload.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        Some(Self {
            token: text("token")?,
            role: text("role")?,
            id: text("id")?,
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    gateway: ApiGateway,
}

impl AuthService {
    pub fn new(gateway: ApiGateway) -> Self {
        Self { gateway }
    }

    /// Exchange e-mail and password for credentials; never sends a stored token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let payload = self
            .gateway
            .post(
                LOGIN_PATH,
                json!({ "email": email, "password": password }),
                RequestConfig::new().public(),
            )
            .await?;

        LoginResponse::from_payload(&payload).ok_or_else(|| {
            ClinicError::Validation("Invalid login response: token, role or id missing".into())
        })
    }

    /// Log in against the backend and hand the credentials to the session
    pub async fn sign_in(
        &self,
        session: &SessionManager,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse> {
        let response = self.login(email, password).await?;
        session.login(&response.token, &response.role, &response.id)?;
        info!("signed in {} as {}", email, response.role.to_lowercase());
        Ok(response)
    }
}
