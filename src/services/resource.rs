use serde_json::Value;

use crate::gateway::{ApiGateway, RequestConfig};
use crate::utils::Result;

/// CRUD calls for one REST collection
///
/// Reads always reach the backend unless a caller opts in with `list_cached`;
/// every mutation drops the cached reads of the collections listed in
/// `invalidates`.
#[derive(Clone)]
pub struct ResourceClient {
    gateway: ApiGateway,
    path: &'static str,
    invalidates: &'static [&'static str],
}

impl ResourceClient {
    pub fn new(gateway: ApiGateway, path: &'static str, invalidates: &'static [&'static str]) -> Self {
        Self {
            gateway,
            path,
            invalidates,
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, id)
    }

    fn mutation_config(&self) -> RequestConfig {
        self.invalidates
            .iter()
            .fold(RequestConfig::new(), |config, prefix| config.invalidates(*prefix))
    }

    pub async fn list(&self) -> Result<Value> {
        self.list_where(&[]).await
    }

    pub async fn list_where(&self, query: &[(&str, String)]) -> Result<Value> {
        self.read(self.path, query, RequestConfig::new()).await
    }

    /// `list` served from the response cache while the entry is fresh
    ///
    /// Only for reference data; other sessions' changes stay invisible until the
    /// entry expires.
    pub async fn list_cached(&self) -> Result<Value> {
        self.read(self.path, &[], RequestConfig::new().cached()).await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        self.read(&self.item_path(id), &[], RequestConfig::new()).await
    }

    async fn read(&self, path: &str, query: &[(&str, String)], config: RequestConfig) -> Result<Value> {
        let config = query
            .iter()
            .fold(config, |config, (k, v)| config.query(*k, v));
        Ok(self.gateway.get(path, config).await?)
    }

    /// GET a sub-path such as `patients/search`
    pub async fn get_sub(&self, sub_path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.read(&format!("{}/{}", self.path, sub_path), query, RequestConfig::new())
            .await
    }

    pub async fn create(&self, body: Value) -> Result<Value> {
        Ok(self
            .gateway
            .post(self.path, body, self.mutation_config())
            .await?)
    }

    pub async fn update(&self, id: &str, body: Value) -> Result<Value> {
        Ok(self
            .gateway
            .put(&self.item_path(id), body, self.mutation_config())
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<Value> {
        Ok(self
            .gateway
            .delete(&self.item_path(id), self.mutation_config())
            .await?)
    }
}
