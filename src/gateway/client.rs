use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cache::ResponseCache;
use super::config::{GatewayDefaults, RequestConfig, ResolvedConfig};
use super::error::ApiError;
use super::registry::ActiveRequests;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use crate::constants::{CACHE_BUSTER_PARAM, REFRESHED_TOKEN_HEADER, REQUEST_ID_HEADER, TOKEN_KEY};
use crate::storage::Storage;
use crate::utils::{ClinicError, Result as ClinicResult};

/// Receives notice of a 401 response; exactly one may be registered
pub type UnauthorizedCallback = Arc<dyn Fn() + Send + Sync>;

/// Fresh correlation id for a request
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// The single egress point for backend calls
///
/// Cheap to clone; clones share the cache, the active-request registry and the
/// unauthorized callback slot.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    base_url: String,
    defaults: GatewayDefaults,
    storage: Arc<dyn Storage>,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    active: ActiveRequests,
    on_unauthorized: RwLock<Option<UnauthorizedCallback>>,
}

impl ApiGateway {
    pub fn new(
        base_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_defaults(base_url, storage, transport, GatewayDefaults::default())
    }

    pub fn with_defaults(
        base_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        defaults: GatewayDefaults,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(GatewayInner {
                base_url,
                defaults,
                storage,
                transport,
                cache: ResponseCache::new(),
                active: ActiveRequests::new(),
                on_unauthorized: RwLock::new(None),
            }),
        }
    }

    /// Gateway talking HTTP through reqwest
    pub fn connect(
        base_url: impl Into<String>,
        storage: Arc<dyn Storage>,
        defaults: GatewayDefaults,
    ) -> ClinicResult<Self> {
        let transport = ReqwestTransport::new().map_err(|e| ClinicError::Config(e.to_string()))?;
        Ok(Self::with_defaults(
            base_url,
            storage,
            Arc::new(transport),
            defaults,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// Absolute URL for an API path
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, config: RequestConfig) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None, config).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body), config).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, Some(body), config).await
    }

    pub async fn delete(&self, path: &str, config: RequestConfig) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None, config).await
    }

    /// Run one call through the full pipeline and return only its payload
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<Value, ApiError> {
        let config = config.resolve(&self.inner.defaults);
        let url = self.url_for(path);
        let request_id = config.request_id.clone().unwrap_or_else(new_request_id);

        let signal = self.inner.active.register(&request_id);
        let generation = signal.generation;
        // Payloads fetched across a full cache clear belong to the previous identity
        let cache_epoch = self.inner.cache.epoch();

        let cache_key = (method == Method::GET && config.cache)
            .then(|| ResponseCache::key(&url, &config.query));
        if let Some(key) = &cache_key {
            if let Some(payload) = self.inner.cache.get(key, config.cache_ttl) {
                self.inner.active.release(&request_id, generation);
                debug!("[{}] cache hit for {}", request_id, url);
                return Ok(payload);
            }
        }

        let outcome = match self.build_request(&method, &url, body, &config, &request_id) {
            Ok(http_request) => {
                let call = tokio::time::timeout(
                    config.timeout,
                    self.inner.transport.execute(http_request),
                );
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(ApiError::cancelled()),
                    result = call => match result {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(e)) => Err(classify_transport_error(e)),
                        Err(_) => Err(ApiError::timeout()),
                    },
                }
            },
            Err(e) => Err(e),
        };

        self.inner.active.release(&request_id, generation);

        match outcome {
            Ok(response) if (200..400).contains(&response.status) => {
                let cache_slot = cache_key.map(|key| (key, cache_epoch));
                Ok(self.on_success(&method, &url, cache_slot, &config, response))
            },
            Ok(response) => {
                let err = ApiError::from_status(response.status, response.body);
                Err(self.on_failure(err, &config, &request_id, &url))
            },
            Err(e) => Err(self.on_failure(e, &config, &request_id, &url)),
        }
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        body: Option<Value>,
        config: &ResolvedConfig,
        request_id: &str,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = HeaderMap::new();
        let id_value = HeaderValue::from_str(request_id)
            .map_err(|_| ApiError::unknown(format!("invalid request id {request_id:?}")))?;
        headers.insert(REQUEST_ID_HEADER, id_value);

        if !config.public {
            if let Some(token) = self.stored_token() {
                let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ApiError::unknown("stored token is not a valid header value"))?;
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        let mut query = config.query.clone();
        if *method == Method::GET {
            query.push((CACHE_BUSTER_PARAM.to_string(), now_millis().to_string()));
        }

        Ok(HttpRequest {
            method: method.clone(),
            url: url.to_string(),
            headers,
            query,
            body,
            timeout: config.timeout,
        })
    }

    fn stored_token(&self) -> Option<String> {
        match self.inner.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("could not read token from storage: {}", e);
                None
            },
        }
    }

    fn on_success(
        &self,
        method: &Method,
        url: &str,
        cache_slot: Option<(String, u64)>,
        config: &ResolvedConfig,
        response: HttpResponse,
    ) -> Value {
        if let Some((key, epoch)) = cache_slot {
            if !self.inner.cache.insert(key, url, response.body.clone(), epoch) {
                debug!("{} {} finished after a cache clear; not cached", method, url);
            }
        }

        if *method != Method::GET {
            for prefix in &config.invalidates {
                let dropped = self.inner.cache.remove_prefix(&self.url_for(prefix));
                if dropped > 0 {
                    debug!("{} {} invalidated {} cached read(s) under {}", method, url, dropped, prefix);
                }
            }
        }

        // Credentials returned by public calls (login) belong to the session owner
        if config.public {
            return response.body;
        }

        let refreshed = response
            .header(REFRESHED_TOKEN_HEADER)
            .map(str::to_string)
            .or_else(|| {
                response
                    .body
                    .get("token")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|t| !t.is_empty());
        if let Some(token) = refreshed {
            if let Err(e) = self.inner.storage.set(TOKEN_KEY, &token) {
                warn!("could not persist refreshed token: {}", e);
            }
        }

        response.body
    }

    fn on_failure(
        &self,
        err: ApiError,
        config: &ResolvedConfig,
        request_id: &str,
        url: &str,
    ) -> ApiError {
        let err = err.with_context(request_id, url);

        if err.is_cancelled() {
            warn!("[{}] request to {} cancelled", request_id, url);
        } else if config.show_error {
            error!("[{}] {} failed: {}", request_id, url, err.message);
        } else {
            debug!("[{}] {} failed: {}", request_id, url, err.message);
        }

        if err.is_unauthorized() {
            // Clone out of the slot so the callback may re-enter the gateway
            let callback = self.inner.on_unauthorized.read().clone();
            if let Some(callback) = callback {
                info!("401 from {}: notifying session owner", url);
                callback();
            }
        }

        err
    }

    /// Cancel an in-flight call; false when nothing is registered under `request_id`
    pub fn cancel_request(&self, request_id: &str) -> bool {
        self.inner.active.cancel(request_id)
    }

    /// Drop cached reads for one path (all query variants) or, with `None`, everything
    pub fn clear_cache(&self, path: Option<&str>) {
        match path {
            Some(path) => {
                self.inner.cache.remove_url(&self.url_for(path));
            },
            None => self.inner.cache.clear(),
        }
    }

    /// Register (or, with `None`, unregister) the unauthorized subscriber
    pub fn set_on_unauthorized_callback(&self, callback: Option<UnauthorizedCallback>) {
        *self.inner.on_unauthorized.write() = callback;
    }

    pub fn has_unauthorized_callback(&self) -> bool {
        self.inner.on_unauthorized.read().is_some()
    }

    pub fn active_request_count(&self) -> usize {
        self.inner.active.len()
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }
}

fn classify_transport_error(err: TransportError) -> ApiError {
    match err {
        TransportError::Timeout => ApiError::timeout(),
        TransportError::Connect(detail) => {
            debug!("transport connect failure: {}", detail);
            ApiError::network()
        },
        TransportError::Other(detail) => ApiError::unknown(detail),
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedTransport;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BASE: &str = "http://clinic.test/api";

    fn setup() -> (ApiGateway, Arc<ScriptedTransport>, Arc<MemoryStorage>) {
        let transport = Arc::new(ScriptedTransport::new());
        let storage = Arc::new(MemoryStorage::new());
        let gateway = ApiGateway::new(BASE, storage.clone(), transport.clone());
        (gateway, transport, storage)
    }

    #[tokio::test]
    async fn test_returns_payload_and_tags_request() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "clinics", 200, json!([{"id": 1}]));

        let payload = gateway
            .get("/clinics", RequestConfig::new().request_id("req-7"))
            .await
            .unwrap();
        assert_eq!(payload, json!([{"id": 1}]));

        let sent = transport.last_request();
        assert_eq!(sent.url, "http://clinic.test/api/clinics");
        assert_eq!(sent.header(REQUEST_ID_HEADER), Some("req-7"));
        assert!(sent.query.iter().any(|(k, _)| k == CACHE_BUSTER_PARAM));
        assert_eq!(gateway.active_request_count(), 0);
    }

    #[tokio::test]
    async fn test_bearer_token_only_on_private_calls() {
        let (gateway, transport, storage) = setup();
        transport.respond(Method::GET, "patients", 200, json!([]));
        transport.respond(Method::POST, "users/login", 200, json!({}));

        // No token stored: no header
        gateway.get("patients", RequestConfig::new()).await.unwrap();
        assert_eq!(transport.last_request().header("authorization"), None);

        storage.set(TOKEN_KEY, "t1").unwrap();
        gateway.get("patients", RequestConfig::new()).await.unwrap();
        assert_eq!(
            transport.last_request().header("authorization"),
            Some("Bearer t1")
        );

        gateway
            .post("users/login", json!({}), RequestConfig::new().public())
            .await
            .unwrap();
        assert_eq!(transport.last_request().header("authorization"), None);
    }

    #[tokio::test]
    async fn test_cached_get_skips_network_until_ttl_elapses() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "specialties", 200, json!([{"id": 1, "name": "Cardio"}]));

        let config = || RequestConfig::new().cache_ttl(Duration::from_millis(5000));
        let first = gateway.get("specialties", config()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = gateway.get("specialties", config()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls_to(Method::GET, "specialties"), 1);
        assert_eq!(gateway.active_request_count(), 0);

        let short = || RequestConfig::new().cache_ttl(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(40)).await;
        gateway.get("specialties", short()).await.unwrap();
        assert_eq!(transport.calls_to(Method::GET, "specialties"), 2);
    }

    #[tokio::test]
    async fn test_uncached_and_distinct_queries_hit_network() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "doctors", 200, json!([]));

        gateway.get("doctors", RequestConfig::new()).await.unwrap();
        gateway.get("doctors", RequestConfig::new()).await.unwrap();
        gateway
            .get("doctors", RequestConfig::new().cached().query("clinic_id", 1))
            .await
            .unwrap();
        gateway
            .get("doctors", RequestConfig::new().cached().query("clinic_id", 2))
            .await
            .unwrap();
        assert_eq!(transport.calls_to(Method::GET, "doctors"), 4);
        assert_eq!(gateway.cache_len(), 2);

        gateway.clear_cache(Some("doctors"));
        assert_eq!(gateway.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_declared_reads() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "clinics", 200, json!([]));
        transport.respond(Method::POST, "clinics", 201, json!({"id": 9}));

        gateway.get("clinics", RequestConfig::new().cached()).await.unwrap();
        assert_eq!(gateway.cache_len(), 1);

        // A mutation without declarations leaves the cache alone
        gateway.post("clinics", json!({}), RequestConfig::new()).await.unwrap();
        assert_eq!(gateway.cache_len(), 1);

        gateway
            .post("clinics", json!({}), RequestConfig::new().invalidates("clinics"))
            .await
            .unwrap();
        assert_eq!(gateway.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_invokes_callback_once() {
        let (gateway, transport, storage) = setup();
        transport.respond(Method::GET, "appointments", 401, json!({"message": "jwt expired"}));
        storage.set(TOKEN_KEY, "stale").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let storage_for_cb = storage.clone();
        let counter = calls.clone();
        gateway.set_on_unauthorized_callback(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            storage_for_cb.remove(TOKEN_KEY).unwrap();
        })));

        let err = gateway
            .get("appointments", RequestConfig::new())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.status, Some(401));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // After logout no credential is attached
        let _ = gateway.get("appointments", RequestConfig::new()).await;
        assert_eq!(transport.last_request().header("authorization"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        gateway.set_on_unauthorized_callback(None);
        let _ = gateway.get("appointments", RequestConfig::new()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replacing_callback_notifies_only_latest() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "users", 401, Value::Null);

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (f, s) = (first.clone(), second.clone());
        gateway.set_on_unauthorized_callback(Some(Arc::new(move || {
            f.fetch_add(1, Ordering::SeqCst);
        })));
        gateway.set_on_unauthorized_callback(Some(Arc::new(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })));

        let _ = gateway.get("users", RequestConfig::new()).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_one_of_two_concurrent_calls() {
        let (gateway, transport, _) = setup();
        transport.respond_after(Method::GET, "patients", Duration::from_millis(200), 200, json!(["p"]));
        transport.respond_after(Method::GET, "doctors", Duration::from_millis(50), 200, json!(["d"]));

        let slow = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .get("patients", RequestConfig::new().request_id("slow"))
                    .await
            })
        };
        let other = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .get("doctors", RequestConfig::new().request_id("other"))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gateway.active_request_count(), 2);
        assert!(gateway.cancel_request("slow"));

        let err = slow.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.request_id.as_deref(), Some("slow"));

        assert_eq!(other.await.unwrap().unwrap(), json!(["d"]));
        assert_eq!(gateway.active_request_count(), 0);
        assert!(!gateway.cancel_request("slow"));
    }

    #[tokio::test]
    async fn test_timeout_is_normalized() {
        let (gateway, transport, _) = setup();
        transport.respond_after(Method::GET, "prontuarios", Duration::from_millis(300), 200, json!([]));

        let err = gateway
            .get("prontuarios", RequestConfig::new().timeout(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(gateway.active_request_count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_is_normalized() {
        let (gateway, _transport, _) = setup();
        // No route scripted: the transport reports a connection failure
        let err = gateway.get("clinics", RequestConfig::new().quiet()).await.unwrap_err();
        assert!(err.is_network_error());
        assert_eq!(err.status, None);
        assert_eq!(err.url.as_deref(), Some("http://clinic.test/api/clinics"));
    }

    #[tokio::test]
    async fn test_refreshed_token_is_persisted() {
        let (gateway, transport, storage) = setup();
        storage.set(TOKEN_KEY, "old").unwrap();
        transport.respond_with_header(
            Method::GET,
            "users/1",
            200,
            json!({"id": 1}),
            (REFRESHED_TOKEN_HEADER, "from-header"),
        );
        transport.respond(Method::PUT, "users/1", 200, json!({"id": 1, "token": "from-body"}));

        gateway.get("users/1", RequestConfig::new()).await.unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("from-header"));

        gateway.put("users/1", json!({}), RequestConfig::new()).await.unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("from-body"));
    }

    #[tokio::test]
    async fn test_redirect_statuses_count_as_success() {
        let (gateway, transport, _) = setup();
        transport.respond(Method::GET, "clinics", 304, Value::Null);
        assert_eq!(gateway.get("clinics", RequestConfig::new()).await.unwrap(), Value::Null);
    }
}
