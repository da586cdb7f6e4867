use std::time::Duration;

use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Gateway-wide defaults that per-call configuration is merged over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayDefaults {
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for GatewayDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Per-call options; anything left unset falls back to [`GatewayDefaults`]
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Serve and store GET responses through the response cache
    pub cache: bool,
    pub cache_ttl: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Never attach the stored bearer token
    pub public: bool,
    /// Log failures at error level (otherwise debug)
    pub show_error: bool,
    /// Correlation id; generated when absent
    pub request_id: Option<String>,
    pub query: Vec<(String, String)>,
    /// Path prefixes whose cached reads are dropped after a successful mutation
    pub invalidates: Vec<String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            cache: false,
            cache_ttl: None,
            timeout: None,
            public: false,
            show_error: true,
            request_id: None,
            query: Vec::new(),
            invalidates: Vec::new(),
        }
    }
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_error = false;
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn invalidates(mut self, prefix: impl Into<String>) -> Self {
        self.invalidates.push(prefix.into());
        self
    }

    pub(crate) fn resolve(self, defaults: &GatewayDefaults) -> ResolvedConfig {
        ResolvedConfig {
            cache: self.cache,
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            public: self.public,
            show_error: self.show_error,
            request_id: self.request_id,
            query: self.query,
            invalidates: self.invalidates,
        }
    }
}

/// Per-call options after merging over the defaults
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub cache: bool,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub public: bool,
    pub show_error: bool,
    pub request_id: Option<String>,
    pub query: Vec<(String, String)>,
    pub invalidates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_unset_fields() {
        let resolved = RequestConfig::new().resolve(&GatewayDefaults::default());
        assert!(!resolved.cache);
        assert!(!resolved.public);
        assert!(resolved.show_error);
        assert_eq!(resolved.timeout, Duration::from_secs(30));
        assert_eq!(resolved.cache_ttl, Duration::from_secs(300));
        assert!(resolved.request_id.is_none());
    }

    #[test]
    fn test_call_options_override_defaults() {
        let resolved = RequestConfig::new()
            .cache_ttl(Duration::from_millis(5000))
            .timeout(Duration::from_secs(2))
            .public()
            .quiet()
            .request_id("req-1")
            .query("status", "scheduled")
            .resolve(&GatewayDefaults::default());

        assert!(resolved.cache);
        assert!(resolved.public);
        assert!(!resolved.show_error);
        assert_eq!(resolved.cache_ttl, Duration::from_millis(5000));
        assert_eq!(resolved.timeout, Duration::from_secs(2));
        assert_eq!(resolved.request_id.as_deref(), Some("req-1"));
        assert_eq!(resolved.query, vec![("status".to_string(), "scheduled".to_string())]);
    }
}
